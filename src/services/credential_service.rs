use crate::adapters::database::DbPool;
use crate::adapters::database::device_repo::DeviceRepository;
use crate::adapters::database::plan_repo::PlanRepository;
use crate::adapters::database::user_repo::UserRepository;
use crate::config::{AuthConfig, SubscriptionConfig};
use crate::domain::device::Device;
use crate::domain::plan::UserPlan;
use crate::domain::session::{Claims, Session};
use crate::domain::user::{User, normalize_email};
use crate::domain::now_millis;
use crate::error::{AppError, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::rngs::OsRng;
use uuid::Uuid;

const SECONDS_PER_DAY: i64 = 86_400;
const MILLIS_PER_DAY: i64 = 86_400_000;

/// Registration and login, the only two operations that ever produce or
/// verify a password. Device binding is enforced here at session-mint time;
/// the claim check on every subsequent request lives in the auth middleware.
#[derive(Clone)]
pub struct CredentialService {
    pool: DbPool,
    user_repo: UserRepository,
    device_repo: DeviceRepository,
    plan_repo: PlanRepository,
    auth_config: AuthConfig,
    subscription_config: SubscriptionConfig,
}

impl CredentialService {
    #[must_use]
    pub fn new(
        pool: DbPool,
        user_repo: UserRepository,
        device_repo: DeviceRepository,
        plan_repo: PlanRepository,
        auth_config: AuthConfig,
        subscription_config: SubscriptionConfig,
    ) -> Self {
        Self { pool, user_repo, device_repo, plan_repo, auth_config, subscription_config }
    }

    /// Creates a new user and its plan row.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` if the normalized email is already registered.
    #[tracing::instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str, plan_gb: Option<i64>) -> Result<User> {
        let email = normalize_email(email);
        let password_hash = self.hash_password(password).await?;

        let mut tx = self.pool.begin().await?;

        if self.user_repo.find_by_email(&mut tx, &email).await?.is_some() {
            return Err(AppError::Conflict("email already exists".into()));
        }

        let user = self.user_repo.create(&mut tx, Uuid::new_v4(), &email, &password_hash).await?;

        match plan_gb.filter(|gb| *gb != 0) {
            Some(gb) => {
                let now = now_millis();
                let trial_until = now + self.subscription_config.trial_days * MILLIS_PER_DAY;
                self.plan_repo
                    .upsert_state(&mut tx, user.id, Some(gb), "trial", Some(trial_until), None, None, None, None)
                    .await?;
            }
            None => {
                self.plan_repo.create_default(&mut tx, user.id).await?;
            }
        }

        tx.commit().await?;
        tracing::info!(user.id = user.id, "user registered");
        Ok(user)
    }

    /// Verifies credentials, registers the device if new, and mints a
    /// device-bound session token.
    ///
    /// # Errors
    /// Returns `AppError::Unauthorized` if the email/password pair is invalid.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device_uuid: Uuid,
        device_name: Option<&str>,
    ) -> Result<(Session, Device)> {
        let email = normalize_email(email);
        let mut conn = self.pool.acquire().await?;

        let user = self.user_repo.find_by_email(&mut conn, &email).await?.ok_or(AppError::Unauthorized)?;
        if !self.verify_password(password, &user.password_hash).await? {
            return Err(AppError::Unauthorized);
        }

        let device = self.device_repo.upsert(&mut conn, user.id, device_uuid, device_name).await?;

        let exp = now_millis() / 1000 + self.auth_config.session_ttl_days * SECONDS_PER_DAY;
        let claims = Claims::new(user.id, user.user_uuid, user.email.clone(), device.device_uuid.to_string(), exp as usize);
        let token = self.encode_jwt(&claims)?;

        tracing::info!(user.id = user.id, "login succeeded");
        Ok((Session { token, user_id: user.id }, device))
    }

    /// Decodes and verifies a session token's signature and expiry.
    ///
    /// # Errors
    /// Returns `AppError::Forbidden` if the token is malformed, unsigned correctly, or expired.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.auth_config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::Forbidden("invalid or expired session token".into()))?;

        Ok(data.claims)
    }

    /// Fetches a user's plan row, for handlers that need it outside the
    /// subscription resolver's transition logic.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    pub async fn find_plan(&self, user_id: i64) -> Result<Option<UserPlan>> {
        let mut conn = self.pool.acquire().await?;
        self.plan_repo.find_by_user_id(&mut conn, user_id).await
    }

    fn encode_jwt(&self, claims: &Claims) -> Result<String> {
        encode(&Header::default(), claims, &EncodingKey::from_secret(self.auth_config.jwt_secret.as_bytes()))
            .map_err(|_| AppError::Internal)
    }

    #[tracing::instrument(skip(self, password))]
    async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default().hash_password(password.as_bytes(), &salt).map_err(|_| AppError::Internal).map(|h| h.to_string())
        })
        .await
        .map_err(|_| AppError::Internal)?
    }

    #[tracing::instrument(skip(self, password, password_hash))]
    async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool> {
        let password = password.to_string();
        let password_hash = password_hash.to_string();
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&password_hash).map_err(|_| AppError::Internal)?;
            Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        })
        .await
        .map_err(|_| AppError::Internal)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            session_ttl_days: 30,
            bcrypt_rounds: 10,
            revenuecat_webhook_secret: None,
        }
    }

    #[tokio::test]
    async fn password_hash_roundtrips() {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        let service = CredentialService::new(
            pool,
            UserRepository::new(),
            DeviceRepository::new(),
            PlanRepository::new(),
            auth_config(),
            SubscriptionConfig { subscription_grace_days: 3, trial_days: 7 },
        );
        let hash = service.hash_password("hunter2").await.unwrap();
        assert!(service.verify_password("hunter2", &hash).await.unwrap());
        assert!(!service.verify_password("wrong", &hash).await.unwrap());
    }

    #[test]
    fn jwt_roundtrips_and_carries_device_uuid() {
        let pool_fut = sqlx::SqlitePool::connect_lazy("sqlite::memory:").unwrap();
        let service = CredentialService::new(
            pool_fut,
            UserRepository::new(),
            DeviceRepository::new(),
            PlanRepository::new(),
            auth_config(),
            SubscriptionConfig { subscription_grace_days: 3, trial_days: 7 },
        );
        let claims = Claims::new(1, Uuid::new_v4(), "alice@example.com".into(), "device-1".into(), 10_000_000_000);
        let token = service.encode_jwt(&claims).unwrap();
        let decoded = service.verify_token(&token).unwrap();
        assert_eq!(decoded.device_uuid, "device-1");
        assert_eq!(decoded.sub, 1);
    }
}
