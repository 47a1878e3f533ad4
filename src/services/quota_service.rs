use crate::error::{AppError, QuotaContext, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-tenant byte reservation, closing the race where two concurrent chunk
/// uploads each pass an independent quota check and both write. A mutex keyed
/// by user id serializes the check-then-increment; the actual I/O happens
/// outside the lock.
#[derive(Clone, Debug, Default)]
pub struct QuotaService {
    inner: Arc<QuotaInner>,
}

#[derive(Debug, Default)]
struct QuotaInner {
    tenant_locks: DashMap<i64, Arc<Mutex<()>>>,
    reserved: DashMap<i64, i64>,
}

/// Releases its pledge on drop, regardless of which branch the caller took —
/// the one place in this system where cleanup is tied to scope, not to a
/// success/error return path.
#[derive(Debug)]
#[must_use = "dropping this immediately releases the reservation"]
pub struct ReservationGuard {
    service: Option<QuotaService>,
    user_id: i64,
    bytes: i64,
}

impl Drop for ReservationGuard {
    fn drop(&mut self) {
        if let Some(service) = self.service.take()
            && self.bytes > 0
        {
            service.release(self.user_id, self.bytes);
        }
    }
}

impl QuotaService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `incoming_bytes` against a tenant's quota.
    ///
    /// `plan_bytes == 0` means unlimited for non-gated callers (e.g. the
    /// device-state blob, which is never quota-checked but may pass through
    /// here with a zero plan for symmetry). `incoming_bytes <= 0` is always
    /// allowed and never locks.
    ///
    /// # Errors
    /// Returns `AppError::PayloadTooLarge` carrying quota context if the
    /// reservation would exceed the tenant's budget.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(
        &self,
        user_id: i64,
        plan_bytes: i64,
        used_bytes: i64,
        incoming_bytes: i64,
        margin_bytes: i64,
    ) -> Result<ReservationGuard> {
        if incoming_bytes <= 0 {
            return Ok(ReservationGuard { service: None, user_id, bytes: 0 });
        }

        let lock = self.inner.tenant_locks.entry(user_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
        let _permit = lock.lock().await;

        let reserved_before = self.inner.reserved.get(&user_id).map_or(0, |v| *v);

        if plan_bytes > 0 {
            let quota_bytes = plan_bytes + margin_bytes;
            let projected = used_bytes + reserved_before + incoming_bytes + margin_bytes;
            if projected > quota_bytes {
                let used_total = used_bytes + reserved_before;
                let remaining_bytes = (plan_bytes - used_total).max(0);
                return Err(AppError::PayloadTooLarge {
                    code: "QUOTA_EXCEEDED",
                    quota: QuotaContext { quota_bytes, used_bytes: used_total, remaining_bytes },
                });
            }
        }

        *self.inner.reserved.entry(user_id).or_insert(0) += incoming_bytes;
        Ok(ReservationGuard { service: Some(self.clone()), user_id, bytes: incoming_bytes })
    }

    fn release(&self, user_id: i64, bytes: i64) {
        let Some(mut entry) = self.inner.reserved.get_mut(&user_id) else {
            return;
        };
        *entry -= bytes;
        let emptied = *entry <= 0;
        drop(entry);
        if emptied {
            self.inner.reserved.remove(&user_id);
        }
        // `tenant_locks` entries are never removed: a tenant's mutex must stay
        // stable for the lifetime of the process, or a `reserve` holding the
        // old `Arc` and one handed a freshly-inserted `Arc` could run their
        // read-modify-write of `reserved` concurrently. One entry per
        // ever-seen tenant is bounded in practice, unlike `reserved` which
        // shrinks back to zero entries whenever every reservation drains.
    }

    /// Currently reserved (not-yet-committed) bytes for a tenant, used when
    /// computing usage summaries.
    #[must_use]
    pub fn reserved_bytes(&self, user_id: i64) -> i64 {
        self.inner.reserved.get(&user_id).map_or(0, |v| *v)
    }

    /// Acquires the same per-tenant mutex `reserve` serializes on, for
    /// callers that need to run a one-time per-tenant side effect (e.g.
    /// legacy tenant directory migration) without racing a concurrent
    /// reservation or another such side effect for the same tenant.
    pub async fn tenant_guard(&self, user_id: i64) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = self.inner.tenant_locks.entry(user_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reserve_allows_within_budget() {
        let service = QuotaService::new();
        let guard = service.reserve(1, 100, 0, 50, 10).await.unwrap();
        assert_eq!(service.reserved_bytes(1), 50);
        drop(guard);
        assert_eq!(service.reserved_bytes(1), 0);
    }

    #[tokio::test]
    async fn reserve_denies_over_budget() {
        let service = QuotaService::new();
        let err = service.reserve(1, 100, 99, 2, 10).await.unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge { code: "QUOTA_EXCEEDED", .. }));
        assert_eq!(service.reserved_bytes(1), 0);
    }

    #[tokio::test]
    async fn non_positive_incoming_is_always_allowed() {
        let service = QuotaService::new();
        let guard = service.reserve(1, 100, 100, 0, 10).await.unwrap();
        assert_eq!(service.reserved_bytes(1), 0);
        drop(guard);
    }

    #[tokio::test]
    async fn concurrent_reservations_serialize_per_tenant() {
        let service = QuotaService::new();
        let a = service.clone();
        let b = service.clone();
        let (r1, r2) = tokio::join!(a.reserve(7, 100, 0, 60, 0), b.reserve(7, 100, 0, 60, 0));
        let allowed = [r1.is_ok(), r2.is_ok()].into_iter().filter(|&x| x).count();
        assert_eq!(allowed, 1, "only one of two competing 60-byte reservations against a 100-byte budget may succeed");
    }
}
