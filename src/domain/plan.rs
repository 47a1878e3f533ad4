use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Allowed storage tiers, in gigabytes.
pub const PLAN_TIERS_GB: [i64; 4] = [100, 200, 400, 1000];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    None,
    Trial,
    TrialExpired,
    Active,
    Grace,
    GraceExpired,
    Deleted,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Trial => "trial",
            Self::TrialExpired => "trial_expired",
            Self::Active => "active",
            Self::Grace => "grace",
            Self::GraceExpired => "grace_expired",
            Self::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "trial" => Ok(Self::Trial),
            "trial_expired" => Ok(Self::TrialExpired),
            "active" => Ok(Self::Active),
            "grace" => Ok(Self::Grace),
            "grace_expired" => Ok(Self::GraceExpired),
            "deleted" => Ok(Self::Deleted),
            other => Err(format!("unknown plan status: {other}")),
        }
    }
}

/// One row per user. Timestamps are milliseconds since the Unix epoch, matching
/// the wire representation clients expect.
#[derive(Debug, Clone)]
pub struct UserPlan {
    pub user_id: i64,
    pub plan_gb: Option<i64>,
    pub status: PlanStatus,
    pub trial_until: Option<i64>,
    pub expires_at: Option<i64>,
    pub grace_until: Option<i64>,
    pub deleted_at: Option<i64>,
    pub external_app_user_id: Option<String>,
}

impl UserPlan {
    #[must_use]
    pub fn plan_bytes(&self) -> i64 {
        self.plan_gb.map_or(0, |gb| gb.saturating_mul(1_000_000_000))
    }
}
