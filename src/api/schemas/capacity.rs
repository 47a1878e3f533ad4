use serde::{Deserialize, Serialize};

/// The capacity report the background worker writes atomically to
/// `capacity/<service>-capacity.json`, and the three read endpoints serve
/// verbatim with no-store caching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityReport {
    pub free_bytes: u64,
    pub total_bytes: u64,
    pub generated_at: i64,
    pub tiers: Vec<TierCapacity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierCapacity {
    pub plan_gb: i64,
    pub can_create: bool,
}
