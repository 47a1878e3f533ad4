pub mod classic_store_service;
pub mod cloud_store_service;
pub mod credential_service;
pub mod health_service;
pub mod quota_service;
pub mod rate_limit_service;
pub mod subscription_service;
