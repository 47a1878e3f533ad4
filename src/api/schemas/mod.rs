pub mod auth;
pub mod capacity;
pub mod classic;
pub mod cloud;
pub mod cloud_usage;
pub mod subscription;
