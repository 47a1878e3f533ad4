pub mod chunk;
pub mod device;
pub mod device_state;
pub mod file;
pub mod plan;
pub mod user;

pub use chunk::ChunkRecord;
pub use device::DeviceRecord;
pub use device_state::DeviceStateRecord;
pub use file::FileRecord;
pub use plan::PlanRecord;
pub use user::UserRecord;
