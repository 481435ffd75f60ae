pub mod catalog;
pub mod device;
pub mod task;
pub mod user;

pub use catalog::{Catalog, NewDevice, NewTask, NewUser, Seed, TaskFilter};
pub use device::{Device, DeviceStatus};
pub use task::{Task, TaskStatus};
pub use user::User;
