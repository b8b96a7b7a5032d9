mod admin;
mod device;
pub mod dto;
pub mod response;
mod router;
pub mod validation;

pub use admin::admin_router;
pub use device::device_router;
pub use router::{AppState, create_router};
