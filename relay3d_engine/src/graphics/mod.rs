/// Graphics module - device trait, shared data types and the mock device

pub mod graphics_device;
pub mod types;
pub mod mock_device;

pub use graphics_device::GraphicsDevice;
pub use types::*;
pub use mock_device::{DeviceCall, MockDevice};
