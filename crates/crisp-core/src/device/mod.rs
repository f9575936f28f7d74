//! Device bring-up: instance, physical/logical device selection, and the
//! GPU allocator.

mod allocator;
mod context;
mod instance;
mod logical;
mod physical;

pub use allocator::{Allocator, BufferAllocation, ImageAllocation, MemoryLocation};
pub use context::VulkanContext;
pub use instance::VulkanInstance;
pub use logical::LogicalDevice;
pub use physical::PhysicalDeviceInfo;
