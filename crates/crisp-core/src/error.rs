//! Unified error type for the render graph and GPU resource lifecycle core.

use ash::vk;
use thiserror::Error;

/// Errors produced anywhere in `crisp-core`.
#[derive(Error, Debug)]
pub enum Error {
    /// A raw Vulkan API call returned a non-success result.
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Device or instance bring-up failed before a `vk::Result` was available
    /// (extension enumeration, layer selection, window-system glue).
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    /// No physical device exposed the required queue families or extensions.
    #[error("no suitable physical device found")]
    NoSuitablePhysicalDevice,

    /// No host/device memory type satisfied a resource's requirements.
    #[error("no suitable memory type for requirements {type_bits:#x} / {flags:?}")]
    NoSuitableMemoryType {
        /// The memory type bitmask reported by `vkGetBufferMemoryRequirements` et al.
        type_bits: u32,
        /// The required `vk::MemoryPropertyFlags`.
        flags: vk::MemoryPropertyFlags,
    },

    /// A handle returned by the builder API does not refer to a resource or
    /// pass registered in this graph instance. Mixing handles across graph
    /// instances is the most common cause.
    #[error("unknown handle: {0}")]
    UnknownHandle(String),

    /// A render-graph invariant was violated: a resource was declared but
    /// never produced, a cycle was detected, or an attachment's format/usage
    /// combination is invalid.
    #[error("render graph validation failed: {reason}")]
    GraphValidation {
        /// Human-readable description of which invariant failed.
        reason: String,
    },

    /// SPIR-V reflection failed to parse or merge shader metadata.
    #[error("shader reflection error: {0}")]
    Reflection(String),

    /// A pipeline JSON descriptor was malformed or referenced a shader/format
    /// this crate does not know how to map to a Vulkan enum.
    #[error("pipeline descriptor error: {0}")]
    PipelineDescriptor(String),

    /// Failure loading or parsing an engine-level RON configuration file.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Swapchain is out of date and must be recreated; distinguished from
    /// other Vulkan errors because callers are expected to handle this by
    /// calling `RenderGraph::resize` rather than propagating it as fatal.
    #[error("swapchain out of date")]
    SwapchainOutOfDate,
}

impl From<vk::Result> for Error {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
                Error::Api(result)
            }
            vk::Result::ERROR_OUT_OF_DATE_KHR => Error::SwapchainOutOfDate,
            other => Error::Api(other),
        }
    }
}

/// Errors from loading/saving RON-based engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Underlying file I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The file did not parse as valid RON.
    #[error("parse error: {0}")]
    Parse(String),
    /// The value did not serialize back to RON (should not happen in practice).
    #[error("serialize error: {0}")]
    Serialize(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
