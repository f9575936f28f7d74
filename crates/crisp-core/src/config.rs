//! Engine-level configuration, loaded from RON.
//!
//! Pipeline *descriptions* are JSON and live in [`crate::pipeline::schema`]
//! — this module is only for the handful of knobs that govern device/graph
//! bring-up itself.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration consumed by [`crate::device::VulkanContext::new`] and
/// [`crate::frame::VirtualFramePool::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of virtual frames in flight. Typically 2 or 3.
    pub frames_in_flight: usize,
    /// Enable the `VK_LAYER_KHRONOS_validation` layer and debug-utils
    /// messenger. Forced on in debug builds regardless of this flag.
    pub validation: bool,
    /// Preferred present mode; falls back to FIFO if unavailable.
    pub present_mode: PresentModePreference,
    /// Byte size of each per-frame streaming (uniform) buffer ring.
    pub streaming_buffer_size: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            validation: cfg!(debug_assertions),
            present_mode: PresentModePreference::Mailbox,
            streaming_buffer_size: 4 * 1024 * 1024,
        }
    }
}

/// Present-mode preference, mirrored from `vk::PresentModeKHR` so config
/// files don't need to know Vulkan's wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentModePreference {
    /// Triple-buffered, low latency, no tearing. Falls back to FIFO.
    Mailbox,
    /// Vsynced FIFO. Always supported.
    Fifo,
    /// Uncapped, may tear. Falls back to FIFO.
    Immediate,
}

impl EngineConfig {
    /// Load configuration from a `.ron` file, falling back to defaults for
    /// any field the file omits (see `#[serde(default)]` above).
    pub fn load_from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize configuration back to a `.ron` file.
    pub fn save_to_file(&self, path: &str) -> std::result::Result<(), ConfigError> {
        let contents = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_ron() {
        let config = EngineConfig::default();
        let serialized = ron::ser::to_string(&config).unwrap();
        let deserialized: EngineConfig = ron::from_str(&serialized).unwrap();
        assert_eq!(deserialized.frames_in_flight, config.frames_in_flight);
        assert_eq!(deserialized.present_mode, config.present_mode);
    }

    #[test]
    fn partial_ron_fills_in_defaults() {
        let partial = "(frames_in_flight: 3)";
        let config: EngineConfig = ron::from_str(partial).unwrap();
        assert_eq!(config.frames_in_flight, 3);
        assert_eq!(config.streaming_buffer_size, EngineConfig::default().streaming_buffer_size);
    }
}
