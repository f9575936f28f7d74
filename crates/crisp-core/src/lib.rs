//! Render graph and GPU resource lifecycle core for the Crisp rendering
//! engine: logical-to-physical resource aliasing, per-subresource image
//! layout tracking, virtual-frame pipelining, and declarative pipeline
//! assembly over Vulkan via `ash`.
//!
//! [`graph::RenderGraph`] is the crate's centerpiece. A typical frame:
//!
//! 1. Build the graph once: [`graph::RenderGraph::add_pass`] plus
//!    [`graph::RenderGraph::builder`] to declare each pass's reads/writes,
//!    then [`graph::RenderGraph::compile`].
//! 2. Per frame: [`frame::VirtualFramePool::begin_frame`] to acquire a
//!    command buffer, [`graph::RenderGraph::execute`] to record it, then
//!    [`frame::VirtualFramePool::end_frame`] to submit and present.
//! 3. On swapchain resize: [`graph::RenderGraph::resize`].
//! 4. At shutdown: [`graph::RenderGraph::finish`].

pub mod commands;
pub mod config;
pub mod deallocator;
pub mod device;
pub mod error;
pub mod frame;
pub mod graph;
pub mod layout_ledger;
pub mod pipeline;
pub mod reflection;
pub mod resources;
pub mod streaming;
pub mod swapchain;
pub mod sync;
pub mod window;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use graph::RenderGraph;
