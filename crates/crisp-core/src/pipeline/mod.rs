//! Declarative pipeline assembly: JSON descriptor plus reflected SPIR-V in,
//! `vk::Pipeline` out.

mod assembly;
pub mod schema;

pub use assembly::{assemble, AssembledPipeline, StageSource};
