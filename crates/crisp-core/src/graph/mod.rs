//! Render graph: DAG construction, resource lifetime aliasing,
//! synchronization, and execution (spec.md §3, §4.6).

mod alias;
pub mod blackboard;
mod builder;
mod compile;
mod execute;
pub mod handle;
pub mod pass;
pub mod physical;
pub mod resource;
mod timeline;

pub use blackboard::Blackboard;
pub use builder::Builder;
pub use handle::{PassHandle, ResourceHandle};
pub use pass::{ExecuteFn, Pass, PassType};
pub use physical::{AttachmentSlot, PhysicalBuffer, PhysicalImage, PhysicalPass};
pub use resource::{
    AccessDescriptor, BufferDescription, ImageDescription, LogicalResource, ResourceType,
    ResourceUsageKind, SizePolicy,
};

use ash::vk;

use crate::deallocator::ResourceDeallocator;
use crate::device::VulkanContext;
use crate::error::{Error, Result};
use crate::frame::DEFAULT_FRAMES_IN_FLIGHT;
use crate::resources::Image;

/// A render graph instance: the logical DAG plus, once [`RenderGraph::compile`]
/// has run, the physical resources and passes it compiled to (spec.md §3).
pub struct RenderGraph {
    image_descriptions: Vec<ImageDescription>,
    buffer_descriptions: Vec<BufferDescription>,
    resources: Vec<LogicalResource>,
    passes: Vec<Pass>,
    blackboard: Blackboard,

    physical_images: Vec<PhysicalImage>,
    physical_buffers: Vec<PhysicalBuffer>,
    physical_passes: Vec<Option<PhysicalPass>>,
    deallocator: ResourceDeallocator,

    frames_in_flight: usize,
    swap_chain_extent: vk::Extent2D,
    compiled: bool,
}

impl RenderGraph {
    /// Create an empty graph. `frames_in_flight` should match the owning
    /// [`crate::frame::VirtualFramePool`]'s pipelined depth, since it decides
    /// how many framebuffers each rasterizer pass gets and how long deferred
    /// destruction waits.
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            image_descriptions: Vec::new(),
            buffer_descriptions: Vec::new(),
            resources: Vec::new(),
            passes: Vec::new(),
            blackboard: Blackboard::new(),
            physical_images: Vec::new(),
            physical_buffers: Vec::new(),
            physical_passes: Vec::new(),
            deallocator: ResourceDeallocator::new(),
            frames_in_flight,
            swap_chain_extent: vk::Extent2D { width: 0, height: 0 },
            compiled: false,
        }
    }

    /// Register a new pass by name and return its handle. Declare its
    /// reads/writes through [`RenderGraph::builder`] before calling
    /// [`RenderGraph::compile`].
    pub fn add_pass(&mut self, name: impl Into<String>) -> PassHandle {
        let handle = PassHandle::new(self.passes.len() as u32);
        self.passes.push(Pass::new(name.into()));
        handle
    }

    /// Borrow the per-pass [`Builder`] used to declare `pass`'s resource
    /// reads, writes, and type.
    pub fn builder(&mut self, pass: PassHandle) -> Builder<'_> {
        Builder::new(self, pass)
    }

    /// Install the callback `compile`'s [`RenderGraph::execute`] invokes to
    /// record `pass`'s actual draw/dispatch commands.
    pub fn set_execute_fn(&mut self, pass: PassHandle, execute_fn: ExecuteFn) {
        self.pass_mut(pass).execute_fn = Some(execute_fn);
    }

    /// Shared keyed scratch map for cross-pass resource handoff, readable
    /// once passes have run their setup (spec.md §4.6.6: "Blackboard
    /// handoff").
    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub(crate) fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.blackboard
    }

    pub(crate) fn resource(&self, handle: ResourceHandle) -> &LogicalResource {
        &self.resources[handle.index() as usize]
    }

    pub(crate) fn resource_mut(&mut self, handle: ResourceHandle) -> &mut LogicalResource {
        &mut self.resources[handle.index() as usize]
    }

    pub(crate) fn pass_mut(&mut self, handle: PassHandle) -> &mut Pass {
        &mut self.passes[handle.index() as usize]
    }

    pub(crate) fn add_image_resource(&mut self, description: ImageDescription, name: String) -> ResourceHandle {
        let description_index = self.image_descriptions.len();
        self.image_descriptions.push(description);
        let index = self.resources.len() as u32;
        self.resources
            .push(LogicalResource::new(name, ResourceType::Image, description_index, false));
        ResourceHandle::new(index, 0)
    }

    pub(crate) fn add_buffer_resource(
        &mut self,
        description: BufferDescription,
        name: String,
        externally_owned: bool,
    ) -> ResourceHandle {
        let externally_owned = externally_owned || description.is_external();
        let description_index = self.buffer_descriptions.len();
        self.buffer_descriptions.push(description);
        let index = self.resources.len() as u32;
        self.resources
            .push(LogicalResource::new(name, ResourceType::Buffer, description_index, externally_owned));
        ResourceHandle::new(index, 0)
    }

    /// Emit a new resource entry sharing `source`'s name and description but
    /// carrying `new_version`, per `write_attachment`'s contract (spec.md
    /// §4.6.1). The physical-slot sharing this implies is resolved later by
    /// name-grouped aliasing (see [`alias`]), not here.
    pub(crate) fn push_resource_version(&mut self, source: ResourceHandle, new_version: u32) -> ResourceHandle {
        let previous = self.resource(source).clone();
        let index = self.resources.len() as u32;
        let mut next = LogicalResource::new(
            previous.name.clone(),
            previous.resource_type,
            previous.description_index,
            previous.externally_owned,
        );
        next.version = new_version;
        next.image_usage_flags = previous.image_usage_flags;
        next.buffer_usage_flags = previous.buffer_usage_flags;
        self.resources.push(next);
        ResourceHandle::new(index, new_version)
    }

    /// Compute resource timelines, determine aliasing, and create every
    /// physical image/buffer and rasterizer render pass/framebuffer set
    /// (spec.md §4.6.2-§4.6.5). Must run before the first [`RenderGraph::execute`].
    pub fn compile(&mut self, context: &VulkanContext, swap_chain_extent: vk::Extent2D) -> Result<()> {
        self.validate_topology()?;

        let timelines = timeline::calculate_resource_timelines(&self.resources, &self.passes);
        let aliasing = alias::determine_aliased_resources(
            &self.resources,
            &self.image_descriptions,
            &self.buffer_descriptions,
            &timelines,
        );

        for (index, resource) in self.resources.iter_mut().enumerate() {
            resource.physical_index = Some(aliasing.physical_index[index]);
        }

        self.physical_images = compile::create_physical_images(
            context,
            &self.resources,
            &self.image_descriptions,
            &aliasing,
            swap_chain_extent,
        )?;
        self.physical_buffers =
            compile::create_physical_buffers(context, &self.resources, &self.buffer_descriptions, &aliasing)?;

        self.physical_passes = Vec::with_capacity(self.passes.len());
        for pass in &self.passes {
            if pass.pass_type != PassType::Rasterizer {
                self.physical_passes.push(None);
                continue;
            }

            let color_attachments: Vec<(&LogicalResource, usize, &PhysicalImage)> = pass
                .color_attachments
                .iter()
                .map(|&handle| {
                    let resource = &self.resources[handle.index() as usize];
                    let physical_index = resource.physical_index.expect("aliasing assigned above");
                    (resource, physical_index, &self.physical_images[physical_index])
                })
                .collect();
            let depth_attachment = pass.depth_stencil_attachment.map(|handle| {
                let resource = &self.resources[handle.index() as usize];
                let physical_index = resource.physical_index.expect("aliasing assigned above");
                (resource, physical_index, &self.physical_images[physical_index])
            });

            let physical_pass = compile::build_physical_pass(
                context,
                &color_attachments,
                depth_attachment,
                self.frames_in_flight,
                &pass.name,
            )?;
            self.physical_passes.push(Some(physical_pass));
        }

        self.swap_chain_extent = swap_chain_extent;
        self.compiled = true;
        Ok(())
    }

    /// Record one pass's synchronization and execution for the current
    /// virtual frame slot (spec.md §4.6.6).
    pub fn execute(&mut self, device: &ash::Device, command_buffer: vk::CommandBuffer, virtual_index: usize) -> Result<()> {
        if !self.compiled {
            return Err(Error::GraphValidation {
                reason: "execute called before compile".into(),
            });
        }
        execute::execute_passes(self, device, command_buffer, virtual_index)
    }

    /// Re-evaluate aliasing and recreate every physical resource and
    /// rasterizer render pass/framebuffer against a new swap-chain extent
    /// (spec.md §4.6.6: "resize"). Logical topology is unchanged.
    ///
    /// The outgoing physical resources are not destroyed immediately: a
    /// command buffer recorded against them may still be in flight on the
    /// GPU, so their destruction is queued on [`ResourceDeallocator`] with
    /// `frames_in_flight` latency (spec.md §3's "destroyed ... through the
    /// deallocator with N-frame latency") rather than forcing a
    /// `wait_idle`. The caller must keep calling
    /// [`RenderGraph::decrement_resource_lifetimes`] once per frame for the
    /// queued entries to actually fire.
    pub fn resize(&mut self, context: &VulkanContext, swap_chain_extent: vk::Extent2D) -> Result<()> {
        self.defer_physical_state_destruction(context);
        self.compile(context, swap_chain_extent)
    }

    /// Tear down every physical resource and drain the deallocator
    /// immediately, regardless of any still-pending frame countdown. Call
    /// after `context.wait_idle()` at shutdown: no further frames are coming
    /// to drain the deallocator's queue on its own schedule, and the device
    /// being idle makes immediate destruction safe.
    pub fn finish(&mut self, context: &VulkanContext) -> Result<()> {
        context.wait_idle()?;
        self.defer_physical_state_destruction(context);
        self.deallocator.drain_all();
        self.compiled = false;
        Ok(())
    }

    /// Advance the deallocator's per-entry frame countdown by one, running
    /// (and removing) any destructor that reaches zero. Call exactly once
    /// per `end_frame`, mirroring [`crate::frame::VirtualFramePool`]'s own
    /// per-frame tick.
    pub fn decrement_resource_lifetimes(&mut self) {
        self.deallocator.decrement_lifetimes();
    }

    /// Queue every current physical resource's destruction on the
    /// deallocator rather than destroying synchronously, then clear this
    /// graph's handles to them so `compile` can assign fresh ones.
    fn defer_physical_state_destruction(&mut self, context: &VulkanContext) {
        let frames_to_live = self.frames_in_flight as u32;
        let allocator = context.allocator_handle();

        for image in self.physical_images.drain(..) {
            let allocator = allocator.clone();
            self.deallocator.defer(frames_to_live, move || {
                image.image.destroy(&allocator);
            });
        }
        for buffer in self.physical_buffers.drain(..) {
            if let Some(buffer) = buffer.buffer {
                let allocator = allocator.clone();
                self.deallocator.defer(frames_to_live, move || {
                    buffer.destroy(&allocator);
                });
            }
        }
        // PhysicalPass's Drop destroys its render pass and framebuffers, so
        // deferring it is just keeping it alive under the closure until the
        // countdown reaches zero, then letting it drop.
        for physical_pass in self.physical_passes.drain(..).flatten() {
            self.deallocator.defer(frames_to_live, move || {
                drop(physical_pass);
            });
        }
    }

    fn validate_topology(&self) -> Result<()> {
        for resource in &self.resources {
            if resource.producer.is_none() && !resource.read_passes.is_empty() {
                return Err(Error::GraphValidation {
                    reason: format!("resource '{}' is read but never produced", resource.name),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn passes(&self) -> &[Pass] {
        &self.passes
    }

    pub(crate) fn resources_slice(&self) -> &[LogicalResource] {
        &self.resources
    }

    pub(crate) fn physical_image_mut(&mut self, index: usize) -> &mut PhysicalImage {
        &mut self.physical_images[index]
    }

    pub(crate) fn physical_buffer_mut(&mut self, index: usize) -> &mut PhysicalBuffer {
        &mut self.physical_buffers[index]
    }

    pub(crate) fn physical_pass(&self, pass_index: usize) -> Option<&PhysicalPass> {
        self.physical_passes[pass_index].as_ref()
    }

    /// Pipelined depth this graph was constructed with.
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Borrow the compiled physical image backing `handle`, for a caller that
    /// needs to consume a graph output past the graph's own passes — the
    /// canonical case being a blit/copy of an `export_texture`-marked
    /// resource into the acquired swap-chain image, since the swap chain is
    /// never itself a graph resource (spec.md §4.6.1: "exports ... survive
    /// beyond the graph's last internal reader").
    pub fn exported_image(&self, handle: ResourceHandle) -> &Image {
        let resource = self.resource(handle);
        let physical_index = resource.physical_index.expect("exported_image called before compile");
        &self.physical_images[physical_index].image
    }
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new(DEFAULT_FRAMES_IN_FLIGHT)
    }
}
