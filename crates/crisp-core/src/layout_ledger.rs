//! Image-layout ledger: per-(layer, mip) layout tracking and barrier
//! synthesis.
//!
//! Tracks layout and access state per subresource rather than per whole
//! image, and is owned by whichever physical image it describes (see
//! `crate::graph::physical::PhysicalImage`) rather than kept in a
//! module-level static.

use ash::vk;

use crate::error::{Error, Result};

/// The access scope — pipeline stage plus access mask — recorded for a
/// subresource alongside its layout, so the next transition knows what to
/// synchronize against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessScope {
    /// Pipeline stage(s) that last touched this subresource.
    pub stage: vk::PipelineStageFlags,
    /// Access mask of that touch.
    pub access: vk::AccessFlags,
}

impl AccessScope {
    /// No prior access — used to seed freshly created images before their
    /// priming transition.
    pub const NONE: Self = Self {
        stage: vk::PipelineStageFlags::TOP_OF_PIPE,
        access: vk::AccessFlags::empty(),
    };
}

#[derive(Debug, Clone, Copy)]
struct Subresource {
    layout: vk::ImageLayout,
    scope: AccessScope,
}

/// Tracks the current layout and access scope of every (layer, mip) pair of
/// one physical image.
pub struct LayoutLedger {
    layer_count: u32,
    mip_count: u32,
    subresources: Vec<Subresource>,
}

impl LayoutLedger {
    /// Create a ledger with every subresource seeded to `initial_layout` and
    /// [`AccessScope::NONE`].
    pub fn new(layer_count: u32, mip_count: u32, initial_layout: vk::ImageLayout) -> Self {
        let subresources = vec![
            Subresource {
                layout: initial_layout,
                scope: AccessScope::NONE,
            };
            (layer_count * mip_count) as usize
        ];
        Self {
            layer_count,
            mip_count,
            subresources,
        }
    }

    fn index(&self, layer: u32, mip: u32) -> usize {
        (layer * self.mip_count + mip) as usize
    }

    /// Current layout of a single (layer, mip) subresource.
    pub fn layout_at(&self, layer: u32, mip: u32) -> vk::ImageLayout {
        self.subresources[self.index(layer, mip)].layout
    }

    /// Assert that every subresource in `range` currently shares one layout
    /// and return it; the caller is required to only ask for a uniform
    /// layout over a range that is actually uniform.
    pub fn uniform_layout(&self, range: vk::ImageSubresourceRange) -> Result<vk::ImageLayout> {
        let mut layouts = self.iter_range(range).map(|(_, _, sub)| sub.layout);
        let first = layouts.next().ok_or_else(|| {
            Error::GraphValidation {
                reason: "layout query over an empty subresource range".into(),
            }
        })?;
        if layouts.all(|layout| layout == first) {
            Ok(first)
        } else {
            Err(Error::GraphValidation {
                reason: "subresource range spans heterogeneous layouts".into(),
            })
        }
    }

    fn iter_range(
        &self,
        range: vk::ImageSubresourceRange,
    ) -> impl Iterator<Item = (u32, u32, &Subresource)> {
        let mip_count = self.mip_count;
        let layers = range.base_array_layer..(range.base_array_layer + range.layer_count);
        let mips = range.base_mip_level..(range.base_mip_level + range.level_count);
        layers.flat_map(move |layer| {
            mips.clone().map(move |mip| {
                let idx = (layer * mip_count + mip) as usize;
                (layer, mip, &self.subresources[idx])
            })
        })
    }

    /// Build (and apply) a transition for `range` from its current uniform
    /// layout to `new_layout` under the given destination access scope. If
    /// `new_layout` already matches the current layout, the transition is a
    /// no-op and `None` is returned.
    pub fn transition(
        &mut self,
        image: vk::Image,
        aspect_mask: vk::ImageAspectFlags,
        range: vk::ImageSubresourceRange,
        dst: AccessScope,
        new_layout: vk::ImageLayout,
    ) -> Result<Option<PendingBarrier>> {
        let current_layout = self.uniform_layout(range)?;
        let src = self.subresource_scope(range)?;

        if current_layout == new_layout {
            self.write_range(range, new_layout, dst);
            return Ok(None);
        }

        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(current_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange { aspect_mask, ..range })
            .src_access_mask(src.access)
            .dst_access_mask(dst.access)
            .build();

        self.write_range(range, new_layout, dst);

        Ok(Some(PendingBarrier {
            src_stage: src.stage,
            dst_stage: dst.stage,
            barrier,
        }))
    }

    fn subresource_scope(&self, range: vk::ImageSubresourceRange) -> Result<AccessScope> {
        self.iter_range(range)
            .next()
            .map(|(_, _, sub)| sub.scope)
            .ok_or_else(|| Error::GraphValidation {
                reason: "access-scope query over an empty subresource range".into(),
            })
    }

    /// Record `layout`/`scope` over `range` without issuing a barrier, for
    /// transitions a render pass performs implicitly (its `finalLayout`)
    /// that this crate never emits a `vkCmdPipelineBarrier` for itself.
    pub fn force_layout(&mut self, range: vk::ImageSubresourceRange, layout: vk::ImageLayout, scope: AccessScope) {
        self.write_range(range, layout, scope);
    }

    fn write_range(&mut self, range: vk::ImageSubresourceRange, layout: vk::ImageLayout, scope: AccessScope) {
        for layer in range.base_array_layer..(range.base_array_layer + range.layer_count) {
            for mip in range.base_mip_level..(range.base_mip_level + range.level_count) {
                let idx = self.index(layer, mip);
                self.subresources[idx] = Subresource { layout, scope };
            }
        }
    }

    /// Total (layer, mip) subresource count, used by tests and debug tooling.
    pub fn subresource_count(&self) -> usize {
        self.subresources.len()
    }

    /// Layer count this ledger was built with.
    pub fn layer_count(&self) -> u32 {
        self.layer_count
    }

    /// Mip count this ledger was built with.
    pub fn mip_count(&self) -> u32 {
        self.mip_count
    }
}

/// A barrier computed by [`LayoutLedger::transition`] but not yet recorded;
/// callers record it with `vkCmdPipelineBarrier` (this crate targets the
/// widely-supported synchronization1 barrier rather than
/// `vkCmdPipelineBarrier2`, since `VK_KHR_synchronization2` is not part of
/// this crate's baseline).
pub struct PendingBarrier {
    /// Source pipeline stage mask for `vkCmdPipelineBarrier`.
    pub src_stage: vk::PipelineStageFlags,
    /// Destination pipeline stage mask for `vkCmdPipelineBarrier`.
    pub dst_stage: vk::PipelineStageFlags,
    /// The image memory barrier itself.
    pub barrier: vk::ImageMemoryBarrier,
}

impl PendingBarrier {
    /// Record this barrier onto `command_buffer`.
    pub fn record(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
        unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                self.src_stage,
                self.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[self.barrier],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whole_range(layer_count: u32, mip_count: u32) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: mip_count,
            base_array_layer: 0,
            layer_count,
        }
    }

    #[test]
    fn new_ledger_reports_initial_layout_everywhere() {
        let ledger = LayoutLedger::new(2, 3, vk::ImageLayout::UNDEFINED);
        for layer in 0..2 {
            for mip in 0..3 {
                assert_eq!(ledger.layout_at(layer, mip), vk::ImageLayout::UNDEFINED);
            }
        }
        assert_eq!(ledger.subresource_count(), 6);
    }

    #[test]
    fn uniform_layout_detects_heterogeneous_range() {
        let mut ledger = LayoutLedger::new(1, 2, vk::ImageLayout::UNDEFINED);
        let single_mip = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 1,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        ledger
            .transition(
                vk::Image::null(),
                vk::ImageAspectFlags::COLOR,
                single_mip,
                AccessScope {
                    stage: vk::PipelineStageFlags::TRANSFER,
                    access: vk::AccessFlags::TRANSFER_WRITE,
                },
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            )
            .unwrap();

        let whole = whole_range(1, 2);
        assert!(ledger.uniform_layout(whole).is_err());
    }

    #[test]
    fn same_layout_transition_is_a_no_op() {
        let mut ledger = LayoutLedger::new(1, 1, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        let range = whole_range(1, 1);
        let result = ledger
            .transition(
                vk::Image::null(),
                vk::ImageAspectFlags::COLOR,
                range,
                AccessScope {
                    stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                    access: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                },
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            )
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn different_layout_produces_a_barrier_and_updates_ledger() {
        let mut ledger = LayoutLedger::new(1, 1, vk::ImageLayout::UNDEFINED);
        let range = whole_range(1, 1);
        let pending = ledger
            .transition(
                vk::Image::null(),
                vk::ImageAspectFlags::COLOR,
                range,
                AccessScope {
                    stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
                    access: vk::AccessFlags::SHADER_READ,
                },
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )
            .unwrap();
        assert!(pending.is_some());
        assert_eq!(ledger.layout_at(0, 0), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    }
}
