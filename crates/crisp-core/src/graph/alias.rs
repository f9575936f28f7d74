//! Resource aliasing (spec.md §4.6.3), grounded on
//! `RenderGraph::determineAliasedResources` in `original_source`'s
//! `RenderGraph.cpp`.
//!
//! Logical resources are grouped by name first: every versioned handle a
//! `write_attachment` chain produces shares one physical slot unconditionally
//! (spec.md §4.6.1: "emits a new versioned handle ... referring to the same
//! physical slot"), so the chain-search below operates one level up, over
//! distinct resource *names*, not over every `LogicalResource` array entry.

use std::collections::HashMap;

use crate::graph::resource::{BufferDescription, ImageDescription, LogicalResource, ResourceType};
use crate::graph::timeline::ResourceTimeline;

/// One distinct-named resource's aliasing inputs: its declaration-order
/// position, type, description, externality, and merged timeline.
struct NamedSlot<'a> {
    name: &'a str,
    resource_type: ResourceType,
    description_index: usize,
    externally_owned: bool,
    timeline: ResourceTimeline,
}

/// Assigned physical index per logical-resource array entry, plus the
/// per-physical-slot list of member names (for diagnostics/tests) and the
/// accumulated usage flags callers need to create the backing object.
pub struct AliasingResult {
    /// `physical_index[i]` is resource `i`'s assigned physical slot.
    pub physical_index: Vec<usize>,
    /// Number of distinct physical image slots produced.
    pub physical_image_count: usize,
    /// Number of distinct physical buffer slots produced.
    pub physical_buffer_count: usize,
}

/// Compute physical slot assignment for every logical resource, per
/// spec.md §4.6.3's greedy chain-search: scan named resources in
/// declaration order; for each unclaimed name, extend a chain by repeatedly
/// picking the next unclaimed, type-and-description-compatible name whose
/// `firstWrite` exceeds the chain's running `lastRead`.
pub fn determine_aliased_resources(
    resources: &[LogicalResource],
    image_descriptions: &[ImageDescription],
    buffer_descriptions: &[BufferDescription],
    timelines: &[ResourceTimeline],
) -> AliasingResult {
    // One named slot per distinct name, in first-appearance (declaration)
    // order, carrying the already name-merged timeline computed by
    // `calculate_resource_timelines`.
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut slots: Vec<NamedSlot> = Vec::new();
    for (idx, resource) in resources.iter().enumerate() {
        if seen.contains_key(resource.name.as_str()) {
            continue;
        }
        seen.insert(resource.name.as_str(), slots.len());
        slots.push(NamedSlot {
            name: resource.name.as_str(),
            resource_type: resource.resource_type,
            description_index: resource.description_index,
            externally_owned: resource.externally_owned,
            timeline: timelines[idx],
        });
    }

    let mut physical_slot_of_name: Vec<Option<usize>> = vec![None; slots.len()];
    let mut next_physical_image = 0usize;
    let mut next_physical_buffer = 0usize;

    for i in 0..slots.len() {
        if physical_slot_of_name[i].is_some() {
            continue;
        }

        let physical_index = match slots[i].resource_type {
            ResourceType::Image => {
                let idx = next_physical_image;
                next_physical_image += 1;
                idx
            }
            ResourceType::Buffer => {
                let idx = next_physical_buffer;
                next_physical_buffer += 1;
                idx
            }
        };
        physical_slot_of_name[i] = Some(physical_index);

        if slots[i].externally_owned {
            continue;
        }

        let mut chain_last_read = slots[i].timeline.last_read;
        for j in (i + 1)..slots.len() {
            if physical_slot_of_name[j].is_some() {
                continue;
            }
            if slots[j].externally_owned {
                continue;
            }
            if slots[j].resource_type != slots[i].resource_type {
                continue;
            }
            let compatible = match slots[i].resource_type {
                ResourceType::Image => image_descriptions[slots[i].description_index]
                    .alias_compatible(&image_descriptions[slots[j].description_index]),
                ResourceType::Buffer => buffer_descriptions[slots[i].description_index]
                    .alias_compatible(&buffer_descriptions[slots[j].description_index]),
            };
            if !compatible {
                continue;
            }
            if !(chain_last_read < slots[j].timeline.first_write) {
                continue;
            }

            physical_slot_of_name[j] = Some(physical_index);
            chain_last_read = slots[j].timeline.last_read;
        }
    }

    let physical_index_of_name: HashMap<&str, usize> = slots
        .iter()
        .enumerate()
        .map(|(i, slot)| (slot.name, physical_slot_of_name[i].expect("every slot assigned a physical index")))
        .collect();

    let physical_index = resources
        .iter()
        .map(|r| physical_index_of_name[r.name.as_str()])
        .collect();

    AliasingResult {
        physical_index,
        physical_image_count: next_physical_image,
        physical_buffer_count: next_physical_buffer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::resource::ResourceType;
    use ash::vk;

    fn image_desc() -> ImageDescription {
        ImageDescription::swap_chain_relative(vk::Format::R16G16B16A16_SFLOAT)
    }

    fn resource(name: &str, description_index: usize) -> LogicalResource {
        LogicalResource::new(name.to_string(), ResourceType::Image, description_index, false)
    }

    #[test]
    fn ping_pong_aliases_a_with_c_but_not_b() {
        // P1 creates A, P2 reads A and creates B, P3 reads B and creates C, P4 reads C.
        let descriptions = vec![image_desc()];
        let resources = vec![resource("a", 0), resource("b", 0), resource("c", 0)];
        let timelines = vec![
            ResourceTimeline { first_write: 0, last_read: 1 },
            ResourceTimeline { first_write: 1, last_read: 2 },
            ResourceTimeline { first_write: 2, last_read: 3 },
        ];

        let result = determine_aliased_resources(&resources, &descriptions, &[], &timelines);
        assert_eq!(result.physical_index[0], result.physical_index[2]);
        assert_ne!(result.physical_index[0], result.physical_index[1]);
        assert_eq!(result.physical_image_count, 2);
    }

    #[test]
    fn incompatible_description_never_aliases() {
        let descriptions = vec![
            image_desc(),
            ImageDescription::absolute(vk::Format::R16G16B16A16_SFLOAT, 64, 64),
        ];
        let resources = vec![resource("a", 0), resource("b", 1)];
        let timelines = vec![
            ResourceTimeline { first_write: 0, last_read: 0 },
            ResourceTimeline { first_write: 1, last_read: 1 },
        ];
        let result = determine_aliased_resources(&resources, &descriptions, &[], &timelines);
        assert_ne!(result.physical_index[0], result.physical_index[1]);
    }

    #[test]
    fn overlapping_lifetimes_never_alias() {
        let descriptions = vec![image_desc()];
        let resources = vec![resource("a", 0), resource("b", 0)];
        // a's last_read (2) is not < b's first_write (1): overlapping.
        let timelines = vec![
            ResourceTimeline { first_write: 0, last_read: 2 },
            ResourceTimeline { first_write: 1, last_read: 3 },
        ];
        let result = determine_aliased_resources(&resources, &descriptions, &[], &timelines);
        assert_ne!(result.physical_index[0], result.physical_index[1]);
    }

    #[test]
    fn external_resource_never_shares_a_slot() {
        let descriptions = vec![image_desc()];
        let mut a = resource("a", 0);
        a.externally_owned = true;
        let b = resource("b", 0);
        let timelines = vec![
            ResourceTimeline { first_write: 0, last_read: 0 },
            ResourceTimeline { first_write: 1, last_read: 1 },
        ];
        let result = determine_aliased_resources(&[a, b], &descriptions, &[], &timelines);
        assert_ne!(result.physical_index[0], result.physical_index[1]);
        assert_eq!(result.physical_image_count, 2);
    }
}
