//! Resource timeline computation (spec.md §4.6.2), grounded on
//! `RenderGraph::calculateResourceTimelines` in `original_source`.

use std::collections::HashMap;

use crate::graph::handle::EXTERNAL_PASS;
use crate::graph::pass::Pass;
use crate::graph::resource::LogicalResource;

/// `firstWrite`/`lastRead` pass indices for one logical resource, merged
/// across every versioned handle sharing its name (so a `write_attachment`
/// chain is tracked as one continuous lifetime, matching
/// `original_source`'s name-keyed merge).
#[derive(Debug, Clone, Copy)]
pub struct ResourceTimeline {
    /// Earliest pass index that writes this resource (by name). `u32::MAX`
    /// if never written — an unreachable state for a well-formed graph,
    /// since every resource is created by exactly one builder call.
    pub first_write: u32,
    /// Latest pass index that reads this resource (by name). `0` if never
    /// read (spec.md §8: "lastRead = 0" for a write-only resource).
    pub last_read: u32,
}

impl Default for ResourceTimeline {
    fn default() -> Self {
        Self { first_write: u32::MAX, last_read: 0 }
    }
}

/// Compute one timeline per logical resource, indexed the same as
/// `resources`. Resources sharing a name (successive `write_attachment`
/// versions of the same attachment) receive the identical merged timeline.
pub fn calculate_resource_timelines(resources: &[LogicalResource], passes: &[Pass]) -> Vec<ResourceTimeline> {
    let mut by_name: HashMap<&str, ResourceTimeline> = HashMap::new();
    for resource in resources {
        by_name.entry(resource.name.as_str()).or_default();
    }

    for (pass_idx, pass) in passes.iter().enumerate() {
        let pass_idx = pass_idx as u32;
        for &input in &pass.inputs {
            let name = resources[input.index() as usize].name.as_str();
            let tl = by_name.get_mut(name).expect("resource referenced by pass but absent from graph");
            tl.last_read = tl.last_read.max(pass_idx);
        }
        for &output in &pass.outputs {
            let name = resources[output.index() as usize].name.as_str();
            let tl = by_name.get_mut(name).expect("resource referenced by pass but absent from graph");
            tl.first_write = tl.first_write.min(pass_idx);
        }
    }

    // A resource exported via `export_texture`/`mark_transfer_source` carries
    // the `EXTERNAL_PASS` sentinel in its `read_passes` (builder.rs), meaning
    // a reader outside the graph's own pass list survives past the last
    // internal pass. Pin its `last_read` to `u32::MAX` so it is never satisfied
    // by `alias.rs`'s `timeline[i].last_read < timeline[j].first_write` check,
    // which keeps anything from being chained onto its physical slot.
    for resource in resources {
        if resource.read_passes.contains(&EXTERNAL_PASS) {
            let tl = by_name
                .get_mut(resource.name.as_str())
                .expect("resource referenced by pass but absent from graph");
            tl.last_read = u32::MAX;
        }
    }

    let timelines: Vec<ResourceTimeline> = resources.iter().map(|r| by_name[r.name.as_str()]).collect();
    if log::log_enabled!(log::Level::Debug) {
        for (resource, timeline) in resources.iter().zip(&timelines) {
            log::debug!(
                "resource '{}': firstWrite={}, lastRead={}",
                resource.name,
                timeline.first_write,
                timeline.last_read
            );
        }
    }
    timelines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::handle::ResourceHandle;
    use crate::graph::resource::ResourceType;

    fn resource(name: &str) -> LogicalResource {
        LogicalResource::new(name.to_string(), ResourceType::Image, 0, false)
    }

    #[test]
    fn exported_resource_last_read_is_pinned_to_max() {
        // P1 writes "a" and reads nothing further inside the graph, but "a"
        // is exported (read_passes carries EXTERNAL_PASS), so its last_read
        // must never be satisfiable by a later pass's first_write.
        let mut exported = resource("a");
        exported.read_passes.push(EXTERNAL_PASS);
        let resources = vec![exported, resource("b")];

        let mut p1 = Pass::new("p1".into());
        p1.outputs.push(ResourceHandle::new(0, 0));
        let mut p2 = Pass::new("p2".into());
        p2.outputs.push(ResourceHandle::new(1, 0));

        let timelines = calculate_resource_timelines(&resources, &[p1, p2]);
        assert_eq!(timelines[0].last_read, u32::MAX);
        assert!(!(timelines[0].last_read < timelines[1].first_write));
    }

    #[test]
    fn write_only_resource_has_last_read_zero() {
        let resources = vec![resource("a")];
        let mut pass = Pass::new("p0".into());
        pass.outputs.push(ResourceHandle::new(0, 0));
        let timelines = calculate_resource_timelines(&resources, &[pass]);
        assert_eq!(timelines[0].first_write, 0);
        assert_eq!(timelines[0].last_read, 0);
    }

    #[test]
    fn ping_pong_chain_tracks_first_write_and_last_read() {
        // P1 creates A, P2 reads A and creates B, P3 reads B and creates C, P4 reads C.
        let resources = vec![resource("a"), resource("b"), resource("c")];
        let mut p1 = Pass::new("p1".into());
        p1.outputs.push(ResourceHandle::new(0, 0));
        let mut p2 = Pass::new("p2".into());
        p2.inputs.push(ResourceHandle::new(0, 0));
        p2.outputs.push(ResourceHandle::new(1, 0));
        let mut p3 = Pass::new("p3".into());
        p3.inputs.push(ResourceHandle::new(1, 0));
        p3.outputs.push(ResourceHandle::new(2, 0));
        let mut p4 = Pass::new("p4".into());
        p4.inputs.push(ResourceHandle::new(2, 0));

        let timelines = calculate_resource_timelines(&resources, &[p1, p2, p3, p4]);
        assert_eq!(timelines[0].first_write, 0);
        assert_eq!(timelines[0].last_read, 1);
        assert_eq!(timelines[2].first_write, 2);
        assert!(timelines[0].last_read < timelines[2].first_write);
    }
}
