//! Resource deallocator: defers destruction of GPU handles by N frames so a
//! resource still referenced by an in-flight command buffer is never freed
//! out from under the GPU.

/// One deferred destruction: a countdown plus the closure that actually
/// frees the resource once it reaches zero. Boxed so the queue can hold a
/// heterogeneous mix of buffer/image/pipeline destructors. Not `Send`:
/// recording and deferred teardown both happen on the single CPU thread that
/// owns the render graph (spec.md §5's single-threaded scheduling model), so
/// entries may close over non-`Send` handles (e.g. the `vk-mem` allocator)
/// without needing to cross a thread boundary.
struct Entry {
    frames_to_live: u32,
    destroy: Box<dyn FnOnce()>,
}

/// A FIFO-ish queue of deferred destructors. `decrement_lifetimes` is called
/// once per frame tick; entries that reach zero are drained and their
/// closures invoked in the order they were queued.
#[derive(Default)]
pub struct ResourceDeallocator {
    entries: Vec<Entry>,
}

impl ResourceDeallocator {
    /// Create an empty deallocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `destroy` to run after `frames_to_live` more
    /// `decrement_lifetimes` calls. Pass the frame pool's `N` (frames in
    /// flight) when retiring a resource that might still be read by a
    /// command buffer the GPU hasn't finished yet.
    pub fn defer(&mut self, frames_to_live: u32, destroy: impl FnOnce() + 'static) {
        self.entries.push(Entry {
            frames_to_live,
            destroy: Box::new(destroy),
        });
    }

    /// Advance every entry's countdown by one frame, running (and removing)
    /// any that reach zero. Call exactly once per `end_frame`.
    pub fn decrement_lifetimes(&mut self) {
        let mut remaining = Vec::with_capacity(self.entries.len());
        for mut entry in self.entries.drain(..) {
            if entry.frames_to_live == 0 {
                (entry.destroy)();
            } else {
                entry.frames_to_live -= 1;
                remaining.push(entry);
            }
        }
        self.entries = remaining;
    }

    /// Run every queued destructor immediately, regardless of remaining
    /// countdown. Called at shutdown after `VulkanContext::wait_idle`.
    pub fn drain_all(&mut self) {
        for entry in self.entries.drain(..) {
            (entry.destroy)();
        }
    }

    /// Number of destructors still pending. Exposed for tests and debug
    /// tooling, not load-bearing for correctness.
    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn fires_after_exactly_n_decrements() {
        let destroyed = Arc::new(AtomicU32::new(0));
        let mut deallocator = ResourceDeallocator::new();

        let flag = destroyed.clone();
        deallocator.defer(2, move || {
            flag.fetch_add(1, Ordering::SeqCst);
        });

        deallocator.decrement_lifetimes();
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
        deallocator.decrement_lifetimes();
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
        deallocator.decrement_lifetimes();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(deallocator.pending_count(), 0);
    }

    #[test]
    fn zero_lifetime_fires_on_first_decrement() {
        let destroyed = Arc::new(AtomicU32::new(0));
        let mut deallocator = ResourceDeallocator::new();
        let flag = destroyed.clone();
        deallocator.defer(0, move || {
            flag.fetch_add(1, Ordering::SeqCst);
        });
        deallocator.decrement_lifetimes();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drain_all_ignores_remaining_countdown() {
        let destroyed = Arc::new(AtomicU32::new(0));
        let mut deallocator = ResourceDeallocator::new();
        let flag = destroyed.clone();
        deallocator.defer(10, move || {
            flag.fetch_add(1, Ordering::SeqCst);
        });
        deallocator.drain_all();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(deallocator.pending_count(), 0);
    }
}
