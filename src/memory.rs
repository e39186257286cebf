//! Heap accounting for benchmark cases.
//!
//! Rust has no collector to force, so the "collect, then read the heap" step of
//! a memory measurement maps onto a counting global allocator: every
//! allocation and deallocation updates process-wide atomics, and a reading is
//! simply a snapshot of them. The allocator also keeps a high-water mark of
//! live bytes, restarted at each case's baseline by [`MemoryProbe::reset_peak`].
//!
//! Binaries opt in with:
//!
//! ```ignore
//! #[global_allocator]
//! static GLOBAL: toonbench::memory::TrackingAllocator = toonbench::memory::TrackingAllocator;
//! ```
//!
//! Without that line the counters never move, [`TrackingProbe::is_available`]
//! reports `false`, and the suite refuses to start.

use std::alloc::{GlobalAlloc, Layout, System};
use std::hint::black_box;
use std::sync::atomic::{fence, AtomicU64, Ordering};

static ALLOCATED: AtomicU64 = AtomicU64::new(0);
static DEALLOCATED: AtomicU64 = AtomicU64::new(0);
static ALLOC_COUNT: AtomicU64 = AtomicU64::new(0);
static PEAK_LIVE: AtomicU64 = AtomicU64::new(0);

fn live_now() -> u64 {
    ALLOCATED
        .load(Ordering::SeqCst)
        .saturating_sub(DEALLOCATED.load(Ordering::SeqCst))
}

#[inline]
fn note_alloc(size: usize) {
    let size = size as u64;
    let allocated = ALLOCATED.fetch_add(size, Ordering::Relaxed) + size;
    ALLOC_COUNT.fetch_add(1, Ordering::Relaxed);
    let live = allocated.saturating_sub(DEALLOCATED.load(Ordering::Relaxed));
    PEAK_LIVE.fetch_max(live, Ordering::Relaxed);
}

/// Counting wrapper around the system allocator.
pub struct TrackingAllocator;

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            note_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            note_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        DEALLOCATED.fetch_add(layout.size() as u64, Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            // Accounted as a free of the old block plus a fresh allocation.
            DEALLOCATED.fetch_add(layout.size() as u64, Ordering::Relaxed);
            note_alloc(new_size);
        }
        new_ptr
    }
}

/// A point-in-time heap reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemorySnapshot {
    /// Bytes currently allocated and not yet freed.
    pub live_bytes: u64,
    /// Bytes ever allocated by the process.
    pub allocated_bytes: u64,
    /// Number of allocations ever made.
    pub allocations: u64,
    /// Highest live byte count seen since the last peak reset.
    pub peak_live_bytes: u64,
}

impl MemorySnapshot {
    /// Growth in live bytes since `before`, clamped at zero.
    pub fn live_delta(&self, before: &MemorySnapshot) -> u64 {
        self.live_bytes.saturating_sub(before.live_bytes)
    }

    /// Bytes allocated since `before`.
    pub fn allocated_delta(&self, before: &MemorySnapshot) -> u64 {
        self.allocated_bytes.saturating_sub(before.allocated_bytes)
    }

    /// How far the live heap rose above `before` at its peak.
    pub fn peak_delta(&self, before: &MemorySnapshot) -> u64 {
        self.peak_live_bytes.saturating_sub(before.live_bytes)
    }
}

/// Source of heap readings used by the runner.
pub trait MemoryProbe {
    /// Whether readings from this probe reflect real allocator activity.
    fn is_available(&self) -> bool;

    /// Bring the probe to a quiescent point before a reading.
    fn settle(&self) {}

    /// Restart peak tracking from the current live heap.
    fn reset_peak(&self) {}

    fn snapshot(&self) -> MemorySnapshot;
}

/// Probe backed by [`TrackingAllocator`]'s counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackingProbe;

impl MemoryProbe for TrackingProbe {
    fn is_available(&self) -> bool {
        let before = ALLOC_COUNT.load(Ordering::SeqCst);
        let probe = black_box(Box::new([0u8; 64]));
        drop(probe);
        ALLOC_COUNT.load(Ordering::SeqCst) != before
    }

    fn settle(&self) {
        fence(Ordering::SeqCst);
    }

    fn reset_peak(&self) {
        PEAK_LIVE.store(live_now(), Ordering::SeqCst);
    }

    fn snapshot(&self) -> MemorySnapshot {
        let allocated = ALLOCATED.load(Ordering::SeqCst);
        let deallocated = DEALLOCATED.load(Ordering::SeqCst);
        let live_bytes = allocated.saturating_sub(deallocated);
        MemorySnapshot {
            live_bytes,
            allocated_bytes: allocated,
            allocations: ALLOC_COUNT.load(Ordering::SeqCst),
            peak_live_bytes: PEAK_LIVE.load(Ordering::SeqCst).max(live_bytes),
        }
    }
}
