//! Render metrics
//!
//! Counters shared by the aggregators and the compositor, exported as a flat
//! map for the gateway's `/metrics` route.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Counters for event folding and rendering.
pub struct RenderMetrics {
    // Folding
    pub events_folded: AtomicU64,
    pub events_ignored: AtomicU64,
    pub bootstrap_failures: AtomicU64,

    // Rendering
    pub fragments_rendered: AtomicU64,
    pub render_failures: AtomicU64,

    // Composition
    pub compositions: AtomicU64,
    pub compositions_failed: AtomicU64,
    pub composition_us: Mutex<LatencyTracker>,
}

impl RenderMetrics {
    pub fn new() -> Self {
        Self {
            events_folded: AtomicU64::new(0),
            events_ignored: AtomicU64::new(0),
            bootstrap_failures: AtomicU64::new(0),
            fragments_rendered: AtomicU64::new(0),
            render_failures: AtomicU64::new(0),
            compositions: AtomicU64::new(0),
            compositions_failed: AtomicU64::new(0),
            composition_us: Mutex::new(LatencyTracker::new(1000)),
        }
    }

    /// Record an event applied to renderer state.
    pub fn record_fold(&self) {
        self.events_folded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event that did not concern the renderer.
    pub fn record_ignored(&self) {
        self.events_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bootstrap_failure(&self) {
        self.bootstrap_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one item renderer call.
    pub fn record_render(&self, ok: bool) {
        if ok {
            self.fragments_rendered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.render_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a finished composition and how long it took.
    pub fn record_composition(&self, ok: bool, elapsed_us: u64) {
        self.compositions.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.compositions_failed.fetch_add(1, Ordering::Relaxed);
        }
        if let Ok(mut tracker) = self.composition_us.lock() {
            tracker.record(elapsed_us);
        }
    }

    /// Export metrics as a flat map.
    pub fn export(&self) -> BTreeMap<String, u64> {
        let mut m = BTreeMap::new();
        m.insert("events_folded".to_string(), self.events_folded.load(Ordering::Relaxed));
        m.insert("events_ignored".to_string(), self.events_ignored.load(Ordering::Relaxed));
        m.insert("bootstrap_failures".to_string(), self.bootstrap_failures.load(Ordering::Relaxed));
        m.insert("fragments_rendered".to_string(), self.fragments_rendered.load(Ordering::Relaxed));
        m.insert("render_failures".to_string(), self.render_failures.load(Ordering::Relaxed));
        m.insert("compositions".to_string(), self.compositions.load(Ordering::Relaxed));
        m.insert("compositions_failed".to_string(), self.compositions_failed.load(Ordering::Relaxed));
        if let Ok(tracker) = self.composition_us.lock() {
            if let Some(p50) = tracker.percentile(50) {
                m.insert("composition_p50_us".to_string(), p50);
            }
            if let Some(p99) = tracker.percentile(99) {
                m.insert("composition_p99_us".to_string(), p99);
            }
        }
        m
    }
}

impl Default for RenderMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Ring of the most recent composition latencies, in microseconds.
pub struct LatencyTracker {
    window: VecDeque<u64>,
    capacity: usize,
}

impl LatencyTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record one sample, evicting the oldest once the ring is full.
    pub fn record(&mut self, elapsed_us: u64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(elapsed_us);
    }

    /// Sample at percentile `p` (0-100) of the current window.
    pub fn percentile(&self, p: usize) -> Option<u64> {
        let last = self.window.len().checked_sub(1)?;
        let rank = (p.min(100) * last) / 100;
        let mut samples: Vec<u64> = self.window.iter().copied().collect();
        let (_, value, _) = samples.select_nth_unstable(rank);
        Some(*value)
    }

    pub fn count(&self) -> usize {
        self.window.len()
    }
}
