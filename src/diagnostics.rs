//! Loop profiling and runtime diagnostics.
//!
//! Every pass of the control loop is timed against the HAL clock.  A pass
//! longer than the configured budget is logged, since it delays the
//! network poll and the RAPI pump.  Free heap is sampled on the fast
//! interval and the low-water mark kept.

use log::warn;

/// Pass timing statistics.
#[derive(Debug, Clone, Default)]
pub struct LoopProfiler {
    budget_ms: u32,
    passes: u64,
    overruns: u64,
    last_ms: u32,
    worst_ms: u32,
}

impl LoopProfiler {
    pub fn new(budget_ms: u32) -> Self {
        Self {
            budget_ms,
            ..Self::default()
        }
    }

    /// Record one pass that ran from `start` to `end` (HAL ms, may wrap).
    /// Returns its duration.
    pub fn record(&mut self, start: u32, end: u32) -> u32 {
        let took = end.wrapping_sub(start);
        self.passes = self.passes.wrapping_add(1);
        self.last_ms = took;
        self.worst_ms = self.worst_ms.max(took);
        if took > self.budget_ms {
            self.overruns = self.overruns.wrapping_add(1);
            warn!(
                "Loop: pass took {} ms (budget {} ms, worst {} ms)",
                took, self.budget_ms, self.worst_ms
            );
        }
        took
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Passes that exceeded the budget.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn last_ms(&self) -> u32 {
        self.last_ms
    }

    pub fn worst_ms(&self) -> u32 {
        self.worst_ms
    }
}

/// Free-heap samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapMonitor {
    last: u32,
    min: Option<u32>,
}

impl HeapMonitor {
    pub fn sample(&mut self, free: u32) {
        log::info!("Free: {}", free);
        self.last = free;
        self.min = Some(self.min.map_or(free, |m| m.min(free)));
    }

    pub fn last(&self) -> u32 {
        self.last
    }

    /// Lowest free heap seen, `0` before the first sample.
    pub fn min(&self) -> u32 {
        self.min.unwrap_or(0)
    }
}

// ───────────────────────────────────────────────────────────────
// Panic hook
// ───────────────────────────────────────────────────────────────

/// Install a panic hook that logs the reason through `log` before the
/// default handler resets the chip.
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };

        match info.location() {
            Some(loc) => log::error!("PANIC: {} at {}:{}", reason, loc.file(), loc.line()),
            None => log::error!("PANIC: {}", reason),
        }
    }));
}
