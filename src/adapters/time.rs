//! ESP32 clock and heap adapter.
//!
//! Implements [`HalPort`] for the control loop.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` (microseconds since
//!   boot) truncated to a wrapping millisecond counter, and
//!   `esp_get_free_heap_size()`.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` and a synthetic
//!   heap figure for host-side simulation.

use crate::app::ports::HalPort;

/// Clock and heap queries for the ESP32.
pub struct Esp32Hal {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32Hal {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32Hal {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    pub fn uptime_secs(&self) -> u64 {
        self.uptime_us() / 1_000_000
    }

    /// Lowest free heap since boot.
    #[cfg(target_os = "espidf")]
    pub fn min_free_heap(&self) -> u32 {
        unsafe { esp_idf_svc::sys::esp_get_minimum_free_heap_size() }
    }

    /// Lowest free heap since boot.
    #[cfg(not(target_os = "espidf"))]
    pub fn min_free_heap(&self) -> u32 {
        (self.free_heap() as f32 * 0.85) as u32
    }
}

impl HalPort for Esp32Hal {
    fn now_ms(&self) -> u32 {
        // Truncation is the wrap.
        (self.uptime_us() / 1_000) as u32
    }

    #[cfg(target_os = "espidf")]
    fn free_heap(&self) -> u32 {
        unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
    }

    #[cfg(not(target_os = "espidf"))]
    fn free_heap(&self) -> u32 {
        // ~200 KB, losing 256 B per simulated minute.
        let base: u32 = 204_800;
        let decay = (self.uptime_secs() / 60) as u32 * 256;
        base.saturating_sub(decay)
    }
}
