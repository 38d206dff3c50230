//! Firmware update adapter backed by the `esp-ota` crate.
//!
//! Flow: `begin` → N × `write` → `finalize` → reboot on the next service
//! pass.  The web server feeds uploaded chunks in; the control loop only
//! asks [`OtaStatus::is_update_in_progress`] so it can hold telemetry
//! while flash is being written.
//!
//! On ESP-IDF targets the `esp-ota` crate manages the inactive partition.
//! On simulation targets the byte accounting runs against in-memory stubs.

use core::fmt;
use log::{info, warn};

use super::time::Esp32Hal;
use crate::app::ports::{HalPort, OtaStatus, Service};
use crate::timer::elapsed;

const MAX_FIRMWARE_SIZE: u32 = 4 * 1024 * 1024; // 4 MB

/// Delay between a finalized image and the restart, so the upload's HTTP
/// response gets out.
const REBOOT_GRACE_MS: u32 = 1_000;

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaError {
    AlreadyInProgress,
    InvalidSize,
    BeginFailed,
    WriteFailed,
    VerifyFailed,
    BootSetFailed,
    IncompleteTransfer,
    NotReceiving,
    Overflow,
}

impl fmt::Display for OtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInProgress => write!(f, "update already in progress"),
            Self::InvalidSize => write!(f, "firmware size out of range (max 4 MB)"),
            Self::BeginFailed => write!(f, "OTA begin failed"),
            Self::WriteFailed => write!(f, "OTA write failed"),
            Self::VerifyFailed => write!(f, "OTA verification failed"),
            Self::BootSetFailed => write!(f, "set boot partition failed"),
            Self::IncompleteTransfer => write!(f, "finalize called before all bytes written"),
            Self::NotReceiving => write!(f, "no update in progress"),
            Self::Overflow => write!(f, "chunk would exceed declared firmware size"),
        }
    }
}

// ── State ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaState {
    Idle,
    Receiving {
        expected_size: u32,
        bytes_written: u32,
    },
    ReadyToReboot {
        since_ms: u32,
    },
}

// ── Updater ───────────────────────────────────────────────────

pub struct OtaUpdater {
    state: OtaState,
    clock: Esp32Hal,
    #[cfg(target_os = "espidf")]
    update: Option<esp_ota::OtaUpdate>,
    #[cfg(not(target_os = "espidf"))]
    sim_reboots: u32,
}

impl Default for OtaUpdater {
    fn default() -> Self {
        Self::new()
    }
}

impl OtaUpdater {
    pub fn new() -> Self {
        Self {
            state: OtaState::Idle,
            clock: Esp32Hal::new(),
            #[cfg(target_os = "espidf")]
            update: None,
            #[cfg(not(target_os = "espidf"))]
            sim_reboots: 0,
        }
    }

    pub fn state(&self) -> OtaState {
        self.state
    }

    /// Open the inactive partition for an image of `firmware_size` bytes.
    pub fn begin(&mut self, firmware_size: u32) -> Result<(), OtaError> {
        if self.state != OtaState::Idle {
            return Err(OtaError::AlreadyInProgress);
        }
        if firmware_size == 0 || firmware_size > MAX_FIRMWARE_SIZE {
            return Err(OtaError::InvalidSize);
        }

        #[cfg(target_os = "espidf")]
        {
            let update = esp_ota::OtaUpdate::begin().map_err(|e| {
                warn!("OTA: begin failed: {:?}", e);
                OtaError::BeginFailed
            })?;
            self.update = Some(update);
        }

        self.state = OtaState::Receiving {
            expected_size: firmware_size,
            bytes_written: 0,
        };
        info!("OTA: begin ({} bytes)", firmware_size);
        Ok(())
    }

    /// Append the next chunk.  Returns total bytes written.
    pub fn write(&mut self, data: &[u8]) -> Result<u32, OtaError> {
        let OtaState::Receiving {
            expected_size,
            bytes_written,
        } = self.state
        else {
            return Err(OtaError::NotReceiving);
        };

        let total = bytes_written.saturating_add(data.len() as u32);
        if total > expected_size {
            self.abort();
            return Err(OtaError::Overflow);
        }

        #[cfg(target_os = "espidf")]
        {
            let written = match self.update.as_mut() {
                Some(update) => update.write(data).map_err(|e| {
                    warn!("OTA: write failed: {:?}", e);
                    OtaError::WriteFailed
                }),
                None => Err(OtaError::NotReceiving),
            };
            if let Err(e) = written {
                self.abort();
                return Err(e);
            }
        }

        self.state = OtaState::Receiving {
            expected_size,
            bytes_written: total,
        };
        Ok(total)
    }

    /// Verify the image and make it the boot partition.
    pub fn finalize(&mut self) -> Result<(), OtaError> {
        match self.state {
            OtaState::Receiving {
                expected_size,
                bytes_written,
            } if bytes_written == expected_size => {}
            OtaState::Receiving { .. } => return Err(OtaError::IncompleteTransfer),
            _ => return Err(OtaError::NotReceiving),
        }

        #[cfg(target_os = "espidf")]
        {
            let Some(update) = self.update.take() else {
                self.state = OtaState::Idle;
                return Err(OtaError::NotReceiving);
            };
            let mut completed = match update.finalize() {
                Ok(c) => c,
                Err(e) => {
                    warn!("OTA: finalize failed: {:?}", e);
                    self.state = OtaState::Idle;
                    return Err(OtaError::VerifyFailed);
                }
            };
            if let Err(e) = completed.set_as_boot_partition() {
                warn!("OTA: set_as_boot_partition failed: {:?}", e);
                self.state = OtaState::Idle;
                return Err(OtaError::BootSetFailed);
            }
        }

        self.state = OtaState::ReadyToReboot {
            since_ms: self.clock.now_ms(),
        };
        info!("OTA: image verified, rebooting shortly");
        Ok(())
    }

    /// Abandon the current update.
    pub fn abort(&mut self) {
        #[cfg(target_os = "espidf")]
        {
            // Dropping the handle aborts the partition write.
            self.update.take();
        }
        self.state = OtaState::Idle;
        warn!("OTA: aborted");
    }

    #[cfg(target_os = "espidf")]
    fn reboot(&mut self) {
        info!("OTA: rebooting into new firmware");
        esp_ota::restart();
    }

    #[cfg(not(target_os = "espidf"))]
    fn reboot(&mut self) {
        info!("OTA(sim): reboot requested");
        self.sim_reboots += 1;
        self.state = OtaState::Idle;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_reboots(&self) -> u32 {
        self.sim_reboots
    }
}

impl OtaStatus for OtaUpdater {
    fn is_update_in_progress(&self) -> bool {
        matches!(self.state, OtaState::Receiving { .. })
    }
}

impl Service for OtaUpdater {
    fn name(&self) -> &'static str {
        "ota"
    }

    fn setup(&mut self) {
        check_rollback();
    }

    fn service(&mut self) {
        if let OtaState::ReadyToReboot { since_ms } = self.state {
            if elapsed(since_ms, REBOOT_GRACE_MS, self.clock.now_ms()) {
                self.reboot();
            }
        }
    }
}

// ── Boot validation ───────────────────────────────────────────

/// Mark the running image valid so the bootloader does not roll back.
#[cfg(target_os = "espidf")]
pub fn check_rollback() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: firmware marked valid (rollback cancelled)"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn check_rollback() {
    info!("OTA rollback check (simulation): skipped");
}

// ── Tests ─────────────────────────────────────────────────────
