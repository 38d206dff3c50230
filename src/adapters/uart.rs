//! UART transport to the EVSE controller.
//!
//! Implements [`Transport`] over an ESP-IDF UART driver.  Reads never
//! block: `uart_read_bytes` is called with a zero tick timeout and returns
//! whatever the driver's RX ring holds.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: raw `esp_idf_svc::sys` UART driver calls.
//! - **all other targets**: an in-process stub that records writes and
//!   replays bytes queued with [`UartTransport::sim_inject`].

use log::info;

use crate::pins;
use crate::rapi::Transport;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// UART-backed RAPI transport.
pub struct UartTransport {
    port: i32,
    #[cfg(not(target_os = "espidf"))]
    sim_rx: std::collections::VecDeque<u8>,
    #[cfg(not(target_os = "espidf"))]
    sim_tx: Vec<u8>,
}

impl UartTransport {
    /// Install the UART driver on the RAPI port and pins.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, EspError> {
        let port = pins::RAPI_UART_PORT;

        // SAFETY: called once from the main task before the loop starts;
        // the config struct outlives the call.
        unsafe {
            let mut cfg: uart_config_t = core::mem::zeroed();
            cfg.baud_rate = pins::RAPI_BAUD as i32;
            cfg.data_bits = uart_word_length_t_UART_DATA_8_BITS;
            cfg.parity = uart_parity_t_UART_PARITY_DISABLE;
            cfg.stop_bits = uart_stop_bits_t_UART_STOP_BITS_1;
            cfg.flow_ctrl = uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE;

            esp!(uart_param_config(port, &cfg))?;
            esp!(uart_set_pin(
                port,
                pins::RAPI_TX_GPIO,
                pins::RAPI_RX_GPIO,
                UART_PIN_NO_CHANGE,
                UART_PIN_NO_CHANGE,
            ))?;
            esp!(uart_driver_install(
                port,
                pins::RAPI_RX_BUF as i32,
                0,
                0,
                core::ptr::null_mut(),
                0,
            ))?;
        }

        info!(
            "UART{}: RAPI link at {} baud (tx={}, rx={})",
            port,
            pins::RAPI_BAUD,
            pins::RAPI_TX_GPIO,
            pins::RAPI_RX_GPIO
        );
        Ok(Self { port })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, i32> {
        info!("UART(sim): RAPI link at {} baud", pins::RAPI_BAUD);
        Ok(Self {
            port: pins::RAPI_UART_PORT,
            sim_rx: std::collections::VecDeque::new(),
            sim_tx: Vec::new(),
        })
    }

    pub fn port(&self) -> i32 {
        self.port
    }

    /// Queue bytes as if the EVSE had sent them.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_inject(&mut self, data: &[u8]) {
        self.sim_rx.extend(data.iter().copied());
    }

    /// Take everything written so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_take_written(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.sim_tx)
    }
}

#[cfg(target_os = "espidf")]
impl Transport for UartTransport {
    type Error = i32;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, i32> {
        let n = unsafe { uart_read_bytes(self.port, buf.as_mut_ptr().cast(), buf.len() as u32, 0) };
        if n < 0 {
            return Err(n);
        }
        Ok(n as usize)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, i32> {
        let n = unsafe { uart_write_bytes(self.port, data.as_ptr().cast(), data.len()) };
        if n < 0 {
            return Err(n);
        }
        Ok(n as usize)
    }

    fn flush(&mut self) -> Result<(), i32> {
        // uart_write_bytes already copied into the driver's TX path.
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
impl Transport for UartTransport {
    type Error = i32;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, i32> {
        let mut n = 0;
        while n < buf.len() {
            let Some(b) = self.sim_rx.pop_front() else {
                break;
            };
            buf[n] = b;
            n += 1;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, i32> {
        self.sim_tx.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), i32> {
        Ok(())
    }
}
