//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                 | Connects to               |
//! |------------|----------------------------|---------------------------|
//! | `log_sink` | EventSink, BrokerPort      | Serial log output         |
//! |            | TelemetrySink, DisplayPort |                           |
//! |            | SolarPort, Service         |                           |
//! | `nvs`      | ConfigPort                 | NVS / in-memory store     |
//! | `ota`      | OtaStatus, Service         | esp-ota partition writer  |
//! | `time`     | HalPort                    | ESP32 system timer, heap  |
//! | `uart`     | Transport                  | UART1 to the EVSE         |
//! | `watchdog` | (none)                     | Task watchdog timer       |
//! | `wifi`     | NetworkPort, Service       | ESP-IDF WiFi STA          |

pub mod log_sink;
pub mod nvs;
pub mod ota;
pub mod time;
pub mod uart;
pub mod watchdog;
pub mod wifi;
