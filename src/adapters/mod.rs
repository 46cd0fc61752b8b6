//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements         | Connects to                     |
//! |---------------|--------------------|---------------------------------|
//! | `ble`         | PairingPort        | BT controller + Bluedroid       |
//! | `display`     | DisplayPort        | AXS15231B over QSPI (`esp_lcd`) |
//! | `log_monitor` | HealthMonitor      | Serial log output               |
//! | `lvgl`        | UiEnginePort       | LVGL 8 C library                |
//! | `nvs`         | ConfigStorePort    | NVS / in-memory store           |
//! | `sdcard`      | StoragePort        | FAT on SDMMC                    |
//! | `sntp`        | TimeSyncPort       | ESP-IDF SNTP client             |
//! | `time`        | ClockPort          | ESP32 system timer / RTC        |
//! | `wifi`        | LinkPort           | ESP-IDF WiFi STA                |

pub mod ble;
pub mod display;
pub mod log_monitor;
pub mod lvgl;
pub mod nvs;
pub mod sdcard;
pub mod sntp;
pub mod time;
pub mod wifi;
