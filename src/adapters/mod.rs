//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements          | Connects to                  |
//! |-------------|---------------------|------------------------------|
//! | `spi`       | RegisterBus         | `embedded-hal` SpiDevice     |
//! | `sim`       | RegisterBus         | Simulated AS3935 registers   |
//! |             | InterruptLine       | Simulated IRQ edges          |
//! | `log_sink`  | NotificationChannel | Log output                   |
//! | `time`      | DelayNs             | `std::thread::sleep`         |

pub mod log_sink;
pub mod sim;
pub mod spi;
pub mod time;
