pub mod bus;
pub mod clock;
pub mod cpu;
pub mod device;
pub mod error;
pub mod monitor;
pub mod types;
pub mod video;

pub mod prelude {
    pub use crate::bus::{AddressSpace, DeviceMapEntry, SharedDevice};
    pub use crate::clock::{Clock, Clockable, HALT, SharedClockable, TickResult};
    pub use crate::cpu::z80::Z80;
    pub use crate::device::{Device, ReadMode};
    pub use crate::error::{Error, Result};
    pub use crate::monitor::Monitor;
    pub use crate::types::{Address, Data, Rgba, RgbaTable};
    pub use crate::video::ppu2c02::Ppu2C02;
    pub use crate::video::vic2::Vic2;
}
