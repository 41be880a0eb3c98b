//! Cycle-driven video controllers.
//!
//! Both chips here are [`crate::clock::Clockable`] and [`crate::device::Device`]:
//! the clock ticks them once per pixel-clock cycle and the CPU's
//! [`crate::bus::AddressSpace`] maps their MMIO registers like any other
//! device. Neither chip owns its own `AddressSpace` handle — video memory is
//! reached through whatever device map the owning machine wires up, since
//! the two chips disagree on how much of the address space they see (the
//! VIC-II shares the whole 16-bit CPU bus; the 2C02 has its own 14-bit PPU
//! bus reached only through PPUADDR/PPUDATA).

pub mod ppu2c02;
pub mod vic2;
