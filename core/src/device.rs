//! Uniform contract for anything mapped into an [`crate::bus::AddressSpace`].

use crate::types::{Address, Data};

/// Hints a [`Device::read`] whether the access may mutate internal state.
///
/// `Peek` is used by debuggers and by internal housekeeping (e.g. a second
/// device reading through a mirror) that must not disturb latches or
/// clear-on-read registers. Devices implementing "read clears a flag"
/// semantics must check for `Peek` and skip the clear.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadMode {
    Peek,
    Read,
}

/// A bus-mapped unit: memory, a register file, or a full peripheral.
///
/// `addr` is already translated relative to the device (bank offset
/// removed, `start_offset` added) by the owning [`crate::bus::AddressSpace`]
/// before either method is called.
pub trait Device {
    fn read(&mut self, addr: Address, mode: ReadMode) -> Data;
    fn write(&mut self, addr: Address, value: Data);

    /// Declared addressable size in bytes, used only for `dump` labeling.
    fn size(&self) -> usize;

    /// Short label used by `AddressSpace::dump`.
    fn label(&self) -> &str {
        "device"
    }
}
