//! Banked address space: routes 16-bit bus transactions to [`Device`]s.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::device::{Device, ReadMode};
use crate::types::{Address, Data};

/// A shared handle to a device, owned by the arena that built the
/// `AddressSpace` and outliving it. Matches the "shared ownership with
/// reference counting" note in the design docs: no device is ever destroyed
/// while the clock driving it is still running.
pub type SharedDevice = Rc<RefCell<dyn Device>>;

/// One bank's routing entry: the device that answers for this bank, and the
/// offset added to the in-bank address before handing it to the device.
#[derive(Clone)]
pub struct DeviceMapEntry {
    pub device: SharedDevice,
    pub start_offset: Address,
}

impl DeviceMapEntry {
    pub fn new(device: SharedDevice, start_offset: Address) -> Self {
        Self {
            device,
            start_offset,
        }
    }
}

/// A 16-bit, bank-routed address space with separate read and write maps and
/// a latched "address bus" / "data bus" shadow of the most recent
/// non-peek transaction.
///
/// Invariant: `bank_size * bank_count == mask + 1`, `bank_size` a power of
/// two, and every address in `[0, mask]` routes to some device in both
/// maps. Both invariants are enforced in `new` — construction panics rather
/// than producing an `AddressSpace` with holes, since a hole is a
/// programmer error the spec treats as fatal, not a recoverable `Result`.
pub struct AddressSpace {
    read_map: Vec<DeviceMapEntry>,
    write_map: Vec<DeviceMapEntry>,
    bank_size: u32,
    bank_shift: u32,
    bank_mask: Address,
    amask: Address,
    last_addr: Cell<Address>,
    last_data: Cell<Data>,
}

impl AddressSpace {
    /// `bank_size` must be a power of two. `read_map`/`write_map` must each
    /// have the same length, which determines the address mask
    /// (`bank_size * banks - 1`).
    pub fn new(bank_size: u32, read_map: Vec<DeviceMapEntry>, write_map: Vec<DeviceMapEntry>) -> Self {
        assert!(bank_size.is_power_of_two(), "bank_size must be a power of two");
        assert_eq!(
            read_map.len(),
            write_map.len(),
            "read and write maps must have the same bank count"
        );
        assert!(!read_map.is_empty(), "address space must have at least one bank");
        let bank_count = read_map.len() as u64;
        let total = bank_size as u64 * bank_count;
        assert!(
            total.is_power_of_two(),
            "bank_size * bank_count must be a power of two (no holes)"
        );
        Self {
            read_map,
            write_map,
            bank_size,
            bank_shift: bank_size.trailing_zeros(),
            bank_mask: (bank_size - 1) as Address,
            amask: (total - 1) as Address,
            last_addr: Cell::new(0),
            last_data: Cell::new(0),
        }
    }

    pub fn mask(&self) -> Address {
        self.amask
    }

    /// The most recently latched address bus value (unaffected by `Peek` reads).
    pub fn address_bus(&self) -> Address {
        self.last_addr.get()
    }

    /// The most recently latched data bus value (unaffected by `Peek` reads).
    pub fn data_bus(&self) -> Data {
        self.last_data.get()
    }

    fn translate(addr: Address, amask: Address, bank_shift: u32, bank_mask: Address) -> (usize, Address) {
        let masked = addr & amask;
        let bank = (masked >> bank_shift) as usize;
        let offset = masked & bank_mask;
        (bank, offset)
    }

    pub fn read(&self, addr: Address, mode: ReadMode) -> Data {
        let (bank, offset) = Self::translate(addr, self.amask, self.bank_shift, self.bank_mask);
        let entry = self
            .read_map
            .get(bank)
            .unwrap_or_else(|| panic!("address space invariant violated: no read device for bank {bank}"));
        let device_addr = entry.start_offset.wrapping_add(offset);
        let data = entry.device.borrow_mut().read(device_addr, mode);
        if mode != ReadMode::Peek {
            self.last_addr.set(device_addr);
            self.last_data.set(data);
        }
        data
    }

    /// Synonym for `read(addr, Peek)`. Never disturbs the bus shadows.
    pub fn peek(&self, addr: Address) -> Data {
        self.read(addr, ReadMode::Peek)
    }

    pub fn write(&self, addr: Address, value: Data) {
        let (bank, offset) = Self::translate(addr, self.amask, self.bank_shift, self.bank_mask);
        let entry = self
            .write_map
            .get(bank)
            .unwrap_or_else(|| panic!("address space invariant violated: no write device for bank {bank}"));
        let device_addr = entry.start_offset.wrapping_add(offset);
        // Both shadows latch before delegating, matching the read-then-bus-settle
        // order real bus-sharing hardware observes.
        self.last_addr.set(device_addr);
        self.last_data.set(value);
        entry.device.borrow_mut().write(device_addr, value);
    }

    /// Emit a human-readable map of banks and device labels.
    pub fn dump(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "addr mask: {:#06x}  bank size: {:#x}", self.amask, self.bank_size)?;
        for (i, entry) in self.read_map.iter().enumerate() {
            let base = (i as u32) << self.bank_shift;
            writeln!(
                out,
                "bank {i:3}  [{base:#06x}-{:#06x}]  read={}  write={}",
                base + self.bank_size - 1,
                entry.device.borrow().label(),
                self.write_map[i].device.borrow().label(),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct IndexedRam {
        index: u8,
        data: [u8; 0x4000],
    }

    impl Device for IndexedRam {
        fn read(&mut self, addr: Address, _mode: ReadMode) -> Data {
            if addr == 0 { self.index } else { self.data[addr as usize] }
        }
        fn write(&mut self, addr: Address, value: Data) {
            self.data[addr as usize] = value;
        }
        fn size(&self) -> usize {
            self.data.len()
        }
        fn label(&self) -> &str {
            "ram"
        }
    }

    fn four_bank_space() -> AddressSpace {
        let mut read_map = Vec::new();
        let mut write_map = Vec::new();
        for i in 0..4u8 {
            let ram = Rc::new(RefCell::new(IndexedRam {
                index: i,
                data: [0; 0x4000],
            }));
            read_map.push(DeviceMapEntry::new(ram.clone(), 0));
            write_map.push(DeviceMapEntry::new(ram, 0));
        }
        AddressSpace::new(0x4000, read_map, write_map)
    }

    #[test]
    fn routes_address_to_correct_bank() {
        let space = four_bank_space();
        assert_eq!(space.read(0xC000, ReadMode::Read), 3);
        assert_eq!(space.read(0x3FFF, ReadMode::Read), 0);
    }

    #[test]
    fn peek_does_not_disturb_bus_shadows() {
        let space = four_bank_space();
        space.write(0x0010, 0xAB);
        let (addr_before, data_before) = (space.address_bus(), space.data_bus());
        space.peek(0x8000);
        assert_eq!(space.address_bus(), addr_before);
        assert_eq!(space.data_bus(), data_before);
    }

    #[test]
    fn read_latches_bus_shadows() {
        let space = four_bank_space();
        // Bank 1 starts at 0x4000 with start_offset 0, so the translated
        // device-space address for 0x4001 is just the in-bank offset, 0x0001.
        let value = space.read(0x4001, ReadMode::Read);
        assert_eq!(space.address_bus(), 0x0001);
        assert_eq!(space.data_bus(), value);
    }

    #[test]
    fn dump_lists_every_bank() {
        let space = four_bank_space();
        let mut out = String::new();
        space.dump(&mut out).unwrap();
        assert_eq!(out.lines().count(), 5); // header + 4 banks
    }
}
