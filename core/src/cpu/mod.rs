//! CPU cores. Only the Z80 is implemented; each core is a self-contained
//! [`crate::clock::Clockable`] that owns a handle to the [`crate::bus::AddressSpace`]
//! it was built with.
pub mod z80;
