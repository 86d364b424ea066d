//! Platform agnostic driver for the Microchip/SST SST25VF064C 64 Mbit SPI
//! NOR flash, built on [embedded-hal](https://crates.io/crates/embedded-hal).
//!
//! The driver owns the SPI device (chip select included), the HOLD# and WP#
//! pins and a delay used to pace status polling. Erase and program come in
//! two layers: raw `*_cmd` encoders that transmit exactly one command frame,
//! and composite operations that wrap them in the write-enable / busy-wait
//! sequence the chip requires.
//!
//! [`blocking::Sst25vf064c`] implements the
//! [`embedded_storage::nor_flash::NorFlash`] traits;
//! [`asynchronous::Sst25vf064c`] is the same driver over
//! [`embedded_hal_async`].
#![no_std]
// Must be first to share macros across crate
pub(crate) mod fmt;

#[cfg(any(test, feature = "alloc"))]
extern crate alloc;

pub mod asynchronous;
pub mod blocking;
pub mod command;
pub mod error;
#[cfg(any(test, feature = "alloc"))]
pub mod test;

pub use blocking::Sst25vf064c;
pub use error::Error;

use core::fmt::Debug;

// Device layout
/// Size of a program page in bytes
pub const PAGE_SIZE: u32 = 256;
/// Size of an erase sector in bytes
pub const SECTOR_SIZE: u32 = 4096;
/// Size of a small erase block in bytes
pub const BLOCK_32K_SIZE: u32 = 32 * 1024;
/// Size of a large erase block in bytes
pub const BLOCK_64K_SIZE: u32 = 64 * 1024;
/// Total capacity of the array in bytes (8 MiB)
pub const CAPACITY: u32 = 0x0080_0000;
/// Size of the security ID space in bytes
pub const SECURITY_ID_SIZE: usize = 32;
/// First byte of the user-programmable part of the security ID; everything
/// below is the factory-programmed unique ID
pub const SECURITY_ID_USER_OFFSET: u8 = 8;
/// Size of the user-programmable part of the security ID in bytes
pub const SECURITY_ID_USER_SIZE: usize = 24;

/// JEDEC manufacturer ID (SST/Microchip)
pub const MANUFACTURER_ID: u8 = 0xBF;
/// Device ID reported by the legacy 0x90 read
pub const DEVICE_ID: u8 = 0x4B;
/// The identification triple this chip reports to [`command::RDID`]
pub const JEDEC_ID: JedecId = JedecId {
    manufacturer: 0xBF,
    memory_type: 0x25,
    capacity: 0x4B,
};

// Busy-poll pacing per operation class. The deadlines leave a wide margin
// on top of the datasheet maxima.
/// Status poll interval while a page program runs
pub const PAGE_PROGRAM_POLL_US: u32 = 10;
/// Page program deadline (datasheet maximum 1.5 ms)
pub const PAGE_PROGRAM_TIMEOUT_US: u32 = 10_000;
/// Status poll interval while a sector erase runs
pub const SECTOR_ERASE_POLL_US: u32 = 100;
/// Sector erase deadline (datasheet maximum 25 ms)
pub const SECTOR_ERASE_TIMEOUT_US: u32 = 1_000_000;
/// Status poll interval while a 32 KiB or 64 KiB block erase runs
pub const BLOCK_ERASE_POLL_US: u32 = 1_000;
/// Block erase deadline (datasheet maximum 25 ms)
pub const BLOCK_ERASE_TIMEOUT_US: u32 = 4_000_000;
/// Status poll interval while a chip erase runs
pub const CHIP_ERASE_POLL_US: u32 = 1_000;
/// Chip erase deadline (datasheet maximum 50 ms)
pub const CHIP_ERASE_TIMEOUT_US: u32 = 10_000_000;
/// Status poll interval while a status register write runs
pub const STATUS_WRITE_POLL_US: u32 = 10;
/// Status register write deadline
pub const STATUS_WRITE_TIMEOUT_US: u32 = 100_000;
/// Status poll interval while a security ID program or lock runs
pub const SECURITY_ID_POLL_US: u32 = 10;
/// Security ID program and lock deadline
pub const SECURITY_ID_TIMEOUT_US: u32 = 100_000;

pub(crate) fn check_address<S: Debug, P: Debug>(address: u32) -> Result<(), Error<S, P>> {
    if address >= CAPACITY {
        return Err(Error::OutOfBounds);
    }
    Ok(())
}

pub(crate) fn check_aligned<S: Debug, P: Debug>(
    address: u32,
    alignment: u32,
) -> Result<(), Error<S, P>> {
    if address % alignment != 0 {
        return Err(Error::NotAligned);
    }
    Ok(())
}

pub(crate) fn check_range<S: Debug, P: Debug>(address: u32, len: usize) -> Result<(), Error<S, P>> {
    if u64::from(address) + len as u64 > u64::from(CAPACITY) {
        return Err(Error::OutOfBounds);
    }
    Ok(())
}

pub(crate) fn check_page_program<S: Debug, P: Debug>(
    address: u32,
    data: &[u8],
) -> Result<(), Error<S, P>> {
    if data.is_empty() || data.len() > PAGE_SIZE as usize {
        return Err(Error::OutOfBounds);
    }
    if u64::from(address) + data.len() as u64 > u64::from(CAPACITY) {
        return Err(Error::OutOfBounds);
    }
    if (address % PAGE_SIZE) as usize + data.len() > PAGE_SIZE as usize {
        return Err(Error::OutOfBounds);
    }
    Ok(())
}

/// Contents of the status register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Status(u8);

impl Status {
    /// Internal write in progress
    pub const BUSY: u8 = 1 << 0;
    /// Write enable latch set
    pub const WEL: u8 = 1 << 1;
    /// Block protection field BP0..BP3
    pub const BP_MASK: u8 = 0b0011_1100;
    /// Security ID locked
    pub const SEC: u8 = 1 << 6;
    /// Block protection bits locked down while WP# is low
    pub const BPL: u8 = 1 << 7;
    /// Bits a status write can change (BP0..BP3 and BPL)
    pub const WRITABLE: u8 = Self::BP_MASK | Self::BPL;

    /// Raw register contents
    pub fn bits(self) -> u8 {
        self.0
    }

    /// An erase, program or status write is in progress
    pub fn busy(self) -> bool {
        self.0 & Self::BUSY != 0
    }

    /// The write enable latch is set
    pub fn write_enabled(self) -> bool {
        self.0 & Self::WEL != 0
    }

    /// The BP0..BP3 block protection field
    pub fn block_protection(self) -> u8 {
        (self.0 & Self::BP_MASK) >> 2
    }

    /// The security ID is locked against further programming
    pub fn security_id_locked(self) -> bool {
        self.0 & Self::SEC != 0
    }

    /// The block protection bits are locked down
    pub fn protection_locked(self) -> bool {
        self.0 & Self::BPL != 0
    }
}

impl From<u8> for Status {
    fn from(bits: u8) -> Self {
        Status(bits)
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status.0
    }
}

/// Identification triple read by the JEDEC ID command.
/// See <https://www.jedec.org/standards-documents/docs/jep-106ab> for the
/// manufacturer bank list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JedecId {
    /// JEDEC manufacturer ID, 0xBF for SST
    pub manufacturer: u8,
    /// Memory type, 0x25 for SPI serial flash
    pub memory_type: u8,
    /// Capacity code, 0x4B for 64 Mbit
    pub capacity: u8,
}

#[cfg(feature = "defmt")]
impl defmt::Format for JedecId {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "JedecId({:02X} {:02X} {:02X})",
            self.manufacturer,
            self.memory_type,
            self.capacity
        );
    }
}

/// Byte order selector for the legacy 0x90 ID read.
///
/// The last address byte of the frame decides which of the two ID bytes the
/// chip clocks out first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum IdOrder {
    /// Manufacturer ID first, device ID second
    ManufacturerFirst = 0x00,
    /// Device ID first, manufacturer ID second
    DeviceFirst = 0x01,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn status_bits() {
        let status = Status::from(0b1000_0111);
        assert!(status.busy());
        assert!(status.write_enabled());
        assert_eq!(status.block_protection(), 0b0001);
        assert!(!status.security_id_locked());
        assert!(status.protection_locked());

        let idle = Status::from(0x00);
        assert!(!idle.busy());
        assert!(!idle.write_enabled());
    }

    #[test]
    fn status_writable_mask_excludes_busy_and_wel() {
        assert_eq!(Status::WRITABLE & Status::BUSY, 0);
        assert_eq!(Status::WRITABLE & Status::WEL, 0);
        assert_eq!(Status::WRITABLE, 0b1011_1100);
    }

    #[test]
    fn jedec_id_of_this_part() {
        assert_eq!(JEDEC_ID.manufacturer, MANUFACTURER_ID);
        assert_eq!(JEDEC_ID.memory_type, 0x25);
        assert_eq!(JEDEC_ID.capacity, 0x4B);
    }
}
