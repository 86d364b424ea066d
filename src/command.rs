//! SST25VF064C command set
//!
//! Opcodes and frame layout per the SST25VF064C datasheet. Array commands
//! carry a 24-bit address, most significant byte first, directly after the
//! opcode.

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any erase/program operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;
/// Enable Write Status Register - legacy SST unlock, precedes [`WRSR`]
pub const EWSR: u8 = 0x50;

// ============================================================================
// Status register operations
// ============================================================================

/// Read Status Register
pub const RDSR: u8 = 0x05;
/// Write Status Register
pub const WRSR: u8 = 0x01;

// ============================================================================
// Identification
// ============================================================================

/// Read JEDEC ID (manufacturer, memory type, capacity)
pub const RDID: u8 = 0x9F;
/// Read Electronic Manufacturer & Device ID (legacy), order selected by the
/// last address byte
pub const REMS: u8 = 0x90;

// ============================================================================
// Read commands
// ============================================================================

/// Read Data (up to 33 MHz)
pub const READ: u8 = 0x03;
/// High-Speed Read (one dummy byte after the address, up to max frequency)
pub const FAST_READ: u8 = 0x0B;

// ============================================================================
// Erase and program
// ============================================================================

/// Erase a 4 KiB sector
pub const SECTOR_ERASE: u8 = 0x20;
/// Erase a 32 KiB block
pub const BLOCK_ERASE_32K: u8 = 0x52;
/// Erase a 64 KiB block
pub const BLOCK_ERASE_64K: u8 = 0xD8;
/// Erase the whole array
pub const CHIP_ERASE: u8 = 0x60;
/// Program 1 to 256 bytes within a single page
pub const PAGE_PROGRAM: u8 = 0x02;

// ============================================================================
// Security ID
// ============================================================================

/// Read Security ID (one dummy byte after the offset)
pub const RDSID: u8 = 0x88;
/// Program the user part of the Security ID
pub const PRSID: u8 = 0xA5;
/// Lock the Security ID against further programming
pub const LSID: u8 = 0x85;

// ============================================================================
// Pin control
// ============================================================================

/// Enable the HOLD# pin function
pub const EHLD: u8 = 0xAA;

/// Value clocked out during dummy cycles. The chip ignores it.
pub const DUMMY: u8 = 0xFF;

/// Builds the `opcode + 24-bit address` frame shared by the array commands.
pub(crate) fn with_address(opcode: u8, address: u32) -> [u8; 4] {
    let a = address.to_be_bytes();
    [opcode, a[1], a[2], a[3]]
}
