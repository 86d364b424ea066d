//! Blocking driver.
//!
//! Two layers. The raw `*_cmd` methods transmit exactly one command frame
//! each and perform no sequencing; they reject out-of-range addresses before
//! anything reaches the bus. The composite operations (`erase_sector`,
//! `program_page`, `write_status`, ...) wrap the raw layer in the
//! write-enable / busy-wait sequence the chip requires and are what most
//! callers want.

use core::fmt::Debug;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{OutputPin, PinState};
use embedded_hal::spi::{Operation, SpiDevice};
use embedded_storage::nor_flash::{ErrorType, NorFlash, ReadNorFlash};

use crate::command;
use crate::error::Error;
use crate::{
    check_address, check_aligned, check_page_program, check_range, IdOrder, JedecId, Status,
    BLOCK_32K_SIZE, BLOCK_64K_SIZE, BLOCK_ERASE_POLL_US, BLOCK_ERASE_TIMEOUT_US, CAPACITY,
    CHIP_ERASE_POLL_US, CHIP_ERASE_TIMEOUT_US, PAGE_PROGRAM_POLL_US, PAGE_PROGRAM_TIMEOUT_US,
    PAGE_SIZE, SECTOR_ERASE_POLL_US, SECTOR_ERASE_TIMEOUT_US, SECTOR_SIZE, SECURITY_ID_POLL_US,
    SECURITY_ID_SIZE, SECURITY_ID_TIMEOUT_US, SECURITY_ID_USER_OFFSET, SECURITY_ID_USER_SIZE,
    STATUS_WRITE_POLL_US, STATUS_WRITE_TIMEOUT_US,
};

/// SST25VF064C driver over a blocking SPI device.
///
/// Owns the SPI device (chip select included), the HOLD# and WP# pins and a
/// delay that paces status polling.
pub struct Sst25vf064c<SPI, HOLD, WP, D> {
    /// SPI device the chip is on
    pub spi: SPI,
    hold: HOLD,
    wp: WP,
    delay: D,
}

impl<SPI, HOLD, WP, D> Debug for Sst25vf064c<SPI, HOLD, WP, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Sst25vf064c").finish_non_exhaustive()
    }
}

impl<SPI, S, P, HOLD, WP, D> Sst25vf064c<SPI, HOLD, WP, D>
where
    SPI: SpiDevice<Error = S>,
    HOLD: OutputPin<Error = P>,
    WP: OutputPin<Error = P>,
    D: DelayNs,
    S: Debug,
    P: Debug,
{
    /// Creates the driver and deasserts HOLD# and WP# (both high).
    pub fn new(spi: SPI, mut hold: HOLD, mut wp: WP, delay: D) -> Result<Self, Error<S, P>> {
        hold.set_high().map_err(Error::Pin)?;
        wp.set_high().map_err(Error::Pin)?;
        Ok(Self {
            spi,
            hold,
            wp,
            delay,
        })
    }

    /// Releases the owned resources.
    pub fn release(self) -> (SPI, HOLD, WP, D) {
        (self.spi, self.hold, self.wp, self.delay)
    }

    /// Drives the HOLD# pin. Low pauses the chip mid-transfer once hold has
    /// been enabled with [`Self::enable_hold_cmd`].
    pub fn set_hold(&mut self, state: PinState) -> Result<(), Error<S, P>> {
        self.hold.set_state(state).map_err(Error::Pin)
    }

    /// Drives the WP# pin. Low write-protects the status register while BPL
    /// is set.
    pub fn set_wp(&mut self, state: PinState) -> Result<(), Error<S, P>> {
        self.wp.set_state(state).map_err(Error::Pin)
    }

    // ==== Raw command layer ====

    /// Sets the write enable latch (0x06). Required before any erase,
    /// program or security ID operation.
    pub fn write_enable_cmd(&mut self) -> Result<(), Error<S, P>> {
        self.spi.write(&[command::WREN]).map_err(Error::Spi)
    }

    /// Clears the write enable latch (0x04).
    pub fn write_disable_cmd(&mut self) -> Result<(), Error<S, P>> {
        self.spi.write(&[command::WRDI]).map_err(Error::Spi)
    }

    /// Reads the status register (0x05). Always accepted, including while an
    /// erase or program is in progress.
    pub fn read_status_cmd(&mut self) -> Result<Status, Error<S, P>> {
        let mut buf = [0; 1];
        self.spi
            .transaction(&mut [
                Operation::Write(&[command::RDSR]),
                Operation::Read(&mut buf),
            ])
            .map_err(Error::Spi)?;
        Ok(Status::from(buf[0]))
    }

    /// Unlocks the status register for the next write (0x50).
    pub fn enable_write_status_cmd(&mut self) -> Result<(), Error<S, P>> {
        self.spi.write(&[command::EWSR]).map_err(Error::Spi)
    }

    /// Writes the status register (0x01). Only the BP0..BP3 and BPL bits
    /// stick; must directly follow [`Self::enable_write_status_cmd`] or
    /// [`Self::write_enable_cmd`].
    pub fn write_status_cmd(&mut self, bits: u8) -> Result<(), Error<S, P>> {
        self.spi.write(&[command::WRSR, bits]).map_err(Error::Spi)
    }

    /// Reads the legacy manufacturer/device ID pair (0x90) in the requested
    /// byte order.
    pub fn read_id_cmd(&mut self, order: IdOrder) -> Result<[u8; 2], Error<S, P>> {
        let mut buf = [0; 2];
        self.spi
            .transaction(&mut [
                Operation::Write(&[command::REMS, 0x00, 0x00, order as u8]),
                Operation::Read(&mut buf),
            ])
            .map_err(Error::Spi)?;
        Ok(buf)
    }

    /// Reads the JEDEC identification triple (0x9F). This part reports
    /// [`crate::JEDEC_ID`].
    pub fn jedec_id_cmd(&mut self) -> Result<JedecId, Error<S, P>> {
        let mut buf = [0; 3];
        self.spi
            .transaction(&mut [
                Operation::Write(&[command::RDID]),
                Operation::Read(&mut buf),
            ])
            .map_err(Error::Spi)?;
        Ok(JedecId {
            manufacturer: buf[0],
            memory_type: buf[1],
            capacity: buf[2],
        })
    }

    /// Reads `buf.len()` bytes starting at `address` (0x03).
    pub fn read_cmd(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Error<S, P>> {
        check_range(address, buf.len())?;
        let frame = command::with_address(command::READ, address);
        self.spi
            .transaction(&mut [Operation::Write(&frame), Operation::Read(buf)])
            .map_err(Error::Spi)
    }

    /// Reads `buf.len()` bytes starting at `address` with the high-speed
    /// read command (0x0B, one dummy byte after the address).
    pub fn fast_read_cmd(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Error<S, P>> {
        check_range(address, buf.len())?;
        let a = command::with_address(command::FAST_READ, address);
        let frame = [a[0], a[1], a[2], a[3], command::DUMMY];
        self.spi
            .transaction(&mut [Operation::Write(&frame), Operation::Read(buf)])
            .map_err(Error::Spi)
    }

    /// Erases the 4 KiB sector containing `address` (0x20). No write enable,
    /// no busy wait; see [`Self::erase_sector`] for the full sequence.
    pub fn sector_erase_cmd(&mut self, address: u32) -> Result<(), Error<S, P>> {
        check_address(address)?;
        let frame = command::with_address(command::SECTOR_ERASE, address);
        self.spi.write(&frame).map_err(Error::Spi)
    }

    /// Erases the 32 KiB block containing `address` (0x52).
    pub fn block_erase_32k_cmd(&mut self, address: u32) -> Result<(), Error<S, P>> {
        check_address(address)?;
        let frame = command::with_address(command::BLOCK_ERASE_32K, address);
        self.spi.write(&frame).map_err(Error::Spi)
    }

    /// Erases the 64 KiB block containing `address` (0xD8).
    pub fn block_erase_64k_cmd(&mut self, address: u32) -> Result<(), Error<S, P>> {
        check_address(address)?;
        let frame = command::with_address(command::BLOCK_ERASE_64K, address);
        self.spi.write(&frame).map_err(Error::Spi)
    }

    /// Erases the whole array (0x60).
    pub fn chip_erase_cmd(&mut self) -> Result<(), Error<S, P>> {
        self.spi.write(&[command::CHIP_ERASE]).map_err(Error::Spi)
    }

    /// Programs 1..=256 bytes within a single 256 byte page (0x02). The
    /// chip wraps at the page boundary, so payloads that would cross one are
    /// rejected instead of wrapping silently.
    pub fn page_program_cmd(&mut self, address: u32, data: &[u8]) -> Result<(), Error<S, P>> {
        check_page_program(address, data)?;
        let frame = command::with_address(command::PAGE_PROGRAM, address);
        self.spi
            .transaction(&mut [Operation::Write(&frame), Operation::Write(data)])
            .map_err(Error::Spi)
    }

    /// Reads `buf.len()` bytes of the 32 byte security ID starting at
    /// `offset` (0x88). Bytes 0..8 are the factory unique ID, 8..32 the user
    /// area.
    pub fn read_security_id_cmd(&mut self, offset: u8, buf: &mut [u8]) -> Result<(), Error<S, P>> {
        if offset as usize + buf.len() > SECURITY_ID_SIZE {
            return Err(Error::OutOfBounds);
        }
        self.spi
            .transaction(&mut [
                Operation::Write(&[command::RDSID, offset, command::DUMMY]),
                Operation::Read(buf),
            ])
            .map_err(Error::Spi)
    }

    /// Programs the 24 user bytes of the security ID (0xA5). One-time: bits
    /// only go from 1 to 0, and not at all once locked.
    pub fn program_security_id_cmd(
        &mut self,
        data: &[u8; SECURITY_ID_USER_SIZE],
    ) -> Result<(), Error<S, P>> {
        self.spi
            .transaction(&mut [
                Operation::Write(&[command::PRSID, SECURITY_ID_USER_OFFSET]),
                Operation::Write(data),
            ])
            .map_err(Error::Spi)
    }

    /// Locks the security ID against further programming (0x85).
    /// Irreversible.
    pub fn lock_security_id_cmd(&mut self) -> Result<(), Error<S, P>> {
        self.spi.write(&[command::LSID]).map_err(Error::Spi)
    }

    /// Makes the chip honor the HOLD# pin (0xAA).
    pub fn enable_hold_cmd(&mut self) -> Result<(), Error<S, P>> {
        self.spi.write(&[command::EHLD]).map_err(Error::Spi)
    }

    // ==== Convenience reads ====

    /// Reads one byte at `address`.
    pub fn read_byte(&mut self, address: u32) -> Result<u8, Error<S, P>> {
        let mut buf = [0; 1];
        self.read_cmd(address, &mut buf)?;
        Ok(buf[0])
    }

    /// Reads one byte at `address` with the high-speed read command.
    pub fn fast_read_byte(&mut self, address: u32) -> Result<u8, Error<S, P>> {
        let mut buf = [0; 1];
        self.fast_read_cmd(address, &mut buf)?;
        Ok(buf[0])
    }

    // ==== Composite operations ====

    /// Polls the status register every `poll_us` microseconds until BUSY
    /// clears. Gives up with [`Error::Timeout`] after `timeout_us / poll_us`
    /// polls (at least one). A zero `poll_us` polls back to back, once per
    /// microsecond of the deadline.
    pub fn wait_ready(&mut self, poll_us: u32, timeout_us: u32) -> Result<(), Error<S, P>> {
        let max_polls = if poll_us > 0 {
            (timeout_us / poll_us).max(1)
        } else {
            timeout_us.max(1)
        };
        for _ in 0..max_polls {
            if !self.read_status_cmd()?.busy() {
                return Ok(());
            }
            if poll_us > 0 {
                self.delay.delay_us(poll_us);
            }
        }
        Err(Error::Timeout)
    }

    /// Erases the 4 KiB sector at `address` (sector aligned) and waits for
    /// completion.
    pub fn erase_sector(&mut self, address: u32) -> Result<(), Error<S, P>> {
        trace!("erase_sector: {:#x}", address);
        check_address(address)?;
        check_aligned(address, SECTOR_SIZE)?;
        self.write_enable_cmd()?;
        self.sector_erase_cmd(address)?;
        self.wait_ready(SECTOR_ERASE_POLL_US, SECTOR_ERASE_TIMEOUT_US)
    }

    /// Erases the 32 KiB block at `address` (block aligned) and waits for
    /// completion.
    pub fn erase_block_32k(&mut self, address: u32) -> Result<(), Error<S, P>> {
        trace!("erase_block_32k: {:#x}", address);
        check_address(address)?;
        check_aligned(address, BLOCK_32K_SIZE)?;
        self.write_enable_cmd()?;
        self.block_erase_32k_cmd(address)?;
        self.wait_ready(BLOCK_ERASE_POLL_US, BLOCK_ERASE_TIMEOUT_US)
    }

    /// Erases the 64 KiB block at `address` (block aligned) and waits for
    /// completion.
    pub fn erase_block_64k(&mut self, address: u32) -> Result<(), Error<S, P>> {
        trace!("erase_block_64k: {:#x}", address);
        check_address(address)?;
        check_aligned(address, BLOCK_64K_SIZE)?;
        self.write_enable_cmd()?;
        self.block_erase_64k_cmd(address)?;
        self.wait_ready(BLOCK_ERASE_POLL_US, BLOCK_ERASE_TIMEOUT_US)
    }

    /// Erases the whole array and waits for completion. Takes tens of
    /// seconds on a real part.
    pub fn erase_chip(&mut self) -> Result<(), Error<S, P>> {
        debug!("erase_chip");
        self.write_enable_cmd()?;
        self.chip_erase_cmd()?;
        self.wait_ready(CHIP_ERASE_POLL_US, CHIP_ERASE_TIMEOUT_US)
    }

    /// Programs 1..=256 bytes within a single page and waits for completion.
    pub fn program_page(&mut self, address: u32, data: &[u8]) -> Result<(), Error<S, P>> {
        trace!("program_page: {:#x} len {}", address, data.len());
        check_page_program(address, data)?;
        self.write_enable_cmd()?;
        self.page_program_cmd(address, data)?;
        self.wait_ready(PAGE_PROGRAM_POLL_US, PAGE_PROGRAM_TIMEOUT_US)
    }

    /// Writes the status register (BP0..BP3 and BPL) and waits for
    /// completion.
    pub fn write_status(&mut self, bits: u8) -> Result<(), Error<S, P>> {
        debug!("write_status: {:#04x}", bits);
        self.enable_write_status_cmd()?;
        self.write_status_cmd(bits)?;
        self.wait_ready(STATUS_WRITE_POLL_US, STATUS_WRITE_TIMEOUT_US)
    }

    /// Programs the 24 user bytes of the security ID and waits for
    /// completion. One-time programmable.
    pub fn program_security_id(
        &mut self,
        data: &[u8; SECURITY_ID_USER_SIZE],
    ) -> Result<(), Error<S, P>> {
        debug!("program_security_id");
        self.write_enable_cmd()?;
        self.program_security_id_cmd(data)?;
        self.wait_ready(SECURITY_ID_POLL_US, SECURITY_ID_TIMEOUT_US)
    }

    /// Locks the security ID against further programming and waits for
    /// completion. Irreversible.
    pub fn lock_security_id(&mut self) -> Result<(), Error<S, P>> {
        debug!("lock_security_id");
        self.write_enable_cmd()?;
        self.lock_security_id_cmd()?;
        self.wait_ready(SECURITY_ID_POLL_US, SECURITY_ID_TIMEOUT_US)
    }
}

impl<SPI, S, P, HOLD, WP, D> ErrorType for Sst25vf064c<SPI, HOLD, WP, D>
where
    SPI: SpiDevice<Error = S>,
    HOLD: OutputPin<Error = P>,
    WP: OutputPin<Error = P>,
    D: DelayNs,
    S: Debug,
    P: Debug,
{
    type Error = Error<S, P>;
}

impl<SPI, S, P, HOLD, WP, D> ReadNorFlash for Sst25vf064c<SPI, HOLD, WP, D>
where
    SPI: SpiDevice<Error = S>,
    HOLD: OutputPin<Error = P>,
    WP: OutputPin<Error = P>,
    D: DelayNs,
    S: Debug,
    P: Debug,
{
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        trace!("read: {:#x} len {}", offset, bytes.len());
        self.read_cmd(offset, bytes)
    }

    fn capacity(&self) -> usize {
        CAPACITY as usize
    }
}

impl<SPI, S, P, HOLD, WP, D> NorFlash for Sst25vf064c<SPI, HOLD, WP, D>
where
    SPI: SpiDevice<Error = S>,
    HOLD: OutputPin<Error = P>,
    WP: OutputPin<Error = P>,
    D: DelayNs,
    S: Debug,
    P: Debug,
{
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = SECTOR_SIZE as usize;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        trace!("erase: {:#x}..{:#x}", from, to);
        if from > to || to > CAPACITY {
            return Err(Error::OutOfBounds);
        }
        if from % SECTOR_SIZE != 0 || to % SECTOR_SIZE != 0 {
            return Err(Error::NotAligned);
        }
        for sector in (from..to).step_by(SECTOR_SIZE as usize) {
            self.erase_sector(sector)?;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        trace!("write: {:#x} len {}", offset, bytes.len());
        // Validate the whole range up front so a bad tail cannot follow
        // partial programming.
        check_range(offset, bytes.len())?;
        if bytes.is_empty() {
            return Ok(());
        }
        let head_len = (PAGE_SIZE - offset % PAGE_SIZE).min(bytes.len() as u32) as usize;
        let (head, rest) = bytes.split_at(head_len);
        self.program_page(offset, head)?;
        let mut address = offset + head_len as u32;
        for chunk in rest.chunks(PAGE_SIZE as usize) {
            self.program_page(address, chunk)?;
            address += chunk.len() as u32;
        }
        Ok(())
    }
}
