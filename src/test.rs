//! Simulated chip and pin/delay doubles for driver tests.
//!
//! [`VirtualFlash`] models the SST25VF064C at the wire level behind the
//! blocking and async `SpiDevice` traits: programming ANDs bits in, erase
//! restores 0xFF, destructive commands are gated on the write enable latch and arm a
//! configurable number of busy status reads. Every transmitted frame is
//! logged so tests can assert exact encodings and command ordering.

use alloc::vec;
use alloc::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin, PinState};
use embedded_hal::spi::{self, ErrorKind, Operation, SpiDevice};

use crate::command;
use crate::{
    Status, BLOCK_32K_SIZE, BLOCK_64K_SIZE, CAPACITY, DEVICE_ID, JEDEC_ID, MANUFACTURER_ID,
    PAGE_SIZE, SECTOR_SIZE, SECURITY_ID_SIZE,
};

/// Wire-level simulated SST25VF064C.
pub struct VirtualFlash {
    /// Main array, 0xFF when erased
    pub memory: Vec<u8>,
    /// Sticky status bits (BP0..BP3, BPL, SEC); BUSY and WEL are synthesized
    pub status: u8,
    /// Write enable latch
    pub write_enabled: bool,
    /// Status register unlocked by EWSR, consumed by the next status write
    pub status_unlocked: bool,
    /// Security ID store: 8 factory bytes then 24 user bytes
    pub security_id: [u8; SECURITY_ID_SIZE],
    /// Number of busy status reads reported after each destructive command
    pub busy_polls: u32,
    busy_remaining: u32,
    /// Report busy forever
    pub stuck_busy: bool,
    /// The chip honors HOLD# only after the enable-hold command
    pub hold_enabled: bool,
    /// Fail the next transaction with this error
    pub fault: Option<ErrorKind>,
    /// Transmitted bytes of every transaction, in order
    pub transactions: Vec<Vec<u8>>,
}

impl VirtualFlash {
    pub fn new() -> Self {
        let mut security_id = [0xFF; SECURITY_ID_SIZE];
        security_id[..8].copy_from_slice(&[0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0]);
        Self {
            memory: vec![0xFF; CAPACITY as usize],
            status: 0,
            write_enabled: false,
            status_unlocked: false,
            security_id,
            busy_polls: 0,
            busy_remaining: 0,
            stuck_busy: false,
            hold_enabled: false,
            fault: None,
            transactions: Vec::new(),
        }
    }

    fn busy(&self) -> bool {
        self.stuck_busy || self.busy_remaining > 0
    }

    /// An accepted destructive command clears the latch and goes busy.
    fn start_operation(&mut self) {
        self.write_enabled = false;
        self.busy_remaining = self.busy_polls;
    }

    fn erase(&mut self, tx: &[u8], granularity: u32) {
        if self.write_enabled && tx.len() >= 4 {
            let start = (address_of(tx) / granularity * granularity) as usize % self.memory.len();
            let end = (start + granularity as usize).min(self.memory.len());
            self.memory[start..end].fill(0xFF);
            self.start_operation();
        }
    }

    fn respond(&mut self, tx: &[u8], read_len: usize) -> Vec<u8> {
        let mut response = vec![0xFF; read_len];
        let Some(&opcode) = tx.first() else {
            return response;
        };
        // while busy the chip accepts nothing but status reads
        if self.busy() && opcode != command::RDSR {
            return response;
        }
        match opcode {
            command::RDSR => {
                let mut bits = self.status;
                if self.write_enabled {
                    bits |= Status::WEL;
                }
                if self.busy() {
                    bits |= Status::BUSY;
                }
                if self.busy_remaining > 0 {
                    self.busy_remaining -= 1;
                }
                if let Some(slot) = response.first_mut() {
                    *slot = bits;
                }
            }
            command::WREN => self.write_enabled = true,
            command::WRDI => self.write_enabled = false,
            command::EWSR => self.status_unlocked = true,
            command::WRSR => {
                if (self.status_unlocked || self.write_enabled) && tx.len() >= 2 {
                    self.status = (self.status & !Status::WRITABLE) | (tx[1] & Status::WRITABLE);
                    self.status_unlocked = false;
                    self.start_operation();
                }
            }
            command::RDID => {
                let id = [JEDEC_ID.manufacturer, JEDEC_ID.memory_type, JEDEC_ID.capacity];
                for (slot, byte) in response.iter_mut().zip(id) {
                    *slot = byte;
                }
            }
            command::REMS => {
                if tx.len() >= 4 {
                    let pair = if tx[3] == 0x01 {
                        [DEVICE_ID, MANUFACTURER_ID]
                    } else {
                        [MANUFACTURER_ID, DEVICE_ID]
                    };
                    for (slot, byte) in response.iter_mut().zip(pair) {
                        *slot = byte;
                    }
                }
            }
            command::READ | command::FAST_READ => {
                // the dummy byte of the high-speed read is part of the
                // transmitted frame, so both reads look the same from here
                if tx.len() >= 4 {
                    let start = address_of(tx) as usize;
                    for (i, slot) in response.iter_mut().enumerate() {
                        *slot = self.memory[(start + i) % self.memory.len()];
                    }
                }
            }
            command::SECTOR_ERASE => self.erase(tx, SECTOR_SIZE),
            command::BLOCK_ERASE_32K => self.erase(tx, BLOCK_32K_SIZE),
            command::BLOCK_ERASE_64K => self.erase(tx, BLOCK_64K_SIZE),
            command::CHIP_ERASE => {
                if self.write_enabled {
                    self.memory.fill(0xFF);
                    self.start_operation();
                }
            }
            command::PAGE_PROGRAM => {
                if self.write_enabled && tx.len() > 4 {
                    let address = address_of(tx) % self.memory.len() as u32;
                    let page = address / PAGE_SIZE * PAGE_SIZE;
                    for (i, &byte) in tx[4..].iter().enumerate() {
                        // the chip wraps within the 256 byte page
                        let idx = page + (address % PAGE_SIZE + i as u32) % PAGE_SIZE;
                        self.memory[idx as usize] &= byte;
                    }
                    self.start_operation();
                }
            }
            command::RDSID => {
                if tx.len() >= 3 {
                    let offset = tx[1] as usize;
                    for (i, slot) in response.iter_mut().enumerate() {
                        *slot = self.security_id[(offset + i) % SECURITY_ID_SIZE];
                    }
                }
            }
            command::PRSID => {
                if self.write_enabled && self.status & Status::SEC == 0 && tx.len() >= 2 {
                    let offset = tx[1] as usize;
                    for (i, &byte) in tx[2..].iter().enumerate() {
                        let idx = offset + i;
                        // the factory half is not programmable
                        if (8..SECURITY_ID_SIZE).contains(&idx) {
                            self.security_id[idx] &= byte;
                        }
                    }
                    self.start_operation();
                }
            }
            command::LSID => {
                if self.write_enabled {
                    self.status |= Status::SEC;
                    self.start_operation();
                }
            }
            command::EHLD => self.hold_enabled = true,
            _ => {}
        }
        response
    }
}

impl Default for VirtualFlash {
    fn default() -> Self {
        Self::new()
    }
}

fn address_of(tx: &[u8]) -> u32 {
    u32::from_be_bytes([0, tx[1], tx[2], tx[3]])
}

impl spi::ErrorType for VirtualFlash {
    type Error = ErrorKind;
}

impl SpiDevice for VirtualFlash {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
        if let Some(kind) = self.fault.take() {
            return Err(kind);
        }
        let mut tx = Vec::new();
        let mut read_len = 0;
        for op in operations.iter() {
            match op {
                Operation::Write(bytes) => tx.extend_from_slice(bytes),
                Operation::Read(buf) => read_len += buf.len(),
                _ => {}
            }
        }
        let response = self.respond(&tx, read_len);
        self.transactions.push(tx);
        let mut produced = response.into_iter();
        for op in operations.iter_mut() {
            if let Operation::Read(buf) = op {
                for slot in buf.iter_mut() {
                    if let Some(byte) = produced.next() {
                        *slot = byte;
                    }
                }
            }
        }
        Ok(())
    }
}

// The simulated chip answers within the call, so the async transport is the
// blocking one behind an immediately ready future.
impl embedded_hal_async::spi::SpiDevice for VirtualFlash {
    async fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
        spi::SpiDevice::transaction(self, operations)
    }
}

/// Output pin double that records the last driven state.
#[derive(Debug)]
pub struct VirtualPin {
    pub state: PinState,
}

impl VirtualPin {
    pub fn new() -> Self {
        Self {
            state: PinState::Low,
        }
    }
}

impl Default for VirtualPin {
    fn default() -> Self {
        Self::new()
    }
}

impl digital::ErrorType for VirtualPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for VirtualPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.state = PinState::Low;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.state = PinState::High;
        Ok(())
    }
}

/// Delay double that only counts what it is asked to wait.
#[derive(Debug, Default)]
pub struct NoopDelay {
    /// Number of delay calls
    pub calls: u32,
    /// Total requested delay in microseconds
    pub total_us: u64,
}

impl NoopDelay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.total_us += u64::from(ns) / 1000;
    }

    fn delay_us(&mut self, us: u32) {
        self.calls += 1;
        self.total_us += u64::from(us);
    }
}

impl embedded_hal_async::delay::DelayNs for NoopDelay {
    async fn delay_ns(&mut self, ns: u32) {
        DelayNs::delay_ns(self, ns);
    }

    async fn delay_us(&mut self, us: u32) {
        DelayNs::delay_us(self, us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn send(flash: &mut VirtualFlash, frame: &[u8]) {
        flash.transaction(&mut [Operation::Write(frame)]).unwrap();
    }

    fn read_status(flash: &mut VirtualFlash) -> u8 {
        let mut status = [0; 1];
        flash
            .transaction(&mut [
                Operation::Write(&[command::RDSR]),
                Operation::Read(&mut status),
            ])
            .unwrap();
        status[0]
    }

    #[test]
    fn page_program_wraps_within_the_page() {
        let mut flash = VirtualFlash::new();
        send(&mut flash, &[command::WREN]);
        send(
            &mut flash,
            &[command::PAGE_PROGRAM, 0x00, 0x00, 0xFE, 0xA0, 0xA1, 0xA2, 0xA3],
        );
        assert_eq!(flash.memory[0xFE], 0xA0);
        assert_eq!(flash.memory[0xFF], 0xA1);
        // wraps to the start of the same page, not into the next one
        assert_eq!(flash.memory[0x00], 0xA2);
        assert_eq!(flash.memory[0x01], 0xA3);
        assert_eq!(flash.memory[0x100], 0xFF);
    }

    #[test]
    fn destructive_commands_without_write_enable_are_ignored() {
        let mut flash = VirtualFlash::new();
        send(&mut flash, &[command::PAGE_PROGRAM, 0, 0, 0, 0x00]);
        assert_eq!(flash.memory[0], 0xFF);

        // the latch is one-shot: it clears after an accepted command
        send(&mut flash, &[command::WREN]);
        send(&mut flash, &[command::PAGE_PROGRAM, 0, 0, 0, 0x00]);
        assert_eq!(flash.memory[0], 0x00);
        send(&mut flash, &[command::PAGE_PROGRAM, 0, 0, 1, 0x00]);
        assert_eq!(flash.memory[1], 0xFF);
    }

    #[test]
    fn sector_erase_clears_only_its_sector() {
        let mut flash = VirtualFlash::new();
        send(&mut flash, &[command::WREN]);
        send(&mut flash, &[command::PAGE_PROGRAM, 0x00, 0x0F, 0xFF, 0x00]);
        send(&mut flash, &[command::WREN]);
        send(&mut flash, &[command::PAGE_PROGRAM, 0x00, 0x10, 0x00, 0x00]);

        send(&mut flash, &[command::WREN]);
        send(&mut flash, &[command::SECTOR_ERASE, 0x00, 0x0F, 0x80]);
        assert_eq!(flash.memory[0x0FFF], 0xFF);
        assert_eq!(flash.memory[0x1000], 0x00);
    }

    #[test]
    fn busy_gates_commands_until_polled_ready() {
        let mut flash = VirtualFlash::new();
        flash.busy_polls = 2;
        send(&mut flash, &[command::WREN]);
        send(&mut flash, &[command::PAGE_PROGRAM, 0, 0, 0, 0xAA]);

        // busy: the next write enable and program are ignored outright
        send(&mut flash, &[command::WREN]);
        send(&mut flash, &[command::PAGE_PROGRAM, 0, 0, 1, 0xBB]);
        assert_eq!(flash.memory[1], 0xFF);

        assert_eq!(read_status(&mut flash) & Status::BUSY, Status::BUSY);
        assert_eq!(read_status(&mut flash) & Status::BUSY, Status::BUSY);
        assert_eq!(read_status(&mut flash) & Status::BUSY, 0);

        send(&mut flash, &[command::WREN]);
        send(&mut flash, &[command::PAGE_PROGRAM, 0, 0, 1, 0xBB]);
        assert_eq!(flash.memory[1], 0xBB);
    }

    #[test]
    fn status_write_needs_unlock_and_masks_bits() {
        let mut flash = VirtualFlash::new();
        send(&mut flash, &[command::WRSR, 0xFF]);
        assert_eq!(read_status(&mut flash), 0x00);

        send(&mut flash, &[command::EWSR]);
        send(&mut flash, &[command::WRSR, 0xFF]);
        assert_eq!(read_status(&mut flash), Status::WRITABLE);

        // the unlock is consumed by the write
        send(&mut flash, &[command::WRSR, 0x00]);
        assert_eq!(read_status(&mut flash), Status::WRITABLE);
    }
}
