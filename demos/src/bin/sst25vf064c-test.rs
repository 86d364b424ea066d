// Exercise the SST25VF064C: unlock the status register, erase the chip,
// program a message and read it back.
#![no_main]
#![no_std]

use defmt::{info, warn};
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_time::{Delay, Timer};
use embedded_hal::digital::PinState;
use sst25vf064c::asynchronous::Sst25vf064c;
use sst25vf064c::{Status, JEDEC_ID};

use {defmt_rtt as _, panic_probe as _}; // global logger

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let config = embassy_stm32::Config::default();

    let p = embassy_stm32::init(config);

    info!("Initialised peripherals");

    // Alive LED on while the application runs; the second LED flags a
    // verify mismatch.
    let _led_alive = Output::new(p.PA5, Level::High, Speed::Low);
    let mut led_error = Output::new(p.PA6, Level::Low, Speed::Low);

    // Create an SPI instance that implements [embedded_hal::spi::SpiBus]
    let spi = embassy_stm32::spi::Spi::new(
        p.SPI2,
        p.PB13,
        p.PB15,
        p.PB14,
        p.GPDMA1_CH5,
        p.GPDMA1_CH4,
        embassy_stm32::spi::Config::default(),
    );

    // Get chip select pin
    let cs = Output::new(p.PB12, Level::High, Speed::High);

    // Create exclusive access to the SPI bus as [embedded_hal::spi::SpiDevice]
    let spi_dev =
        embedded_hal_bus::spi::ExclusiveDevice::new(spi, cs, embedded_hal_bus::spi::NoDelay)
            .unwrap();

    let hold = Output::new(p.PB1, Level::High, Speed::High);
    let wp = Output::new(p.PB2, Level::High, Speed::High);

    let mut flash = Sst25vf064c::new(spi_dev, hold, wp, Delay).unwrap();

    info!("Checking JEDEC ID");
    let id = flash.jedec_id_cmd().await.unwrap();
    info!("JEDEC ID: {}", id);
    assert_eq!(id, JEDEC_ID);

    loop {
        // Allow status writes, then lift the block protection
        flash.set_wp(PinState::High).unwrap();
        flash.write_status(Status::BPL).await.unwrap();

        info!("Erasing chip");
        flash.erase_chip().await.unwrap();

        let message = b"Hello world!\0";
        info!("Programming {} bytes at 0x100000", message.len());
        flash.program_page(0x100000, message).await.unwrap();

        let mut readback = [0u8; 13];
        flash.read_cmd(0x100000, &mut readback).await.unwrap();
        if &readback == message {
            info!("Verify OK");
        } else {
            warn!("Verify failed: {}", readback);
            led_error.set_high();
        }

        Timer::after_secs(1).await;
    }
}
