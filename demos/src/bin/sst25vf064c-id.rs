// Dump the ID registers and the security ID, then exit.
#![no_main]
#![no_std]

use cortex_m_semihosting::debug;
use defmt::info;
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_time::Delay;
use sst25vf064c::asynchronous::Sst25vf064c;
use sst25vf064c::{IdOrder, SECURITY_ID_SIZE};

use {defmt_rtt as _, panic_probe as _}; // global logger

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_stm32::init(embassy_stm32::Config::default());

    let spi = embassy_stm32::spi::Spi::new(
        p.SPI2,
        p.PB13,
        p.PB15,
        p.PB14,
        p.GPDMA1_CH5,
        p.GPDMA1_CH4,
        embassy_stm32::spi::Config::default(),
    );
    let cs = Output::new(p.PB12, Level::High, Speed::High);
    let spi_dev =
        embedded_hal_bus::spi::ExclusiveDevice::new(spi, cs, embedded_hal_bus::spi::NoDelay)
            .unwrap();

    let hold = Output::new(p.PB1, Level::High, Speed::High);
    let wp = Output::new(p.PB2, Level::High, Speed::High);

    let mut flash = Sst25vf064c::new(spi_dev, hold, wp, Delay).unwrap();

    info!("JEDEC ID: {}", flash.jedec_id_cmd().await.unwrap());
    let [manufacturer, device] = flash.read_id_cmd(IdOrder::ManufacturerFirst).await.unwrap();
    info!("Manufacturer {=u8:#04x}, device {=u8:#04x}", manufacturer, device);

    let status = flash.read_status_cmd().await.unwrap();
    info!(
        "Status {=u8:#010b}: protection {=u8}, security ID locked {}",
        status.bits(),
        status.block_protection(),
        status.security_id_locked()
    );

    let mut security_id = [0u8; SECURITY_ID_SIZE];
    flash.read_security_id_cmd(0, &mut security_id).await.unwrap();
    info!("Security ID: {:#04x}", security_id);

    debug::exit(debug::EXIT_SUCCESS);
}
