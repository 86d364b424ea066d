use core::fmt::Debug;
use embedded_storage::nor_flash::{NorFlashError, NorFlashErrorKind};

/// Error type for the flash driver.
///
/// This error type is used for both the blocking and async drivers.
/// It is generic over the SPI device error type (S) and the GPIO error
/// type (P) of the hold and write-protect pins.
#[derive(Debug, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<S: Debug, P: Debug> {
    /// Error from the SPI device
    #[error("SPI device error")]
    Spi(S),
    /// Error from the hold or write-protect pin
    #[error("pin error")]
    Pin(P),
    /// Address or length outside the array, the page or the security ID
    #[error("address or length out of bounds")]
    OutOfBounds,
    /// Address not aligned to the erase granularity
    #[error("address not aligned")]
    NotAligned,
    /// Device stayed busy past the deadline of the operation.
    /// The deadlines leave a wide margin over the datasheet maxima, so this
    /// points at a wedged bus or a failing part.
    #[error("device did not become ready in time")]
    Timeout,
}

// Convert to the generic NOR flash error kinds so filesystems layered on
// [`embedded_storage::nor_flash::NorFlash`] can react to bounds/alignment.
impl<S: Debug, P: Debug> NorFlashError for Error<S, P> {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            Error::NotAligned => NorFlashErrorKind::NotAligned,
            Error::OutOfBounds => NorFlashErrorKind::OutOfBounds,
            Error::Spi(_) => NorFlashErrorKind::Other,
            Error::Pin(_) => NorFlashErrorKind::Other,
            Error::Timeout => NorFlashErrorKind::Other,
        }
    }
}
