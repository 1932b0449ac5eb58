//! SPI register bus adapter.
//!
//! AS3935 SPI framing: the first byte carries the mode in bits 7:6
//! (`00` write, `01` read) and the register address in bits 5:0.  A read
//! clocks one dummy byte to receive the value.

use embedded_hal::spi::SpiDevice;
use log::warn;

use crate::app::ports::RegisterBus;
use crate::error::BusError;
use crate::sensors::registers::{ADDR_MASK, READ_FLAG};

pub struct SpiRegisterBus<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> SpiRegisterBus<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI: SpiDevice> RegisterBus for SpiRegisterBus<SPI> {
    fn read_register(&mut self, addr: u8) -> Result<u8, BusError> {
        let mut frame = [(addr & ADDR_MASK) | READ_FLAG, 0x00];
        self.spi.transfer_in_place(&mut frame).map_err(|e| {
            warn!("SPI | read 0x{addr:02x} failed: {e:?}");
            BusError::Transfer
        })?;
        Ok(frame[1])
    }

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), BusError> {
        self.spi.write(&[addr & ADDR_MASK, value]).map_err(|e| {
            warn!("SPI | write 0x{addr:02x} failed: {e:?}");
            BusError::Transfer
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::spi::{ErrorType, Operation};

    /// Records every frame and answers reads with `reply`.
    struct Loopback {
        frames: Vec<Vec<u8>>,
        reply: u8,
    }

    impl ErrorType for Loopback {
        type Error = Infallible;
    }

    impl SpiDevice for Loopback {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
            for op in operations {
                match op {
                    Operation::Write(buf) => self.frames.push(buf.to_vec()),
                    Operation::TransferInPlace(buf) => {
                        self.frames.push(buf.to_vec());
                        if let Some(last) = buf.last_mut() {
                            *last = self.reply;
                        }
                    }
                    _ => {}
                }
            }
            Ok(())
        }
    }

    #[test]
    fn read_sets_mode_bits_and_returns_second_byte() {
        let mut bus = SpiRegisterBus::new(Loopback {
            frames: Vec::new(),
            reply: 0x08,
        });
        assert_eq!(bus.read_register(0x03), Ok(0x08));
        assert_eq!(bus.release().frames, vec![vec![0x43, 0x00]]);
    }

    #[test]
    fn write_masks_address() {
        let mut bus = SpiRegisterBus::new(Loopback {
            frames: Vec::new(),
            reply: 0,
        });
        bus.write_register(0x3C, 0x96).unwrap();
        assert_eq!(bus.release().frames, vec![vec![0x3C, 0x96]]);
    }
}
