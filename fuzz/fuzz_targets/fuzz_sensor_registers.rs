//! Fuzz target: `As3935` interrupt decoding
//!
//! Serves arbitrary bytes as register contents to the sensor driver and
//! asserts that every decoded interrupt stays inside the ranges the
//! sensor can report.  Bus errors are injected whenever a byte is 0xFF.
//!
//! cargo fuzz run fuzz_sensor_registers

#![no_main]

use embedded_hal::delay::DelayNs;
use libfuzzer_sys::fuzz_target;
use stormwatch::app::ports::{RegisterBus, SensorPort};
use stormwatch::config::{Sensitivity, SensorSettings};
use stormwatch::error::BusError;
use stormwatch::sensors::as3935::As3935;
use stormwatch::sensors::registers::ENERGY_MAX;
use stormwatch::sensors::{Distance, Interrupt};

struct ByteBus<'a> {
    data: &'a [u8],
    pos: usize,
}

impl ByteBus<'_> {
    fn next(&mut self) -> Result<u8, BusError> {
        let b = self.data.get(self.pos).copied().ok_or(BusError::Closed)?;
        self.pos += 1;
        if b == 0xFF {
            return Err(BusError::Transfer);
        }
        Ok(b)
    }
}

impl RegisterBus for ByteBus<'_> {
    fn read_register(&mut self, _addr: u8) -> Result<u8, BusError> {
        self.next()
    }

    fn write_register(&mut self, _addr: u8, _value: u8) -> Result<(), BusError> {
        Ok(())
    }
}

struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

fuzz_target!(|data: &[u8]| {
    let settings = SensorSettings::new(false, Sensitivity::Medium);
    let mut sensor = As3935::new(ByteBus { data, pos: 0 }, NoDelay, settings);

    for _ in 0..data.len() {
        match sensor.read_interrupt() {
            Ok(Some(Interrupt::Strike { distance, energy })) => {
                assert!(energy <= ENERGY_MAX);
                if let Distance::Km(km) = distance {
                    assert!(km < 0x3F);
                }
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    for level in 0..=8 {
        let _ = sensor.set_noise_floor(level);
    }
});
