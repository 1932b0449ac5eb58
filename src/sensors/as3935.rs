//! AS3935 Franklin lightning sensor driver.
//!
//! Generic over a [`RegisterBus`] and an `embedded-hal` delay, so the same
//! code drives the SPI adapter on hardware and the simulated register file
//! in tests.
//!
//! ## Initialisation sequence
//!
//! 1. `PRESET_DEFAULT` direct command, all registers to power-on values.
//! 2. `CALIB_RCO` direct command, SRCO pulsed onto IRQ for 2 ms, then the
//!    calibration result registers are checked.
//! 3. LCO divider, AFE gain, noise floor + watchdog, spike rejection.

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::app::ports::{RegisterBus, SensorPort};
use crate::config::SensorSettings;
use crate::error::SensorFault;

use super::registers::{
    self, CALIB_NOK, DIRECT_COMMAND, DISP_SRCO, IRQ_SETTLE, LCO_FDIV_INIT, MAX_NOISE_FLOOR,
    REG_AFE_GAIN, REG_CALIB_RCO, REG_DISP_LCO, REG_DISTANCE, REG_ENERGY_LSB, REG_ENERGY_MMSB,
    REG_ENERGY_MSB, REG_INT_LCO, REG_NOISE_WDTH, REG_PRESET_DEFAULT, REG_SRCO_CALIB, REG_SREJ,
    REG_TRCO_CALIB, WDTH_MASK,
};
use super::{Interrupt, InterruptCause};

pub struct As3935<B, D> {
    bus: B,
    delay: D,
    settings: SensorSettings,
    /// Last noise floor successfully written.
    noise_floor: u8,
}

impl<B: RegisterBus, D: DelayNs> As3935<B, D> {
    pub fn new(bus: B, delay: D, settings: SensorSettings) -> Self {
        Self {
            bus,
            delay,
            settings,
            noise_floor: settings.noise_floor,
        }
    }

    pub fn noise_floor(&self) -> u8 {
        self.noise_floor
    }

    fn read(&mut self, addr: u8) -> Result<u8, SensorFault> {
        Ok(self.bus.read_register(addr)?)
    }

    fn write(&mut self, addr: u8, value: u8) -> Result<(), SensorFault> {
        Ok(self.bus.write_register(addr, value)?)
    }

    fn settle(&mut self) {
        self.delay.delay_us(IRQ_SETTLE.as_micros() as u32);
    }

    fn calibrate(&mut self) -> Result<(), SensorFault> {
        self.write(REG_CALIB_RCO, DIRECT_COMMAND)?;
        self.write(REG_DISP_LCO, DISP_SRCO)?;
        self.settle();
        self.write(REG_DISP_LCO, 0x00)?;

        let trco = self.read(REG_TRCO_CALIB)?;
        let srco = self.read(REG_SRCO_CALIB)?;
        if trco & CALIB_NOK != 0 || srco & CALIB_NOK != 0 {
            warn!("SENSOR | RCO calibration failed (trco=0x{trco:02x} srco=0x{srco:02x})");
            return Err(SensorFault::CalibrationFailed);
        }
        Ok(())
    }

    fn read_strike(&mut self) -> Result<Interrupt, SensorFault> {
        let distance = registers::decode_distance(self.read(REG_DISTANCE)?);
        let lsb = self.read(REG_ENERGY_LSB)?;
        let msb = self.read(REG_ENERGY_MSB)?;
        let mmsb = self.read(REG_ENERGY_MMSB)?;
        Ok(Interrupt::Strike {
            distance,
            energy: registers::decode_energy(lsb, msb, mmsb),
        })
    }
}

impl<B: RegisterBus, D: DelayNs> SensorPort for As3935<B, D> {
    fn initialize(&mut self) -> Result<(), SensorFault> {
        let s = self.settings;

        self.write(REG_PRESET_DEFAULT, DIRECT_COMMAND)?;
        self.settle();
        self.calibrate()?;

        self.write(REG_INT_LCO, LCO_FDIV_INIT)?;
        self.write(REG_AFE_GAIN, s.afe_gain)?;
        self.write(
            REG_NOISE_WDTH,
            (s.noise_floor << registers::NOISE_FLOOR_SHIFT) | (s.watchdog_threshold & WDTH_MASK),
        )?;
        let srej = self.read(REG_SREJ)?;
        self.write(REG_SREJ, (s.spike_rejection << 4) | (srej & 0x0F))?;
        self.noise_floor = s.noise_floor;

        info!(
            "SENSOR | powered up: mode={} nf={} srej={} wdth={}",
            if s.indoor { "indoor" } else { "outdoor" },
            s.noise_floor,
            s.spike_rejection,
            s.watchdog_threshold
        );
        Ok(())
    }

    fn read_interrupt(&mut self) -> Result<Option<Interrupt>, SensorFault> {
        self.settle();
        let raw = self.read(REG_INT_LCO)?;
        match registers::decode_cause(raw) {
            Some(InterruptCause::Noise) => Ok(Some(Interrupt::Noise)),
            Some(InterruptCause::Disturber) => Ok(Some(Interrupt::Disturber)),
            Some(InterruptCause::Strike) => self.read_strike().map(Some),
            None => {
                debug!("SENSOR | interrupt with no actionable cause (0x{raw:02x})");
                Ok(None)
            }
        }
    }

    fn set_noise_floor(&mut self, level: u8) -> Result<(), SensorFault> {
        if level > MAX_NOISE_FLOOR {
            return Err(SensorFault::InvalidNoiseFloor(level));
        }
        let current = self.read(REG_NOISE_WDTH)?;
        let updated = registers::with_noise_floor(current, level);
        self.write(REG_NOISE_WDTH, updated)?;
        self.noise_floor = level;
        info!("SENSOR | noise floor set to {level} (reg 0x01 = 0x{updated:02x})");
        Ok(())
    }

    fn reset(&mut self) -> Result<(), SensorFault> {
        self.bus.reopen()?;
        self.initialize()
    }
}
