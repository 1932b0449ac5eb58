//! AS3935 register map and field decoding.
//!
//! Pure bit manipulation, shared by the driver and the simulated register
//! file so both agree on layout.

use core::time::Duration;

use super::{Distance, InterruptCause};

pub const REG_AFE_GAIN: u8 = 0x00;
/// Noise floor (bits 6:4) and watchdog threshold (bits 3:0).
pub const REG_NOISE_WDTH: u8 = 0x01;
/// Spike rejection, programmed into the high nibble.
pub const REG_SREJ: u8 = 0x02;
/// LCO divider (write) / interrupt cause in the low nibble (read).
pub const REG_INT_LCO: u8 = 0x03;
pub const REG_ENERGY_LSB: u8 = 0x04;
pub const REG_ENERGY_MSB: u8 = 0x05;
pub const REG_ENERGY_MMSB: u8 = 0x06;
pub const REG_DISTANCE: u8 = 0x07;
pub const REG_DISP_LCO: u8 = 0x08;
pub const REG_TRCO_CALIB: u8 = 0x3A;
pub const REG_SRCO_CALIB: u8 = 0x3B;
pub const REG_PRESET_DEFAULT: u8 = 0x3C;
pub const REG_CALIB_RCO: u8 = 0x3D;

/// Value written to the direct-command registers.
pub const DIRECT_COMMAND: u8 = 0x96;
/// Mode bits for a register read.
pub const READ_FLAG: u8 = 0x40;
pub const ADDR_MASK: u8 = 0x3F;

pub const INT_NOISE: u8 = 0x01;
pub const INT_DISTURBER: u8 = 0x04;
pub const INT_LIGHTNING: u8 = 0x08;
pub const INT_MASK: u8 = 0x0F;

pub const DISTANCE_MASK: u8 = 0x3F;
pub const DISTANCE_OUT_OF_RANGE: u8 = 0x3F;
pub const ENERGY_MMSB_MASK: u8 = 0x1F;
pub const ENERGY_MAX: u32 = 0x1F_FFFF;

pub const NOISE_FLOOR_SHIFT: u8 = 4;
pub const NOISE_FLOOR_MASK: u8 = 0x70;
pub const WDTH_MASK: u8 = 0x0F;
pub const MAX_NOISE_FLOOR: u8 = 7;

pub const AFE_GAIN_INDOOR: u8 = 0b0001_0010;
pub const AFE_GAIN_OUTDOOR: u8 = 0b0010_0100;
/// LCO frequency division ratio and interrupt mask bits programmed at init.
pub const LCO_FDIV_INIT: u8 = 0b1001_0111;
/// Routes the SRCO onto the IRQ pin while calibrating.
pub const DISP_SRCO: u8 = 0b0010_0000;
/// Set in 0x3A / 0x3B when the RC oscillator calibration was unsuccessful.
pub const CALIB_NOK: u8 = 0b0100_0000;

/// The interrupt register is only valid 2 ms after the IRQ edge.
pub const IRQ_SETTLE: Duration = Duration::from_millis(2);

/// Decode the low nibble of [`REG_INT_LCO`].  `None` for a distance
/// estimate purge (0x00) or an undefined value.
pub fn decode_cause(raw: u8) -> Option<InterruptCause> {
    match raw & INT_MASK {
        INT_NOISE => Some(InterruptCause::Noise),
        INT_DISTURBER => Some(InterruptCause::Disturber),
        INT_LIGHTNING => Some(InterruptCause::Strike),
        _ => None,
    }
}

pub fn decode_distance(raw: u8) -> Distance {
    match raw & DISTANCE_MASK {
        DISTANCE_OUT_OF_RANGE => Distance::OutOfRange,
        km => Distance::Km(km),
    }
}

/// Assemble the 21-bit strike energy.
pub fn decode_energy(lsb: u8, msb: u8, mmsb: u8) -> u32 {
    (u32::from(mmsb & ENERGY_MMSB_MASK) << 16) | (u32::from(msb) << 8) | u32::from(lsb)
}

/// Replace the noise floor field of `current`, preserving the watchdog
/// threshold.
pub fn with_noise_floor(current: u8, level: u8) -> u8 {
    ((level << NOISE_FLOOR_SHIFT) & NOISE_FLOOR_MASK) | (current & WDTH_MASK)
}

pub fn noise_floor_of(reg: u8) -> u8 {
    (reg & NOISE_FLOOR_MASK) >> NOISE_FLOOR_SHIFT
}

/// Split an energy value into LSB, MSB, MMSB register bytes.
pub fn encode_energy(energy: u32) -> [u8; 3] {
    let e = energy.min(ENERGY_MAX);
    [e as u8, (e >> 8) as u8, ((e >> 16) as u8) & ENERGY_MMSB_MASK]
}
