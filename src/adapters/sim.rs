//! Simulated AS3935 for hosts without a sensor bus.
//!
//! A register file behind the [`RegisterBus`] port plus an IRQ source
//! behind [`InterruptLine`], sharing one state block.  A [`SimHandle`]
//! injects events and bus failures from tests or the console.
//!
//! Events queue up and are latched one at a time: the IRQ fires when an
//! event is latched, reading the interrupt register releases it, and the
//! next queued event is latched on the following edge wait.  Distance and
//! energy stay readable until then.

use core::time::Duration;
use std::collections::VecDeque;
use std::sync::Arc;

use log::debug;
use parking_lot::{Condvar, Mutex};

use crate::app::ports::{InterruptLine, RegisterBus};
use crate::error::BusError;
use crate::events::{CancelToken, EdgeWait};
use crate::sensors::registers::{
    self, ADDR_MASK, CALIB_NOK, DIRECT_COMMAND, INT_DISTURBER, INT_LIGHTNING, INT_MASK,
    INT_NOISE, REG_CALIB_RCO, REG_DISTANCE, REG_ENERGY_LSB, REG_ENERGY_MMSB, REG_ENERGY_MSB,
    REG_INT_LCO, REG_NOISE_WDTH, REG_PRESET_DEFAULT, REG_SRCO_CALIB, REG_TRCO_CALIB,
};
use crate::sensors::{Distance, Interrupt};

/// Calibration-done flag in 0x3A / 0x3B.
const CALIB_DONE: u8 = 0x80;

/// How often a waiting IRQ observes cancellation.
const IRQ_POLL: Duration = Duration::from_millis(10);

/// Power-on register values.
fn power_on_registers() -> [u8; 64] {
    let mut regs = [0u8; 64];
    regs[0x00] = 0b0010_0100;
    regs[0x01] = 0b0010_0010;
    regs[0x02] = 0b1100_0010;
    regs[usize::from(REG_DISTANCE)] = registers::DISTANCE_OUT_OF_RANGE;
    regs
}

struct SimState {
    regs: [u8; 64],
    pending: VecDeque<Interrupt>,
    /// An event sits in the registers and has not been read yet.
    latched: bool,
    /// The latched event's edge has been handed to a waiter.
    reported: bool,
    fail_next: u32,
    offline: bool,
    calibration_fails: bool,
    presets: u32,
    floor_writes: Vec<u8>,
}

impl SimState {
    fn new() -> Self {
        Self {
            regs: power_on_registers(),
            pending: VecDeque::new(),
            latched: false,
            reported: false,
            fail_next: 0,
            offline: false,
            calibration_fails: false,
            presets: 0,
            floor_writes: Vec::new(),
        }
    }

    fn check_bus(&mut self) -> Result<(), BusError> {
        if self.offline {
            return Err(BusError::Closed);
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(BusError::Transfer);
        }
        Ok(())
    }

    fn latch(&mut self, irq: Interrupt) {
        let cause = match irq {
            Interrupt::Noise => INT_NOISE,
            Interrupt::Disturber => INT_DISTURBER,
            Interrupt::Strike { distance, energy } => {
                let [lsb, msb, mmsb] = registers::encode_energy(energy);
                self.regs[usize::from(REG_ENERGY_LSB)] = lsb;
                self.regs[usize::from(REG_ENERGY_MSB)] = msb;
                self.regs[usize::from(REG_ENERGY_MMSB)] = mmsb;
                self.regs[usize::from(REG_DISTANCE)] = match distance {
                    Distance::Km(km) => km & registers::DISTANCE_MASK,
                    Distance::OutOfRange => registers::DISTANCE_OUT_OF_RANGE,
                };
                INT_LIGHTNING
            }
        };
        let int = &mut self.regs[usize::from(REG_INT_LCO)];
        *int = (*int & !INT_MASK) | cause;
        self.latched = true;
        self.reported = false;
    }

    fn release(&mut self) {
        self.regs[usize::from(REG_INT_LCO)] &= !INT_MASK;
        self.latched = false;
        self.reported = false;
    }
}

struct Shared {
    state: Mutex<SimState>,
    edge: Condvar,
}

/// Create a simulated sensor, its IRQ line, and a control handle.
pub fn simulated() -> (SimulatedAs3935, SimIrq, SimHandle) {
    let shared = Arc::new(Shared {
        state: Mutex::new(SimState::new()),
        edge: Condvar::new(),
    });
    (
        SimulatedAs3935 {
            shared: shared.clone(),
        },
        SimIrq {
            shared: shared.clone(),
        },
        SimHandle { shared },
    )
}

// ── Register bus ─────────────────────────────────────────────

pub struct SimulatedAs3935 {
    shared: Arc<Shared>,
}

impl RegisterBus for SimulatedAs3935 {
    fn read_register(&mut self, addr: u8) -> Result<u8, BusError> {
        let mut st = self.shared.state.lock();
        st.check_bus()?;
        let addr = addr & ADDR_MASK;
        let value = st.regs[usize::from(addr)];
        if addr == REG_INT_LCO && st.latched {
            st.release();
            self.shared.edge.notify_all();
        }
        Ok(value)
    }

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), BusError> {
        let mut st = self.shared.state.lock();
        st.check_bus()?;
        let addr = addr & ADDR_MASK;
        match addr {
            REG_PRESET_DEFAULT if value == DIRECT_COMMAND => {
                st.regs = power_on_registers();
                st.latched = false;
                st.reported = false;
                st.presets += 1;
                self.shared.edge.notify_all();
            }
            REG_CALIB_RCO if value == DIRECT_COMMAND => {
                let result = if st.calibration_fails {
                    CALIB_NOK
                } else {
                    CALIB_DONE
                };
                st.regs[usize::from(REG_TRCO_CALIB)] = result;
                st.regs[usize::from(REG_SRCO_CALIB)] = result;
            }
            REG_INT_LCO => {
                let reg = &mut st.regs[usize::from(REG_INT_LCO)];
                *reg = (value & !INT_MASK) | (*reg & INT_MASK);
            }
            REG_NOISE_WDTH => {
                st.regs[usize::from(addr)] = value;
                st.floor_writes.push(registers::noise_floor_of(value));
            }
            _ => st.regs[usize::from(addr)] = value,
        }
        Ok(())
    }

    fn reopen(&mut self) -> Result<(), BusError> {
        if self.shared.state.lock().offline {
            return Err(BusError::Closed);
        }
        debug!("SIM | bus reopened");
        Ok(())
    }
}

// ── IRQ line ─────────────────────────────────────────────────

pub struct SimIrq {
    shared: Arc<Shared>,
}

impl InterruptLine for SimIrq {
    fn wait_for_edge(&mut self, cancel: &CancelToken) -> Result<EdgeWait, BusError> {
        let mut st = self.shared.state.lock();
        loop {
            if cancel.is_cancelled() {
                return Ok(EdgeWait::Cancelled);
            }
            if !st.latched {
                if let Some(irq) = st.pending.pop_front() {
                    st.latch(irq);
                }
            }
            if st.latched && !st.reported {
                st.reported = true;
                return Ok(EdgeWait::Fired);
            }
            self.shared.edge.wait_for(&mut st, IRQ_POLL);
        }
    }
}

// ── Control handle ───────────────────────────────────────────

#[derive(Clone)]
pub struct SimHandle {
    shared: Arc<Shared>,
}

impl SimHandle {
    pub fn inject(&self, irq: Interrupt) {
        self.shared.state.lock().pending.push_back(irq);
        self.shared.edge.notify_all();
    }

    pub fn strike(&self, distance: Distance, energy: u32) {
        self.inject(Interrupt::Strike { distance, energy });
    }

    pub fn disturber(&self) {
        self.inject(Interrupt::Disturber);
    }

    pub fn noise(&self) {
        self.inject(Interrupt::Noise);
    }

    /// Fail the next `n` register accesses.
    pub fn fail_next(&self, n: u32) {
        self.shared.state.lock().fail_next = n;
    }

    /// Fail every register access and bus reopen until cleared.
    pub fn set_offline(&self, offline: bool) {
        self.shared.state.lock().offline = offline;
    }

    pub fn fail_calibration(&self, fails: bool) {
        self.shared.state.lock().calibration_fails = fails;
    }

    pub fn register(&self, addr: u8) -> u8 {
        self.shared.state.lock().regs[usize::from(addr & ADDR_MASK)]
    }

    /// Noise floor currently programmed.
    pub fn noise_floor(&self) -> u8 {
        registers::noise_floor_of(self.register(REG_NOISE_WDTH))
    }

    /// Every noise floor written through 0x01, oldest first.
    pub fn floor_writes(&self) -> Vec<u8> {
        self.shared.state.lock().floor_writes.clone()
    }

    /// Number of preset-default commands received.
    pub fn presets(&self) -> u32 {
        self.shared.state.lock().presets
    }

    /// Events injected but not yet latched.
    pub fn queued(&self) -> usize {
        self.shared.state.lock().pending.len()
    }
}
