//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock or simulated adapters.  All tests run on the host with no
//! real hardware required.

mod mock_hw;
mod monitor_tests;
mod service_scenarios;
