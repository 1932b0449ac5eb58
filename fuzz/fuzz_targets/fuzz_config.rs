//! Fuzz target: `SystemConfig::from_toml` + `Settings::from_config`
//!
//! Feeds arbitrary text through the TOML loader and the validator and
//! asserts that anything accepted resolves into consistent settings.
//!
//! cargo fuzz run fuzz_config

#![no_main]

use libfuzzer_sys::fuzz_target;
use stormwatch::config::{Settings, SystemConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = SystemConfig::from_toml(text) else {
        return;
    };
    if let Ok(settings) = Settings::from_config(&config) {
        let z = settings.zones;
        assert!(z.critical_distance_km >= 1);
        assert!(z.warning_distance_km > z.critical_distance_km);
        assert!(z.warning_distance_km <= 63);
        assert!(!z.all_clear_after.is_zero());
        let n = settings.noise;
        assert!(n.raised_level > n.default_level);
        assert!(n.raised_level <= n.max_level);
        assert!(n.event_threshold >= 1);
        assert!(settings.retry.backoff(u32::MAX) <= settings.retry.max_backoff);
    }
});
