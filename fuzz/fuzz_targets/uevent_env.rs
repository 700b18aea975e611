#![no_main]

use libfuzzer_sys::fuzz_target;
use std::collections::HashMap;
use std::path::Path;
use xapi_block_hotplug::collaborators::{FixedSharing, KnownDrives};
use xapi_block_hotplug::pipeline::decide_env;

fuzz_target!(|data: &[u8]| {
    // Treat the input as a udev environment block: one KEY=VALUE per line
    if let Ok(input) = std::str::from_utf8(data) {
        let vars: HashMap<String, String> = input
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        // Must never panic, and ignored events must never plan anything
        let decision = decide_env(
            &vars,
            Path::new("/nonexistent-sysfs"),
            &KnownDrives::new(["sr0"]),
            &FixedSharing(true),
        );
        if decision.classification.is_ignored() {
            assert!(decision.actions.is_empty());
        }
    }
});
