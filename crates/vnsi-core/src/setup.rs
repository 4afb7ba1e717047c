//! Process-wide server setup values (GETSETUP / STORESETUP).

use std::collections::BTreeMap;

pub const SETUP_TIMESHIFT: &str = "Timeshift";
pub const SETUP_TIMESHIFT_BUFFER_SIZE: &str = "TimeshiftBufferSize";
pub const SETUP_TIMESHIFT_BUFFER_FILE_SIZE: &str = "TimeshiftBufferFileSize";
pub const SETUP_PLAY_RECORDING: &str = "PlayRecording";
pub const SETUP_AVOID_EPG_SCAN: &str = "AvoidEPGScan";
pub const SETUP_DISABLE_SCRAMBLE_TIMEOUT: &str = "DisableScrambleTimeout";
pub const SETUP_DISABLE_CAM_BLACKLIST: &str = "DisableCamBlacklist";

/// Named integer settings. Only known names can be read or stored.
#[derive(Debug, Clone)]
pub struct Setup {
    values: BTreeMap<&'static str, u32>,
}

impl Setup {
    pub fn get(&self, name: &str) -> Option<u32> {
        self.values.get(name).copied()
    }

    /// Returns `false` for an unknown name.
    pub fn store(&mut self, name: &str, value: u32) -> bool {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

impl Default for Setup {
    fn default() -> Self {
        let values = BTreeMap::from([
            (SETUP_TIMESHIFT, 0),
            (SETUP_TIMESHIFT_BUFFER_SIZE, 5),
            (SETUP_TIMESHIFT_BUFFER_FILE_SIZE, 6),
            (SETUP_PLAY_RECORDING, 0),
            (SETUP_AVOID_EPG_SCAN, 1),
            (SETUP_DISABLE_SCRAMBLE_TIMEOUT, 0),
            (SETUP_DISABLE_CAM_BLACKLIST, 0),
        ]);
        Setup { values }
    }
}
