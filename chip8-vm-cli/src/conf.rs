//! Command line configuration.
use std::{env, fs::File};

use chip8_vm::{prelude::*, Hz};
use serde::Deserialize;

use crate::{
    error::AppError,
    keymap::{KeyDef, KeyMap},
};

/// Environment variable naming an optional YAML config file.
pub const CONF_ENV: &str = "CHIP8_CONF";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CliConf {
    pub vm: Chip8Conf,
    /// Replaces the default keyboard layout when present.
    pub keymap: Option<Vec<KeyDef>>,
    /// Time between two checks for a changed frame.
    pub frame_interval_ms: u64,
}

impl Default for CliConf {
    fn default() -> Self {
        Self {
            vm: Chip8Conf {
                clock_frequency: Some(Hz(700)),
                ..Default::default()
            },
            keymap: None,
            frame_interval_ms: 16,
        }
    }
}

impl CliConf {
    /// Load the file named by `CHIP8_CONF`, or fall back to defaults.
    pub fn from_env() -> Result<Self, AppError> {
        match env::var_os(CONF_ENV) {
            Some(filepath) => {
                log::info!("load config: {}", filepath.to_string_lossy());
                let file = File::open(&filepath)?;
                Self::from_reader(file)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_reader(reader: impl std::io::Read) -> Result<Self, AppError> {
        let conf: CliConf = serde_yaml::from_reader(reader)?;
        conf.vm.validate()?;
        Ok(conf)
    }

    pub fn keymap(&self) -> KeyMap {
        match &self.keymap {
            Some(defs) => KeyMap::from_defs(defs),
            None => KeyMap::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use chip8_vm::KeyCode;

    use super::*;

    #[test]
    fn test_parse_conf() {
        let yaml = r#"
vm:
  clock_frequency: 500
  key_wait_timeout_ms: ~
  shift_vy: true
keymap:
  - key: j
    chip8: 10
frame_interval_ms: 33
"#;
        let conf = CliConf::from_reader(yaml.as_bytes()).unwrap();

        assert_eq!(conf.vm.clock_frequency, Some(Hz(500)));
        assert_eq!(conf.vm.timer_frequency, Hz(60));
        assert_eq!(conf.vm.key_wait_timeout(), None);
        assert!(conf.vm.shift_vy);
        assert_eq!(conf.frame_interval_ms, 33);
        assert_eq!(conf.keymap().map_key('j'), Some(KeyCode::KeyA));
    }

    #[test]
    fn test_reject_zero_timer() {
        let yaml = "vm:\n  timer_frequency: 0\n";
        assert!(CliConf::from_reader(yaml.as_bytes()).is_err());
    }

    #[test]
    fn test_defaults() {
        let conf = CliConf::default();
        assert_eq!(conf.vm.clock_frequency, Some(Hz(700)));
        assert_eq!(conf.keymap().map_key('x'), Some(KeyCode::Key0));
    }
}
