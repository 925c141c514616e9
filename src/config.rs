//! Parses the `KEY value` configuration text format into a validated
//! `Config`.

use std::collections::HashMap;
use std::io::{BufRead, Read};
use std::path::Path;

use crate::error::NvSimError;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub num_packages: u32,
    pub dies_per_package: u32,
    pub planes_per_die: u32,
    pub blocks_per_plane: u32,
    pub pages_per_block: u32,
    pub nv_page_size: u32,

    pub read_time: u32,
    pub write_time: u32,
    pub erase_time: u32,
    pub lookup_time: u32,
    pub cycle_time_ns: f64,

    pub garbage_collect: bool,
    pub wear_level_log: bool,
    pub use_epochs: bool,
    pub runtime_write: bool,

    pub icc1: f64,
    pub icc2: f64,
    pub icc3: f64,
    pub isb2: f64,
    pub read_i: f64,
    pub write_i: f64,
    pub erase_i: f64,
    pub standby_i: f64,
    pub vcc: f64,

    pub log_dir: String,
}

impl Default for Config {
    /// A reasonable small baseline configuration, shared by the test suite
    /// and the example end-to-end scenarios.
    fn default() -> Self {
        Config {
            num_packages: 2,
            dies_per_package: 2,
            planes_per_die: 1,
            blocks_per_plane: 2,
            pages_per_block: 4,
            nv_page_size: 4096,
            read_time: 40,
            write_time: 100,
            erase_time: 500,
            lookup_time: 10,
            cycle_time_ns: 1.0,
            garbage_collect: true,
            wear_level_log: false,
            use_epochs: false,
            runtime_write: false,
            icc1: 180.0,
            icc2: 180.0,
            icc3: 180.0,
            isb2: 20.0,
            read_i: 180.0,
            write_i: 180.0,
            erase_i: 180.0,
            standby_i: 20.0,
            vcc: 1.8,
            log_dir: ".".to_string(),
        }
    }
}

fn required_u32(raw: &HashMap<String, String>, key: &'static str) -> Result<u32, NvSimError> {
    let value = raw.get(key).ok_or(NvSimError::MissingKey(key))?;
    value
        .parse::<u32>()
        .map_err(|_| NvSimError::InvalidValue {
            key: key.to_string(),
            value: value.clone(),
        })
}

fn optional_u32(raw: &HashMap<String, String>, key: &'static str, default: u32) -> Result<u32, NvSimError> {
    match raw.get(key) {
        None => Ok(default),
        Some(value) => value.parse::<u32>().map_err(|_| NvSimError::InvalidValue {
            key: key.to_string(),
            value: value.clone(),
        }),
    }
}

fn optional_f64(raw: &HashMap<String, String>, key: &'static str, default: f64) -> Result<f64, NvSimError> {
    match raw.get(key) {
        None => Ok(default),
        Some(value) => value.parse::<f64>().map_err(|_| NvSimError::InvalidValue {
            key: key.to_string(),
            value: value.clone(),
        }),
    }
}

fn optional_bool(raw: &HashMap<String, String>, key: &'static str, default: bool) -> Result<bool, NvSimError> {
    match raw.get(key) {
        None => Ok(default),
        Some(value) => match value.trim() {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(NvSimError::InvalidValue {
                key: key.to_string(),
                value: other.to_string(),
            }),
        },
    }
}

const RECOGNIZED_KEYS: &[&str] = &[
    "NUM_PACKAGES",
    "DIES_PER_PACKAGE",
    "PLANES_PER_DIE",
    "BLOCKS_PER_PLANE",
    "PAGES_PER_BLOCK",
    "NV_PAGE_SIZE",
    "READ_TIME",
    "WRITE_TIME",
    "ERASE_TIME",
    "LOOKUP_TIME",
    "CYCLE_TIME",
    "GARBAGE_COLLECT",
    "WEAR_LEVEL_LOG",
    "USE_EPOCHS",
    "RUNTIME_WRITE",
    "ICC1",
    "ICC2",
    "ICC3",
    "ISB2",
    "READ_I",
    "WRITE_I",
    "ERASE_I",
    "STANDBY_I",
    "VCC",
    "LOG_DIR",
];

impl Config {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Config, NvSimError> {
        let mut text = String::new();
        std::fs::File::open(path)?.read_to_string(&mut text)?;
        Self::from_reader(text.as_bytes())
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Config, NvSimError> {
        let mut raw = HashMap::new();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.splitn(2, char::is_whitespace);
            let key = parts.next().unwrap_or("").trim();
            let value = parts.next().unwrap_or("").trim();
            if key.is_empty() {
                continue;
            }
            if !RECOGNIZED_KEYS.contains(&key) {
                log::warn!("ignoring unrecognized config key `{}`", key);
                continue;
            }
            raw.insert(key.to_string(), value.to_string());
        }

        let defaults = Config::default();
        let config = Config {
            num_packages: required_u32(&raw, "NUM_PACKAGES")?,
            dies_per_package: required_u32(&raw, "DIES_PER_PACKAGE")?,
            planes_per_die: required_u32(&raw, "PLANES_PER_DIE")?,
            blocks_per_plane: required_u32(&raw, "BLOCKS_PER_PLANE")?,
            pages_per_block: required_u32(&raw, "PAGES_PER_BLOCK")?,
            nv_page_size: required_u32(&raw, "NV_PAGE_SIZE")?,
            read_time: optional_u32(&raw, "READ_TIME", defaults.read_time)?,
            write_time: optional_u32(&raw, "WRITE_TIME", defaults.write_time)?,
            erase_time: optional_u32(&raw, "ERASE_TIME", defaults.erase_time)?,
            lookup_time: optional_u32(&raw, "LOOKUP_TIME", defaults.lookup_time)?,
            cycle_time_ns: optional_f64(&raw, "CYCLE_TIME", defaults.cycle_time_ns)?,
            garbage_collect: optional_bool(&raw, "GARBAGE_COLLECT", defaults.garbage_collect)?,
            wear_level_log: optional_bool(&raw, "WEAR_LEVEL_LOG", defaults.wear_level_log)?,
            use_epochs: optional_bool(&raw, "USE_EPOCHS", defaults.use_epochs)?,
            runtime_write: optional_bool(&raw, "RUNTIME_WRITE", defaults.runtime_write)?,
            icc1: optional_f64(&raw, "ICC1", defaults.icc1)?,
            icc2: optional_f64(&raw, "ICC2", defaults.icc2)?,
            icc3: optional_f64(&raw, "ICC3", defaults.icc3)?,
            isb2: optional_f64(&raw, "ISB2", defaults.isb2)?,
            read_i: optional_f64(&raw, "READ_I", defaults.read_i)?,
            write_i: optional_f64(&raw, "WRITE_I", defaults.write_i)?,
            erase_i: optional_f64(&raw, "ERASE_I", defaults.erase_i)?,
            standby_i: optional_f64(&raw, "STANDBY_I", defaults.standby_i)?,
            vcc: optional_f64(&raw, "VCC", defaults.vcc)?,
            log_dir: raw.get("LOG_DIR").cloned().unwrap_or(defaults.log_dir),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), NvSimError> {
        for (name, value) in [
            ("NUM_PACKAGES", self.num_packages),
            ("DIES_PER_PACKAGE", self.dies_per_package),
            ("PLANES_PER_DIE", self.planes_per_die),
            ("BLOCKS_PER_PLANE", self.blocks_per_plane),
            ("PAGES_PER_BLOCK", self.pages_per_block),
            ("NV_PAGE_SIZE", self.nv_page_size),
        ] {
            if value == 0 || !value.is_power_of_two() {
                return Err(NvSimError::NotPowerOfTwo {
                    name,
                    value: value as u64,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recognized_keys_and_applies_defaults() {
        let text = "NUM_PACKAGES 2\nDIES_PER_PACKAGE 2\nPLANES_PER_DIE 1\nBLOCKS_PER_PLANE 2\nPAGES_PER_BLOCK 4\nNV_PAGE_SIZE 4096\nGARBAGE_COLLECT 1\n";
        let config = Config::from_reader(text.as_bytes()).unwrap();
        assert_eq!(config.num_packages, 2);
        assert!(config.garbage_collect);
        assert_eq!(config.read_time, Config::default().read_time);
    }

    #[test]
    fn unrecognized_key_is_ignored_not_fatal() {
        let text = "NUM_PACKAGES 2\nDIES_PER_PACKAGE 2\nPLANES_PER_DIE 1\nBLOCKS_PER_PLANE 2\nPAGES_PER_BLOCK 4\nNV_PAGE_SIZE 4096\nSOME_FUTURE_KEY 7\n";
        assert!(Config::from_reader(text.as_bytes()).is_ok());
    }

    #[test]
    fn non_power_of_two_geometry_is_fatal() {
        let text = "NUM_PACKAGES 3\nDIES_PER_PACKAGE 2\nPLANES_PER_DIE 1\nBLOCKS_PER_PLANE 2\nPAGES_PER_BLOCK 4\nNV_PAGE_SIZE 4096\n";
        assert!(matches!(
            Config::from_reader(text.as_bytes()),
            Err(NvSimError::NotPowerOfTwo { .. })
        ));
    }

    #[test]
    fn missing_required_key_is_fatal() {
        let text = "DIES_PER_PACKAGE 2\nPLANES_PER_DIE 1\nBLOCKS_PER_PLANE 2\nPAGES_PER_BLOCK 4\nNV_PAGE_SIZE 4096\n";
        assert!(matches!(
            Config::from_reader(text.as_bytes()),
            Err(NvSimError::MissingKey("NUM_PACKAGES"))
        ));
    }

    #[test]
    fn from_path_reads_and_parses_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nvsim.conf");
        std::fs::write(
            &path,
            "NUM_PACKAGES 2\nDIES_PER_PACKAGE 2\nPLANES_PER_DIE 1\nBLOCKS_PER_PLANE 2\nPAGES_PER_BLOCK 4\nNV_PAGE_SIZE 4096\n",
        )
        .unwrap();
        let config = Config::from_path(&path).unwrap();
        assert_eq!(config.num_packages, 2);
    }

    #[test]
    fn from_path_propagates_io_errors_for_a_missing_file() {
        assert!(matches!(
            Config::from_path("/nonexistent/path/nvsim.conf"),
            Err(NvSimError::Io(_))
        ));
    }
}
