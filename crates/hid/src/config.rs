//! Transport configuration

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest buffer a single usbfs control transfer can describe (wLength)
const MAX_REPORT_BUFFER: usize = u16::MAX as usize;

const APP_DIR: &str = "usbfs-hid";
const CONFIG_FILE: &str = "config.toml";
const SYSTEM_CONFIG: &str = "/etc/usbfs-hid/config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HidConfig {
    /// Directory holding one node per USB device
    #[serde(default = "HidConfig::default_device_root")]
    pub device_root: PathBuf,
    /// Receive buffer for report descriptors and GET_REPORT
    #[serde(default = "HidConfig::default_report_buffer_size")]
    pub report_buffer_size: usize,
    /// Timeout for control requests that take none from the caller
    #[serde(default = "HidConfig::default_control_timeout_ms")]
    pub control_timeout_ms: u32,
    /// Diagnostic filter: a level or `RUST_LOG`-style directives such as
    /// `hid=debug`; unset keeps diagnostics discarded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for HidConfig {
    fn default() -> Self {
        Self {
            device_root: Self::default_device_root(),
            report_buffer_size: Self::default_report_buffer_size(),
            control_timeout_ms: Self::default_control_timeout_ms(),
            log_level: None,
        }
    }
}

impl HidConfig {
    fn default_device_root() -> PathBuf {
        PathBuf::from("/dev/bus/usb")
    }

    fn default_report_buffer_size() -> usize {
        256
    }

    fn default_control_timeout_ms() -> u32 {
        1000
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.control_timeout_ms))
    }

    /// Config files consulted when no path is given, most specific first
    pub fn search_paths() -> Vec<PathBuf> {
        Self::user_path()
            .into_iter()
            .chain(std::iter::once(PathBuf::from(SYSTEM_CONFIG)))
            .collect()
    }

    /// `usbfs-hid/config.toml` under the user configuration directory
    pub fn user_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load `path`, or the first of [`search_paths`](Self::search_paths)
    /// that exists
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => locate(&Self::search_paths())
                .ok_or_else(|| anyhow!("no usbfs-hid config.toml in the search path"))?,
        };
        Self::from_file(&path)
    }

    /// Like [`load`](Self::load) without a path, falling back to defaults
    ///
    /// A missing file is expected; a file that exists but cannot be used is
    /// logged before the defaults are returned.
    pub fn load_or_default() -> Self {
        let Some(path) = locate(&Self::search_paths()) else {
            return Self::default();
        };
        Self::from_file(&path).unwrap_or_else(|e| {
            tracing::warn!("Ignoring {}: {:#}", path.display(), e);
            Self::default()
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let config = Self::from_toml(&text).with_context(|| format!("in {}", path.display()))?;
        tracing::debug!("Configuration read from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a TOML document; absent keys take their defaults
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as TOML, creating missing parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self)?;
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
        }
        fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))?;
        tracing::debug!("Configuration written to {}", path.display());
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_REPORT_BUFFER).contains(&self.report_buffer_size) {
            bail!(
                "report_buffer_size = {} is outside 1..={}",
                self.report_buffer_size,
                MAX_REPORT_BUFFER
            );
        }
        if self.control_timeout_ms == 0 {
            bail!("control_timeout_ms must be greater than zero");
        }
        if let Some(level) = &self.log_level {
            common::validate_filter(level)
                .with_context(|| format!("log_level = {:?} is not a valid filter", level))?;
        }
        Ok(())
    }
}

fn locate(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|path| path.is_file()).cloned()
}

/// Load a configuration file, expanding a leading `~`
pub fn load_config(path: &str) -> Result<HidConfig> {
    let expanded = shellexpand::tilde(path);
    HidConfig::from_file(Path::new(expanded.as_ref()))
}
