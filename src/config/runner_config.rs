//! 运行器配置
//!
//! Optional TOML file tuning how runs are executed:
//!
//! ```toml
//! start_delay = "1s"
//! tests = [0, 1, 2]
//!
//! [transfer]
//! baud_rates = [9600, 115200]
//! timeout = "2s"
//! payload_len = 64
//! ```
use crate::unit_test::UnitId;
use crate::utils;
use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use strum::IntoEnumIterator;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Delay between scheduling a unit test and calling its `start()`.
    #[serde(with = "humantime_serde")]
    pub start_delay: Duration,
    /// Raw unit ids in list order. Unknown ids are skipped.
    pub tests: Vec<u8>,
    /// Directory the log file name is resolved against.
    pub app_dir: Option<PathBuf>,
    pub transfer: TransferConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub baud_rates: Vec<u32>,
    #[serde(with = "humantime_serde")] // 读超时
    pub timeout: Duration,
    pub payload_len: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            start_delay: Duration::from_secs(1),
            tests: UnitId::iter().map(u8::from).collect(),
            app_dir: None,
            transfer: TransferConfig::default(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            baud_rates: vec![9600, 19200, 38400, 57600, 115200],
            timeout: Duration::from_secs(2),
            payload_len: 64,
        }
    }
}

impl RunnerConfig {
    /// 从文件中读取
    pub fn from_file(path: &Path) -> Result<Self> {
        utils::read_toml_from_file(path)
    }

    pub fn app_dir(&self) -> PathBuf {
        self.app_dir.clone().unwrap_or_else(utils::application_dir)
    }
}
