use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};

use crate::capture::{CaptureSettings, EndOfDataPolicy};
use crate::rotation::RotationSchedule;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/tracecap/tracecap.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    pub path: PathBuf,
    pub end_of_data: EndOfDataPolicy,
    pub chunk_size: usize,
    pub idle_backoff_ms: u64,
    pub error_backoff_ms: u64,
    /// 0 = unlimited
    pub max_consecutive_errors: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Six-field cron expression, seconds first.
    pub schedule: String,
    pub retention_secs: u64,
    pub stop_warn_after_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    pub grace_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub service_name: String,
    pub description: String,
    pub source: SourceConfig,
    pub output: OutputConfig,
    pub rotation: RotationConfig,
    pub shutdown: ShutdownConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("loading config {}", path.display()))
    }

    /// Loads `path`, falling back to defaults when the file is missing and
    /// was not explicitly requested.
    pub fn load_or_default(path: impl AsRef<Path>, explicit: bool) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !explicit && !path.exists() {
            log::info!(
                "[config] {} not found, using built-in defaults",
                path.display()
            );
            let config = Self::default();
            config.validate().context("config validation failed")?;
            return Ok(config);
        }
        Self::load(path)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate().context("config validation failed")?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.service_name.trim().is_empty() {
            bail!("service_name must not be empty");
        }
        if self
            .service_name
            .chars()
            .any(|c| c.is_whitespace() || c == '/')
        {
            bail!(
                "service_name '{}' must not contain whitespace or '/'",
                self.service_name
            );
        }

        self.source.validate()?;

        if self.output.dir.as_os_str().is_empty() {
            bail!("output.dir must not be empty");
        }

        self.rotation.validate()?;

        if self.shutdown.grace_ms == 0 {
            bail!("shutdown.grace_ms must be > 0");
        }

        Ok(())
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            chunk_size: self.source.chunk_size,
            end_of_data: self.source.end_of_data,
            idle_backoff: Duration::from_millis(self.source.idle_backoff_ms),
            error_backoff: Duration::from_millis(self.source.error_backoff_ms),
            max_consecutive_errors: self.source.max_consecutive_errors,
        }
    }

    pub fn rotation_schedule(&self) -> anyhow::Result<RotationSchedule> {
        let schedule = RotationSchedule::parse(
            &self.rotation.schedule,
            Duration::from_secs(self.rotation.retention_secs),
        )?;
        Ok(schedule)
    }

    pub fn stop_warn_after(&self) -> Duration {
        Duration::from_millis(self.rotation.stop_warn_after_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown.grace_ms)
    }
}

impl SourceConfig {
    fn validate(&self) -> anyhow::Result<()> {
        if self.path.as_os_str().is_empty() {
            bail!("source.path must not be empty");
        }
        if self.chunk_size == 0 {
            bail!("source.chunk_size must be > 0");
        }
        if self.idle_backoff_ms == 0 {
            bail!("source.idle_backoff_ms must be > 0");
        }
        if self.error_backoff_ms == 0 {
            bail!("source.error_backoff_ms must be > 0");
        }
        Ok(())
    }
}

impl RotationConfig {
    fn validate(&self) -> anyhow::Result<()> {
        if self.retention_secs == 0 {
            bail!("rotation.retention_secs must be > 0");
        }
        if self.stop_warn_after_ms == 0 {
            bail!("rotation.stop_warn_after_ms must be > 0");
        }
        RotationSchedule::parse(&self.schedule, Duration::from_secs(self.retention_secs))
            .with_context(|| format!("rotation.schedule '{}'", self.schedule))?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "tracecap".to_string(),
            description: "Trace pipe capture service".to_string(),
            source: SourceConfig::default(),
            output: OutputConfig::default(),
            rotation: RotationConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/sys/kernel/debug/tracing/trace_pipe"),
            end_of_data: EndOfDataPolicy::Live,
            chunk_size: 64,
            idle_backoff_ms: 50,
            error_backoff_ms: 100,
            max_consecutive_errors: 0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/var/log/tracecap"),
        }
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            schedule: "0 */10 * * * *".to_string(),
            retention_secs: 1200,
            stop_warn_after_ms: 5000,
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_ms: 2000 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();

        assert_eq!(config.source.chunk_size, 64);
        assert_eq!(config.source.end_of_data, EndOfDataPolicy::Live);
        assert_eq!(config.rotation.retention_secs, 1200);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [source]
            path = "/dev/urandom"
            end_of_data = "finite"
            chunk_size = 4

            [output]
            dir = "/tmp/capture"
            "#,
        )
        .unwrap();

        assert_eq!(config.source.path, PathBuf::from("/dev/urandom"));
        assert_eq!(config.source.end_of_data, EndOfDataPolicy::Finite);
        assert_eq!(config.source.chunk_size, 4);
        assert_eq!(config.source.idle_backoff_ms, 50);
        assert_eq!(config.rotation.schedule, "0 */10 * * * *");
        assert_eq!(config.service_name, "tracecap");
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let err = Config::from_toml("[source]\nchunk_size = 0\n").unwrap_err();
        assert!(format!("{:#}", err).contains("chunk_size"));
    }

    #[test]
    fn rejects_five_field_cron() {
        let err = Config::from_toml("[rotation]\nschedule = \"*/10 * * * *\"\n").unwrap_err();
        assert!(format!("{:#}", err).contains("expected 6"));
    }

    #[test]
    fn rejects_unknown_end_of_data_policy() {
        assert!(Config::from_toml("[source]\nend_of_data = \"sometimes\"\n").is_err());
    }

    #[test]
    fn rejects_bad_service_name() {
        let mut config = Config::default();
        config.service_name = "trace cap".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracecap.toml");

        let mut config = Config::default();
        config.output.dir = dir.path().join("out");
        config.rotation.retention_secs = 60;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.output.dir, config.output.dir);
        assert_eq!(loaded.rotation.retention_secs, 60);
    }

    #[test]
    fn missing_default_path_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        assert!(Config::load_or_default(&path, false).is_ok());
        assert!(Config::load_or_default(&path, true).is_err());
    }
}
