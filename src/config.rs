use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::cache::DEFAULT_WARN_NUM_CACHES;
use crate::frame::ImageEncoding;
use crate::ingest::CameraConfig;

pub const CONFIG_ENV: &str = "VISION_RUNTIME_CONFIG";

const DEFAULT_TICK_MS: u64 = 66;

#[derive(Debug, Deserialize, Default)]
struct RuntimeConfigFile {
    camera: Option<CameraConfigFile>,
    runner: Option<RunnerConfigFile>,
    cache: Option<CacheConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
    encoding: Option<ImageEncoding>,
}

#[derive(Debug, Deserialize, Default)]
struct RunnerConfigFile {
    synchronous: Option<bool>,
    tick_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct CacheConfigFile {
    warn_num_caches: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub camera: CameraConfig,
    pub runner: RunnerSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Run every processor on the caller's thread instead of its own worker.
    pub synchronous: bool,
    /// Interval between runner updates.
    pub tick: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub warn_num_caches: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            runner: RunnerSettings {
                synchronous: false,
                tick: Duration::from_millis(DEFAULT_TICK_MS),
            },
            cache: CacheSettings {
                warn_num_caches: DEFAULT_WARN_NUM_CACHES,
            },
        }
    }
}

impl RuntimeConfig {
    /// Load from the JSON file named by `VISION_RUNTIME_CONFIG` (if set), then apply
    /// `VISION_*` environment overrides and validate.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).ok();
        Self::load_from(path.as_deref().map(Path::new))
    }

    /// Like `load`, with an explicit config file path taking the place of the env var.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => RuntimeConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RuntimeConfigFile) -> Self {
        let defaults = Self::default();
        let camera = file.camera.unwrap_or_default();
        let runner = file.runner.unwrap_or_default();
        let cache = file.cache.unwrap_or_default();
        Self {
            camera: CameraConfig {
                width: camera.width.unwrap_or(defaults.camera.width),
                height: camera.height.unwrap_or(defaults.camera.height),
                fps: camera.fps.unwrap_or(defaults.camera.fps),
                encoding: camera.encoding.unwrap_or(defaults.camera.encoding),
            },
            runner: RunnerSettings {
                synchronous: runner.synchronous.unwrap_or(defaults.runner.synchronous),
                tick: runner
                    .tick_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.runner.tick),
            },
            cache: CacheSettings {
                warn_num_caches: cache
                    .warn_num_caches
                    .unwrap_or(defaults.cache.warn_num_caches),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(fps) = env_number("VISION_CAMERA_FPS")? {
            self.camera.fps = fps as u32;
        }
        if let Some(width) = env_number("VISION_CAMERA_WIDTH")? {
            self.camera.width = width as u32;
        }
        if let Some(height) = env_number("VISION_CAMERA_HEIGHT")? {
            self.camera.height = height as u32;
        }
        if let Some(tick) = env_number("VISION_TICK_MS")? {
            self.runner.tick = Duration::from_millis(tick);
        }
        if let Ok(value) = std::env::var("VISION_SYNCHRONOUS") {
            self.runner.synchronous = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" => true,
                "0" | "false" => false,
                other => {
                    return Err(anyhow!(
                        "VISION_SYNCHRONOUS must be one of 1/true/0/false, got '{}'",
                        other
                    ))
                }
            };
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.camera.validate()?;
        if self.runner.tick.is_zero() {
            return Err(anyhow!("runner tick must be greater than zero"));
        }
        Ok(())
    }
}

fn env_number(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => {
            let parsed: u64 = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("{} must be a non-negative integer", name))?;
            if parsed > u32::MAX as u64 {
                return Err(anyhow!("{} is out of range", name));
            }
            Ok(Some(parsed))
        }
        _ => Ok(None),
    }
}

fn read_config_file(path: &Path) -> Result<RuntimeConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
