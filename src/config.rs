use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::denoise::DenoiseParams;
use crate::monitor::Timeout;
use crate::object_queue::OverflowMode;
use crate::source::SourceConfig;

const DEFAULT_FRAME_CAPACITY: usize = 8;
const DEFAULT_BYTE_CAPACITY: usize = 4096;
const DEFAULT_DEQUEUE_TIMEOUT_MS: u32 = 200;
const DEFAULT_REQUIRED_SUCCESSES: u32 = 2;
const DEFAULT_PROBE_TIMEOUT_MS: u32 = 1000;

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    queue: Option<QueueConfigFile>,
    device: Option<DeviceConfigFile>,
    denoise: Option<DenoiseConfigFile>,
    source: Option<SourceConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct QueueConfigFile {
    capacity: Option<usize>,
    mode: Option<OverflowMode>,
    byte_capacity: Option<usize>,
    dequeue_timeout_ms: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DeviceConfigFile {
    addr: Option<String>,
    required_successes: Option<u32>,
    probe_timeout_ms: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DenoiseConfigFile {
    window: Option<usize>,
    sigma_spatial: Option<f32>,
    sigma_range: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    noise: Option<u16>,
    dropout: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub queue: QueueSettings,
    pub device: DeviceSettings,
    pub denoise: DenoiseParams,
    pub source: SourceConfig,
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Frame slots in the `FrameQueue`.
    pub capacity: usize,
    pub mode: OverflowMode,
    /// Bytes held by the telemetry `ByteQueue`.
    pub byte_capacity: usize,
    pub dequeue_timeout: Timeout,
}

#[derive(Debug, Clone)]
pub struct DeviceSettings {
    /// Sensor address to probe before streaming. `None` skips the probe.
    pub addr: Option<String>,
    pub required_successes: u32,
    pub probe_timeout_ms: u32,
}

impl PipelineConfig {
    /// Load from the JSON file named by `SENSOR_QUEUE_CONFIG` (if set), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SENSOR_QUEUE_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (if any), then apply environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let queue_file = file.queue.unwrap_or_default();
        let queue = QueueSettings {
            capacity: queue_file.capacity.unwrap_or(DEFAULT_FRAME_CAPACITY),
            mode: queue_file.mode.unwrap_or(OverflowMode::DropOldest),
            byte_capacity: queue_file.byte_capacity.unwrap_or(DEFAULT_BYTE_CAPACITY),
            dequeue_timeout: Timeout::from_millis(
                queue_file
                    .dequeue_timeout_ms
                    .unwrap_or(DEFAULT_DEQUEUE_TIMEOUT_MS),
            ),
        };

        let device_file = file.device.unwrap_or_default();
        let device = DeviceSettings {
            addr: device_file.addr.filter(|addr| !addr.trim().is_empty()),
            required_successes: device_file
                .required_successes
                .unwrap_or(DEFAULT_REQUIRED_SUCCESSES),
            probe_timeout_ms: device_file
                .probe_timeout_ms
                .unwrap_or(DEFAULT_PROBE_TIMEOUT_MS),
        };

        let defaults = DenoiseParams::default();
        let denoise_file = file.denoise.unwrap_or_default();
        let denoise = DenoiseParams {
            window: denoise_file.window.unwrap_or(defaults.window),
            sigma_spatial: denoise_file.sigma_spatial.unwrap_or(defaults.sigma_spatial),
            sigma_range: denoise_file.sigma_range.unwrap_or(defaults.sigma_range),
        };

        let defaults = SourceConfig::default();
        let source_file = file.source.unwrap_or_default();
        let source = SourceConfig {
            width: source_file.width.unwrap_or(defaults.width),
            height: source_file.height.unwrap_or(defaults.height),
            target_fps: source_file.target_fps.unwrap_or(defaults.target_fps),
            noise: source_file.noise.unwrap_or(defaults.noise),
            dropout: source_file.dropout.unwrap_or(defaults.dropout),
        };

        Self {
            queue,
            device,
            denoise,
            source,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(capacity) = std::env::var("SENSOR_QUEUE_CAPACITY") {
            self.queue.capacity = capacity
                .trim()
                .parse()
                .map_err(|_| anyhow!("SENSOR_QUEUE_CAPACITY must be a positive integer"))?;
        }
        if let Ok(mode) = std::env::var("SENSOR_QUEUE_MODE") {
            if !mode.trim().is_empty() {
                self.queue.mode = mode
                    .parse()
                    .map_err(|_| anyhow!("SENSOR_QUEUE_MODE must be avoid_drop or drop_oldest"))?;
            }
        }
        if let Ok(capacity) = std::env::var("SENSOR_QUEUE_BYTE_CAPACITY") {
            self.queue.byte_capacity = capacity
                .trim()
                .parse()
                .map_err(|_| anyhow!("SENSOR_QUEUE_BYTE_CAPACITY must be a positive integer"))?;
        }
        if let Ok(timeout) = std::env::var("SENSOR_QUEUE_DEQUEUE_TIMEOUT_MS") {
            let ms: u32 = timeout.trim().parse().map_err(|_| {
                anyhow!("SENSOR_QUEUE_DEQUEUE_TIMEOUT_MS must be an integer number of milliseconds")
            })?;
            self.queue.dequeue_timeout = Timeout::from_millis(ms);
        }
        if let Ok(addr) = std::env::var("SENSOR_QUEUE_DEVICE_ADDR") {
            if !addr.trim().is_empty() {
                self.device.addr = Some(addr.trim().to_string());
            }
        }
        if let Ok(window) = std::env::var("SENSOR_QUEUE_DENOISE_WINDOW") {
            self.denoise.window = window
                .trim()
                .parse()
                .map_err(|_| anyhow!("SENSOR_QUEUE_DENOISE_WINDOW must be an odd integer >= 3"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.queue.capacity == 0 {
            return Err(anyhow!("queue capacity must be greater than zero"));
        }
        if self.queue.byte_capacity == 0 {
            return Err(anyhow!("byte queue capacity must be greater than zero"));
        }
        self.denoise
            .validate()
            .map_err(|_| anyhow!("denoise window must be odd and >= 3 with positive sigmas"))?;
        if self.device.required_successes == 0
            || self.device.required_successes > crate::probe::MAX_REQUIRED_SUCCESSES
        {
            return Err(anyhow!(
                "device required_successes must be between 1 and {}",
                crate::probe::MAX_REQUIRED_SUCCESSES
            ));
        }
        if let Some(addr) = &self.device.addr {
            if !crate::probe::is_valid_address(addr) {
                return Err(anyhow!("device address {:?} is not a host name or IP", addr));
            }
        }
        if self.source.width == 0 || self.source.height == 0 || self.source.target_fps == 0 {
            return Err(anyhow!("source dimensions and fps must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
