use crate::domain::generator::GeneratorState;
use crate::domain::window::DEFAULT_WINDOW_CAPACITY;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub server: ServerSettings,
    pub generator: GeneratorState,
    pub stream: StreamSettings,
    pub offload: OffloadSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StreamSettings {
    pub interval_ms: u64,
    pub initial_count: i64,
    pub window_capacity: usize,
    pub autostart: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            initial_count: 1000,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            autostart: true,
        }
    }
}

impl StreamSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OffloadSettings {
    /// Inputs at or below this many points always run inline.
    pub threshold: usize,
    pub timeout_ms: u64,
    pub worker_enabled: bool,
}

impl Default for OffloadSettings {
    fn default() -> Self {
        Self {
            threshold: 5000,
            timeout_ms: 10_000,
            worker_enabled: true,
        }
    }
}

impl OffloadSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RenderSettings {
    pub chart_width: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self { chart_width: 800 }
    }
}

/// `config/engine.toml` (optional) overridden by `ENGINE__SECTION__KEY` env vars.
pub fn load_engine_config() -> anyhow::Result<EngineConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/engine").required(false))
        .add_source(config::Environment::with_prefix("ENGINE").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(source: &str) -> EngineConfig {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.offload.threshold, 5000);
        assert_eq!(config.offload.timeout(), Duration::from_secs(10));
        assert_eq!(config.stream.window_capacity, 10_000);
        assert_eq!(config.generator.base_value, 100.0);
        assert_eq!(config.render.chart_width, 800);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = from_toml(
            r#"
            [offload]
            threshold = 10
            timeout_ms = 250

            [generator]
            trend = 0.5
            "#,
        );
        assert_eq!(config.offload.threshold, 10);
        assert_eq!(config.offload.timeout(), Duration::from_millis(250));
        assert!(config.offload.worker_enabled);
        assert_eq!(config.generator.trend, 0.5);
        assert_eq!(config.generator.noise_amplitude, 10.0);
        assert_eq!(config.stream.interval_ms, 100);
    }
}
