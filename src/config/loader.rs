//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, ModelBackend};
use crate::domain::voice::VoiceId;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `VOXGATE_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `VOXGATE_AUTH__API_KEY=change-me`
/// - `VOXGATE_SERVER__PORT=8080`
/// - `VOXGATE_MODEL__URL=http://inference:8000`
/// - `VOXGATE_ZMQ__BIND_ADDRESS=tcp://0.0.0.0:20501`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("server.enabled", true)?
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 20480)?
        .set_default("zmq.enabled", true)?
        .set_default("zmq.bind_address", "tcp://127.0.0.1:20501")?
        .set_default("auth.api_key", "")?
        .set_default("model.backend", "http")?
        .set_default("model.url", "http://localhost:8000")?
        .set_default("model.timeout_secs", 120)?
        .set_default("model.default_sample_rate", 24000)?
        .set_default("model.inactivity_timeout_secs", 600)?
        .set_default("model.keep_warm", false)?
        .set_default("model.watchdog_interval_secs", 60)?
        .set_default("model.max_concurrent_synthesis", 1)?
        .set_default("model.preload", true)?
        .set_default("cache.prompt_ttl_secs", 3600)?
        .set_default("vorbis.ffmpeg_path", "ffmpeg")?
        .set_default("vorbis.quality", 0.4)?
        .set_default("vorbis.timeout_secs", 30)?
        .set_default("storage.data_dir", "data")?
        .set_default("storage.voices_dir", "data/voices")?
        .set_default("storage.max_upload_size", 10 * 1024 * 1024)?
        .set_default("database.path", "data/voices.db")?
        .set_default("database.max_connections", 5)?
        .set_default("bare_text.enabled", false)?
        .set_default("bare_text.voice_id", "solar")?
        .set_default("bare_text.audio_format", "pcm")?
        .set_default("bare_text.params.speed", 1.0)?
        .set_default("bare_text.params.exaggeration", 0.15)?
        .set_default("bare_text.params.cfg_weight", 1.0)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级），例如 VOXGATE_MODEL__URL
    builder = builder.add_source(
        Environment::with_prefix("VOXGATE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.enabled && config.server.port == 0 {
        return Err(invalid("Server port cannot be 0"));
    }

    if config.auth.api_key.trim().is_empty() {
        return Err(invalid(
            "API key cannot be empty (set auth.api_key or VOXGATE_AUTH__API_KEY)",
        ));
    }

    if !config.server.enabled && !config.zmq.enabled {
        return Err(invalid("At least one of server or zmq must be enabled"));
    }

    if config.zmq.enabled && config.zmq.bind_address.trim().is_empty() {
        return Err(invalid("ZMQ bind address cannot be empty"));
    }

    if config.model.backend == ModelBackend::Http && config.model.url.trim().is_empty() {
        return Err(invalid("Model URL cannot be empty when backend is http"));
    }

    if !config.model.keep_warm && config.model.inactivity_timeout_secs == 0 {
        return Err(invalid(
            "Inactivity timeout must be positive unless keep_warm is set",
        ));
    }

    if config.model.watchdog_interval_secs == 0 {
        return Err(invalid("Watchdog interval cannot be 0"));
    }

    if config.model.max_concurrent_synthesis == 0 {
        return Err(invalid("max_concurrent_synthesis must be at least 1"));
    }

    if !(0.0..=1.0).contains(&config.vorbis.quality) {
        return Err(invalid("Vorbis quality must be within [0, 1]"));
    }

    if config.database.path.is_empty() {
        return Err(invalid("Database path cannot be empty"));
    }

    if config.bare_text.enabled {
        VoiceId::parse(&config.bare_text.voice_id).map_err(|e| {
            ConfigError::ValidationError(format!("Invalid bare_text.voice_id: {}", e))
        })?;
        config
            .bare_text
            .params
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("Invalid bare_text.params: {}", e)))?;
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志），不输出 API key
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    if config.server.enabled {
        tracing::info!("HTTP Server: {}", config.server.addr());
    } else {
        tracing::info!("HTTP Server: disabled");
    }
    if config.zmq.enabled {
        tracing::info!("ZMQ ROUTER: {}", config.zmq.bind_address);
        if let Some(pub_address) = &config.zmq.pub_address {
            tracing::info!("ZMQ PUB: {}", pub_address);
        }
    } else {
        tracing::info!("ZMQ ROUTER: disabled");
    }
    tracing::info!("Model Backend: {}", config.model.backend.as_str());
    if config.model.backend == ModelBackend::Http {
        tracing::info!("Model URL: {}", config.model.url);
        tracing::info!("Model Timeout: {}s", config.model.timeout_secs);
    }
    if config.model.keep_warm {
        tracing::info!("Model Keep Warm: true");
    } else {
        tracing::info!(
            "Model Inactivity Timeout: {}s",
            config.model.inactivity_timeout_secs
        );
    }
    tracing::info!(
        "Max Concurrent Synthesis: {}",
        config.model.max_concurrent_synthesis
    );
    tracing::info!("Prompt Cache TTL: {}s", config.cache.prompt_ttl_secs);
    tracing::info!("Vorbis: {} (q={})", config.vorbis.ffmpeg_path, config.vorbis.quality);
    tracing::info!("Voices Directory: {:?}", config.storage.voices_dir);
    tracing::info!("Database: {}", config.database.path);
    if config.bare_text.enabled {
        tracing::info!(
            "Bare Text: voice={} format={}",
            config.bare_text.voice_id,
            config.bare_text.audio_format
        );
    }
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
