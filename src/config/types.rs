//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::synthesis::{AudioFormat, GenerationParams};

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// HTTP 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// ZMQ 服务器配置
    #[serde(default)]
    pub zmq: ZmqConfig,

    /// 认证配置
    #[serde(default)]
    pub auth: AuthConfig,

    /// 模型后端与生命周期配置
    #[serde(default)]
    pub model: ModelConfig,

    /// Prompt 缓存配置
    #[serde(default)]
    pub cache: CacheConfig,

    /// Vorbis 编码配置
    #[serde(default)]
    pub vorbis: VorbisConfig,

    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,

    /// 裸文本请求默认参数
    #[serde(default)]
    pub bare_text: BareTextConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

// ============================================================================
// Server
// ============================================================================

/// HTTP 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 是否启动 HTTP/WebSocket 前端
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    20480
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// ZMQ 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ZmqConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// ROUTER 绑定地址
    #[serde(default = "default_zmq_bind")]
    pub bind_address: String,

    /// 可选 PUB 广播地址
    #[serde(default)]
    pub pub_address: Option<String>,
}

fn default_zmq_bind() -> String {
    "tcp://127.0.0.1:20501".to_string()
}

impl Default for ZmqConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_zmq_bind(),
            pub_address: None,
        }
    }
}

/// 认证配置
#[derive(Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// 共享 API key，不能为空
    #[serde(default)]
    pub api_key: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Model
// ============================================================================

/// 模型后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    #[default]
    Http,
    Fake,
}

impl ModelBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelBackend::Http => "http",
            ModelBackend::Fake => "fake",
        }
    }
}

/// 模型配置
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub backend: ModelBackend,

    /// 推理后端基础 URL（backend = http）
    #[serde(default = "default_model_url")]
    pub url: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,

    /// 后端未报告时使用的采样率
    #[serde(default = "default_sample_rate")]
    pub default_sample_rate: u32,

    /// 空闲多久后卸载（秒）
    #[serde(default = "default_inactivity_timeout")]
    pub inactivity_timeout_secs: u64,

    /// 常驻，不做空闲卸载
    #[serde(default)]
    pub keep_warm: bool,

    /// 看门狗检查间隔（秒）
    #[serde(default = "default_watchdog_interval")]
    pub watchdog_interval_secs: u64,

    /// 同时进行的合成数
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_synthesis: usize,

    /// 启动时预加载
    #[serde(default = "default_true")]
    pub preload: bool,
}

fn default_model_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_model_timeout() -> u64 {
    120
}

fn default_sample_rate() -> u32 {
    24000
}

fn default_inactivity_timeout() -> u64 {
    600
}

fn default_watchdog_interval() -> u64 {
    60
}

fn default_max_concurrent() -> usize {
    1
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackend::default(),
            url: default_model_url(),
            timeout_secs: default_model_timeout(),
            default_sample_rate: default_sample_rate(),
            inactivity_timeout_secs: default_inactivity_timeout(),
            keep_warm: false,
            watchdog_interval_secs: default_watchdog_interval(),
            max_concurrent_synthesis: default_max_concurrent(),
            preload: true,
        }
    }
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs)
    }
}

/// Prompt 缓存配置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_prompt_ttl")]
    pub prompt_ttl_secs: u64,
}

fn default_prompt_ttl() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prompt_ttl_secs: default_prompt_ttl(),
        }
    }
}

impl CacheConfig {
    pub fn prompt_ttl(&self) -> Duration {
        Duration::from_secs(self.prompt_ttl_secs)
    }
}

/// Vorbis 编码配置
#[derive(Debug, Clone, Deserialize)]
pub struct VorbisConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// 质量 [0, 1]
    #[serde(default = "default_vorbis_quality")]
    pub quality: f32,

    #[serde(default = "default_vorbis_timeout")]
    pub timeout_secs: u64,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_vorbis_quality() -> f32 {
    0.4
}

fn default_vorbis_timeout() -> u64 {
    30
}

impl Default for VorbisConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            quality: default_vorbis_quality(),
            timeout_secs: default_vorbis_timeout(),
        }
    }
}

// ============================================================================
// Storage
// ============================================================================

/// 存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 数据根目录
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// 音色参考音频存储目录
    #[serde(default = "default_voices_dir")]
    pub voices_dir: PathBuf,

    /// 上传文件最大大小（字节），默认 10MB
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_voices_dir() -> PathBuf {
    PathBuf::from("data/voices")
}

fn default_max_upload_size() -> u64 {
    10 * 1024 * 1024 // 10 MB
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            voices_dir: default_voices_dir(),
            max_upload_size: default_max_upload_size(),
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/voices.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// ============================================================================
// Bare text / Log
// ============================================================================

/// 裸文本（非 JSON）请求的默认参数
///
/// 裸文本不携带 api_key，启用后 ZMQ 上的非 JSON 消息免认证合成，默认关闭。
#[derive(Debug, Clone, Deserialize)]
pub struct BareTextConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_bare_voice")]
    pub voice_id: String,

    #[serde(default)]
    pub audio_format: AudioFormat,

    #[serde(default = "default_bare_params")]
    pub params: GenerationParams,
}

fn default_bare_voice() -> String {
    "solar".to_string()
}

fn default_bare_params() -> GenerationParams {
    let mut params = GenerationParams::default();
    params
        .extra
        .insert("exaggeration".to_string(), serde_json::json!(0.15));
    params
        .extra
        .insert("cfg_weight".to_string(), serde_json::json!(1.0));
    params
}

impl Default for BareTextConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            voice_id: default_bare_voice(),
            audio_format: AudioFormat::Pcm,
            params: default_bare_params(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.addr(), "0.0.0.0:20480");
        assert_eq!(config.zmq.bind_address, "tcp://127.0.0.1:20501");
        assert_eq!(config.model.backend, ModelBackend::Http);
        assert_eq!(config.model.max_concurrent_synthesis, 1);
        assert_eq!(config.database.path, "data/voices.db");
        assert!(!config.bare_text.enabled);
        assert_eq!(config.bare_text.audio_format, AudioFormat::Pcm);
        assert_eq!(config.bare_text.params.get_f64("exaggeration"), Some(0.15));
    }

    #[test]
    fn test_api_key_is_redacted_in_debug() {
        let auth = AuthConfig {
            api_key: "super-secret".to_string(),
        };
        let printed = format!("{:?}", auth);
        assert!(!printed.contains("super-secret"));
    }
}
