//! Voxgate - 流式 TTS 网关
//!
//! 启动顺序：配置 → 日志 → 数据目录 / 数据库 → 适配器 → 预加载 → 看门狗 → HTTP + ZMQ

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use voxgate::application::ports::{
    AudioTranscoderPort, ModelLoader, ModelManagerPort, PromptCachePort, VoiceRepositoryPort,
    VoiceStorePort,
};
use voxgate::application::{
    ApiKeyAuthenticator, BareTextDefaults, DeleteVoiceHandler, EncoderFactory, GatewayServices,
    HealthHandler, ListVoicesHandler, ReadinessHandler, RenameVoiceHandler, RequestRouter,
    SynthesisOrchestrator, UnloadModelHandler, UploadVoiceHandler,
};
use voxgate::config::{load_config, print_config, AppConfig, ModelBackend};
use voxgate::infrastructure::adapters::{
    FakeModelConfig, FakeModelLoader, FfmpegTranscoder, FfmpegTranscoderConfig, HttpModelConfig,
    HttpModelLoader, LocalVoiceStore,
};
use voxgate::infrastructure::http::{AppState, HttpServer, ServerConfig};
use voxgate::infrastructure::memory::{
    InMemoryPromptCache, ModelLifecycleManager, ModelManagerConfig,
};
use voxgate::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteVoiceRepository,
};
use voxgate::infrastructure::worker::{IdleWatchdog, IdleWatchdogConfig};
use voxgate::infrastructure::zmq::{ZmqServer, ZmqServerConfig};

fn init_tracing(config: &AppConfig) {
    let log_filter = format!(
        "{},voxgate={},tower_http=debug",
        config.log.level, config.log.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_model_loader(config: &AppConfig) -> anyhow::Result<Arc<dyn ModelLoader>> {
    let loader: Arc<dyn ModelLoader> = match config.model.backend {
        ModelBackend::Http => Arc::new(
            HttpModelLoader::new(HttpModelConfig {
                base_url: config.model.url.clone(),
                timeout: config.model.timeout(),
                default_sample_rate: config.model.default_sample_rate,
            })
            .context("Failed to create HTTP model backend")?,
        ),
        ModelBackend::Fake => Arc::new(FakeModelLoader::new(FakeModelConfig {
            sample_rate: config.model.default_sample_rate,
            ..FakeModelConfig::default()
        })),
    };
    Ok(loader)
}

fn bare_text_defaults(config: &AppConfig) -> Option<BareTextDefaults> {
    config.bare_text.enabled.then(|| BareTextDefaults {
        voice_id: config.bare_text.voice_id.clone(),
        audio_format: config.bare_text.audio_format,
        params: config.bare_text.params.clone(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().context("Failed to load config")?;

    init_tracing(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Voxgate - streaming TTS gateway");
    print_config(&config);

    // 确保数据目录存在
    tokio::fs::create_dir_all(&config.storage.data_dir).await?;
    tokio::fs::create_dir_all(&config.storage.voices_dir).await?;
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // 初始化数据库
    let db_config = DatabaseConfig::new(&config.database.path)
        .with_max_connections(config.database.max_connections);
    let pool = create_pool(&db_config).await?;
    run_migrations(&pool).await?;

    // 适配器
    let voice_repo: Arc<dyn VoiceRepositoryPort> = Arc::new(SqliteVoiceRepository::new(pool));
    let voice_store: Arc<dyn VoiceStorePort> =
        Arc::new(LocalVoiceStore::new(&config.storage.voices_dir, voice_repo).await?);
    let prompt_cache: Arc<dyn PromptCachePort> =
        Arc::new(InMemoryPromptCache::new(config.cache.prompt_ttl()));
    let model_manager: Arc<dyn ModelManagerPort> = Arc::new(ModelLifecycleManager::new(
        ModelManagerConfig {
            inactivity_timeout: config.model.inactivity_timeout(),
            keep_warm: config.model.keep_warm,
        },
        build_model_loader(&config)?,
        prompt_cache.clone(),
    ));
    let transcoder: Arc<dyn AudioTranscoderPort> =
        Arc::new(FfmpegTranscoder::new(FfmpegTranscoderConfig {
            ffmpeg_path: config.vorbis.ffmpeg_path.clone(),
            timeout: std::time::Duration::from_secs(config.vorbis.timeout_secs),
        }));

    // 应用服务
    let orchestrator = Arc::new(SynthesisOrchestrator::new(
        voice_store.clone(),
        model_manager.clone(),
        prompt_cache.clone(),
        EncoderFactory::new(transcoder, config.vorbis.quality),
        config.model.max_concurrent_synthesis,
    ));
    let services = Arc::new(GatewayServices {
        auth: ApiKeyAuthenticator::new(config.auth.api_key.clone()),
        orchestrator,
        upload_voice: UploadVoiceHandler::new(voice_store.clone(), prompt_cache.clone()),
        delete_voice: DeleteVoiceHandler::new(voice_store.clone(), prompt_cache.clone()),
        rename_voice: RenameVoiceHandler::new(voice_store.clone(), prompt_cache),
        list_voices: ListVoicesHandler::new(voice_store.clone()),
        health: HealthHandler::new(model_manager.clone()),
        readiness: ReadinessHandler::new(model_manager.clone(), voice_store),
        unload_model: UnloadModelHandler::new(model_manager.clone()),
    });

    // 预加载模型；失败不阻止启动，首个请求会重试
    if config.model.preload {
        match model_manager.ensure_loaded().await {
            Ok(_lease) => tracing::info!("Model preloaded"),
            Err(e) => tracing::warn!(error = %e, "Model preload failed, will retry on demand"),
        }
    }

    let shutdown = CancellationToken::new();

    // 空闲看门狗
    let watchdog = IdleWatchdog::new(
        IdleWatchdogConfig {
            interval: config.model.watchdog_interval(),
            keep_warm: config.model.keep_warm,
        },
        model_manager.clone(),
    )
    .spawn(shutdown.clone());

    // 先绑定两个前端，任一失败立即退出
    let http = if config.server.enabled {
        let listener = TcpListener::bind(config.server.addr())
            .await
            .with_context(|| format!("Failed to bind HTTP server on {}", config.server.addr()))?;
        let server = HttpServer::new(
            ServerConfig::new(&config.server.host, config.server.port),
            AppState::new(services.clone(), config.storage.max_upload_size as usize),
        );
        Some((server, listener))
    } else {
        None
    };

    let zmq = if config.zmq.enabled {
        let router = Arc::new(RequestRouter::new(
            services.clone(),
            bare_text_defaults(&config),
        ));
        let server = ZmqServer::new(
            ZmqServerConfig {
                bind_address: config.zmq.bind_address.clone(),
                pub_address: config.zmq.pub_address.clone(),
            },
            router,
        )
        .bind()
        .await?;
        Some(server)
    } else {
        None
    };

    // Ctrl-C → 取消
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
        tracing::info!("Received shutdown signal");
        signal_token.cancel();
    });

    let http_task = async {
        let Some((server, listener)) = http else {
            return Ok(());
        };
        let result = server
            .serve(listener, shutdown.clone().cancelled_owned())
            .await;
        if result.is_err() {
            shutdown.cancel();
        }
        result
    };
    let zmq_task = async {
        if let Some(server) = zmq {
            server.serve(shutdown.clone()).await;
        }
    };

    let (http_result, ()) = tokio::join!(http_task, zmq_task);

    shutdown.cancel();
    if let Some(handle) = watchdog {
        let _ = handle.await;
    }

    match model_manager.offload().await {
        Ok(outcome) if outcome.was_loaded => tracing::info!("Model released"),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Failed to release model"),
    }

    http_result.context("HTTP server failed")?;
    tracing::info!("Server shutdown complete");

    Ok(())
}
