//! 认证服务主入口

use auth_server::{
    config::{AppConfig, SessionBackend},
    db,
    handlers::health,
    middleware::AppState,
    repository::{CredentialStore, PgUserRepository},
    routes, seed,
    session::{InMemorySessionStore, RedisSessionStore, SessionStore},
    telemetry,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("auth-server {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("未知参数: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // 加载 .env 文件（开发环境），生产环境直接设置环境变量
    dotenv::from_filename(".env.local").ok();
    dotenv::dotenv().ok();

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志与指标
    telemetry::init_telemetry(&config.logging);
    telemetry::init_metrics();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Auth server starting...");

    // 3. 数据库连接池 + 迁移
    let db_pool = db::create_pool(&config.database).await?;
    db::run_migrations(&db_pool).await?;
    let credentials: Arc<dyn CredentialStore> = Arc::new(
        PgUserRepository::new(db_pool)
            .with_query_timeout(Duration::from_secs(config.database.query_timeout_secs)),
    );

    tracing::info!("Database initialized");

    // 4. 会话存储
    let sessions = open_session_store(&config).await?;

    // 5. 构建应用状态
    let app_state = Arc::new(AppState::build(config.clone(), credentials, sessions)?);

    if config.seed.enabled {
        let hasher = auth_server::auth::PasswordHasher::from_config(&config.security)?;
        let created = seed::seed_default_users(app_state.credentials.as_ref(), &hasher).await?;
        tracing::info!(created, "Default users seeded");
    }

    // 6. 构建路由
    let app = routes::create_router(app_state);

    // 7. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 8. 优雅关闭
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 按配置选择会话存储后端
async fn open_session_store(config: &AppConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    let session = &config.session;

    let store: Arc<dyn SessionStore> = match session.backend {
        SessionBackend::Redis => Arc::new(
            RedisSessionStore::connect(
                session.redis_url.expose_secret(),
                &session.key_prefix,
                Duration::from_millis(session.op_timeout_ms),
            )
            .await?,
        ),
        SessionBackend::Memory => {
            tracing::warn!("Using in-memory session store; sessions are lost on restart");
            let store = InMemorySessionStore::new();
            spawn_session_sweeper(store.clone(), Duration::from_secs(session.sweep_interval_secs.max(1)));
            Arc::new(store)
        }
    };

    tracing::info!(backend = store.backend_name(), "Session store initialized");
    Ok(store)
}

/// 定期清理过期会话
fn spawn_session_sweeper(store: InMemorySessionStore, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            store.purge_expired();
        }
    });
}

/// 优雅关闭信号处理
///
/// 收到信号后开始排空连接；超过超时时间仍未结束则强制退出。
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
        tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        std::process::exit(1);
    });
}

/// 打印帮助信息
fn print_help() {
    println!("auth-server {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: auth-server [选项]");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 AUTH_ 前缀的环境变量完成，例如:");
    println!("  AUTH_DATABASE__URL, AUTH_SECURITY__JWT_SECRET, AUTH_SESSION__BACKEND");
}
