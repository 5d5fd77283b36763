use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use menu_orders::{
    AppState, MIGRATOR,
    config::Config,
    middleware::{RateLimiter, rate_limit},
    routes::{
        self,
        user::{NewUser, User},
    },
};
use sqlx::Executor;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 菜单与订单服务
#[derive(Parser)]
#[command(name = "menu_orders")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// 启动 HTTP 服务（默认）
    Serve {
        /// 覆盖 SERVER_HOST
        #[arg(long)]
        host: Option<String>,

        /// 覆盖 SERVER_PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// 执行数据库迁移
    Migrate,
    /// 创建超级用户
    CreateSuperuser {
        #[arg(long)]
        username: String,

        #[arg(long)]
        email: String,

        /// 不提供时创建不可用密码的账号
        #[arg(long, env = "SUPERUSER_PASSWORD")]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // 加载配置
    let config = Config::from_env().context("Failed to load configuration")?;
    let pool = connect(&config).await?;

    match cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    }) {
        Commands::Serve { host, port } => serve(config, pool, host, port).await,
        Commands::Migrate => {
            MIGRATOR.run(&pool).await.context("Failed to run migrations")?;
            tracing::info!("Migrations applied");
            Ok(())
        }
        Commands::CreateSuperuser {
            username,
            email,
            password,
        } => {
            let user =
                User::create_superuser(&pool, NewUser::new(username, Some(email), password))
                    .await
                    .context("Failed to create superuser")?;
            tracing::info!("Superuser created: {} (id {})", user, user.id);
            Ok(())
        }
    }
}

async fn connect(config: &Config) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'menu_orders';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .context("Failed to connect to Postgres")
}

async fn serve(
    config: Config,
    pool: PgPool,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    MIGRATOR.run(&pool).await.context("Failed to run migrations")?;

    let redis = Arc::new(
        redis::Client::open(config.redis_url.clone()).context("Failed to create Redis client")?,
    );

    let state = AppState {
        pool,
        config: config.clone(),
        redis: redis.clone(),
    };

    let rate_limiter = Arc::new(RateLimiter::new(redis, config.clone()));

    let router = routes::router(state).layer(axum::middleware::from_fn_with_state(
        rate_limiter,
        rate_limit,
    ));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    let host = host.unwrap_or(config.server_host);
    let addr = SocketAddr::new(
        host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host {}, falling back to dual-stack default", host);
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        port.unwrap_or(config.server_port),
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
