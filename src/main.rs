//! Codebase Documentation Generator - Rust Backend
//!
//! 使用 axum 框架构建的后端服务，提供代码仓库分析和文档生成功能。

use anyhow::Context;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use codedoc_rs::api::create_api_routes;
use codedoc_rs::config::load_config;
use codedoc_rs::state::create_shared_state;

/// 过期结果的清理周期
const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

/// 在 Windows 上设置控制台代码页为 UTF-8
#[cfg(windows)]
fn setup_console_encoding() {
    unsafe {
        // 设置控制台输出代码页为 UTF-8 (65001)
        extern "system" {
            fn SetConsoleOutputCP(code_page: u32) -> i32;
            fn SetConsoleCP(code_page: u32) -> i32;
        }
        SetConsoleOutputCP(65001);
        SetConsoleCP(65001);
    }
}

#[cfg(not(windows))]
fn setup_console_encoding() {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_console_encoding();

    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codedoc_rs=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Codebase Documentation Generator...");

    let config = load_config();
    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.bind_addr))?;

    // 创建共享状态
    let state = create_shared_state(config)?;

    // 定期清理过期结果
    let store = Arc::clone(&state.store);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(EVICTION_INTERVAL);
        loop {
            ticker.tick().await;
            store.evict_expired();
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // 构建路由
    let app = Router::new()
        .merge(create_api_routes(Arc::clone(&state)))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    info!("Server listening on: {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
