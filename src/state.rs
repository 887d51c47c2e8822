//! 应用状态管理
//!
//! 定义在请求处理器之间共享的状态。

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::llm::{CompletionBackend, LlmClient};
use crate::services::doc_generator::DocSynthesizer;
use crate::services::{AnalysisOrchestrator, ResultStore};

/// 应用共享状态
///
/// 使用 Arc 包裹以便在多个处理器之间安全共享
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<ResultStore>,
    pub orchestrator: Arc<AnalysisOrchestrator>,
}

impl AppState {
    /// 根据配置构建状态；未配置 API 密钥时只做结构分析
    pub fn from_config(config: AppConfig) -> Result<Self, AppError> {
        let synthesizer = if config.api_key.trim().is_empty() {
            warn!("No API key configured, documentation synthesis is disabled");
            None
        } else {
            let client = LlmClient::new(
                config.api_key.clone(),
                &config.base_url,
                config.model.clone(),
                config.request_timeout(),
            )
            .map_err(|e| AppError::Config(e.to_string()))?;
            info!("Documentation synthesis enabled with model {}", config.model);
            Some(Arc::new(client) as Arc<dyn CompletionBackend>)
        };

        Ok(Self::with_backend(config, synthesizer))
    }

    /// 使用指定的推理后端（测试中注入脚本化实现）
    pub fn with_backend(config: AppConfig, backend: Option<Arc<dyn CompletionBackend>>) -> Self {
        let store = Arc::new(ResultStore::new(config.result_ttl(), config.max_stored_results));
        let synthesizer =
            backend.map(|backend| Arc::new(DocSynthesizer::from_config(backend, &config)));
        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            &config,
            Arc::clone(&store),
            synthesizer,
        ));

        Self {
            config,
            store,
            orchestrator,
        }
    }
}

/// 创建可共享的应用状态
pub fn create_shared_state(config: AppConfig) -> Result<Arc<AppState>, AppError> {
    AppState::from_config(config).map(Arc::new)
}
