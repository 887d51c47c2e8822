//! 分析 API 端点
//!
//! 提交分析、轮询状态、获取结果。

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{AppError, ErrorKind};
use crate::models::analysis::{AnalysisRequest, AnalysisResult, AnalysisStatus};
use crate::models::api::{AnalysisDetail, AnalysisReport, AnalyzeResponse, ServiceInfo, StatusResponse};
use crate::services::{StoreError, SubmitError};
use crate::state::AppState;

/// 创建分析路由
pub fn analysis_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(service_info))
        .route("/analyze", post(analyze))
        .route("/analysis/:id", get(get_analysis))
        .route("/analysis/:id/status", get(get_status))
        .route("/analysis/:id/result", get(get_result))
}

async fn service_info() -> Json<ServiceInfo> {
    let endpoints = BTreeMap::from([
        ("analyze", "POST /analyze"),
        ("status", "GET /analysis/{id}/status"),
        ("result", "GET /analysis/{id}/result"),
        ("detail", "GET /analysis/{id}"),
        ("health", "GET /api/health"),
    ]);

    Json(ServiceInfo {
        name: "Codebase Documentation Generator",
        version: env!("CARGO_PKG_VERSION"),
        endpoints,
    })
}

/// 受理分析请求，立即返回 id
async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalysisRequest>,
) -> Result<(StatusCode, Json<AnalyzeResponse>), AppError> {
    info!("Received analysis request: source={}", req.source);

    let handle = state.orchestrator.submit(req).map_err(|e| match e {
        SubmitError::Invalid(msg) => AppError::BadRequest(msg),
        SubmitError::Store(StoreError::Full(n)) => {
            warn!("Rejecting analysis request, {} analyses in flight", n);
            AppError::Busy(format!("too many analyses in progress ({})", n))
        }
        SubmitError::Store(other) => AppError::Internal(other.to_string()),
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(AnalyzeResponse {
            analysis_id: handle.id,
            status: AnalysisStatus::Pending,
            message: "Analysis started".to_string(),
        }),
    ))
}

fn lookup(state: &AppState, id: &str) -> Result<AnalysisResult, AppError> {
    state
        .store
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Analysis not found: {}", id)))
}

/// 当前状态与进度
async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    let result = lookup(&state, &id)?;
    debug!("Status of {}: {:?} {}%", id, result.status, result.progress);
    Ok(Json(StatusResponse::from(&result)))
}

/// 完整结果，仅在 completed 后可用
async fn get_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisReport>, AppError> {
    let result = lookup(&state, &id)?;

    match result.status {
        AnalysisStatus::Completed => Ok(Json(AnalysisReport::from(result))),
        AnalysisStatus::Failed => {
            let (kind, message) = match result.error {
                Some(detail) => (detail.kind, detail.message),
                None => (ErrorKind::InternalFault, "analysis failed".to_string()),
            };
            Err(AppError::AnalysisFailed { kind, message })
        }
        AnalysisStatus::Pending | AnalysisStatus::Running => Err(AppError::NotReady(format!(
            "analysis {} not finished: {} ({}%)",
            id, result.message, result.progress
        ))),
    }
}

/// 状态 + 尽力而为的结果，或终止错误
async fn get_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisDetail>, AppError> {
    let result = lookup(&state, &id)?;
    Ok(Json(AnalysisDetail::from(result)))
}
