//! 统一错误处理模块
//!
//! 定义分析流水线的错误分类，以及 HTTP 层的应用错误类型（实现 axum 的 IntoResponse）。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// 错误 / 警告种类
///
/// 同时用于终止错误（`failed` 状态）和附加在结果上的警告。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// 路径越出允许的根目录或符号链接攻击
    SecurityRejection,
    /// 远程仓库克隆失败
    CloneFailure,
    /// 源定位符不可用（路径不存在、主机不在白名单等）
    InvalidSource,
    /// 单个文件解析失败（非致命）
    ParseWarning,
    /// 文件数超过上限被截断（非致命）
    TruncatedInput,
    /// 推理 API 鉴权失败（不重试）
    InferenceAuthError,
    /// 推理账户额度耗尽（不重试）
    InferenceQuotaError,
    /// 推理 API 暂时性错误（重试耗尽）
    InferenceTransientError,
    /// 推理 API 拒绝了请求本身（非鉴权的 4xx，不重试）
    InferenceRequestError,
    /// 推理 API 返回空内容或无法解析
    EmptyInferenceResponse,
    /// 单个请求超过墙钟时间上限
    Timeout,
    /// 内部错误
    InternalFault,
}

impl ErrorKind {
    /// 是否为终止整个请求的致命错误
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorKind::SecurityRejection
                | ErrorKind::CloneFailure
                | ErrorKind::InvalidSource
                | ErrorKind::Timeout
                | ErrorKind::InternalFault
        )
    }
}

/// 分析流水线错误
#[derive(Error, Debug, Clone)]
pub enum AnalysisError {
    #[error("security rejection: {0}")]
    SecurityRejection(String),

    #[error("clone failed: {0}")]
    CloneFailure(String),

    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("inference authentication failed: {0}")]
    InferenceAuth(String),

    #[error("inference quota exhausted: {0}")]
    InferenceQuota(String),

    #[error("inference failed after retries: {0}")]
    InferenceTransient(String),

    #[error("inference request rejected: {0}")]
    InferenceRequest(String),

    #[error("inference returned no usable content: {0}")]
    InferenceMalformed(String),

    #[error("analysis exceeded wall-clock limit of {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("internal fault: {0}")]
    Internal(String),
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::SecurityRejection(_) => ErrorKind::SecurityRejection,
            AnalysisError::CloneFailure(_) => ErrorKind::CloneFailure,
            AnalysisError::InvalidSource(_) => ErrorKind::InvalidSource,
            AnalysisError::InferenceAuth(_) => ErrorKind::InferenceAuthError,
            AnalysisError::InferenceQuota(_) => ErrorKind::InferenceQuotaError,
            AnalysisError::InferenceTransient(_) => ErrorKind::InferenceTransientError,
            AnalysisError::InferenceRequest(_) => ErrorKind::InferenceRequestError,
            AnalysisError::InferenceMalformed(_) => ErrorKind::EmptyInferenceResponse,
            AnalysisError::Timeout(_) => ErrorKind::Timeout,
            AnalysisError::Internal(_) => ErrorKind::InternalFault,
        }
    }
}

/// 应用错误枚举（HTTP 层）
#[derive(Error, Debug)]
pub enum AppError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 请求参数错误
    #[error("请求错误: {0}")]
    BadRequest(String),

    /// 资源未找到
    #[error("未找到: {0}")]
    NotFound(String),

    /// 分析仍在进行中
    #[error("分析进行中: {0}")]
    NotReady(String),

    /// 结果存储已满
    #[error("服务繁忙: {0}")]
    Busy(String),

    /// 分析以失败告终
    #[error("分析失败: {message}")]
    AnalysisFailed { kind: ErrorKind, message: String },

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, error_message) = match &self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, None, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, None, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, None, msg.clone()),
            AppError::NotReady(msg) => (StatusCode::ACCEPTED, None, msg.clone()),
            AppError::Busy(msg) => (StatusCode::SERVICE_UNAVAILABLE, None, msg.clone()),
            AppError::AnalysisFailed { kind, message } => {
                (StatusCode::INTERNAL_SERVER_ERROR, Some(*kind), message.clone())
            }
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Some(ErrorKind::InternalFault),
                msg.clone(),
            ),
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

/// 便捷类型别名
pub type AppResult<T> = Result<T, AppError>;
