//! REST API 请求/响应模型

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::analysis::{AnalysisResult, AnalysisStatus, AnalysisWarning, ErrorDetail};
use crate::services::code_analyzer::{DeclarationKind, Language, ProjectSummary};

/// 提交分析的响应
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub analysis_id: String,
    pub status: AnalysisStatus,
    pub message: String,
}

/// 状态查询响应
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub analysis_id: String,
    pub status: AnalysisStatus,
    pub progress: u8,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub warning_count: usize,
}

impl From<&AnalysisResult> for StatusResponse {
    fn from(result: &AnalysisResult) -> Self {
        Self {
            analysis_id: result.id.clone(),
            status: result.status,
            progress: result.progress,
            message: result.message.clone(),
            started_at: result.started_at,
            completed_at: result.completed_at,
            warning_count: result.warnings.len(),
        }
    }
}

/// 完整分析结果（仅 completed 时返回）
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub analysis_id: String,
    pub project_overview: Option<String>,
    pub file_structure: Option<ProjectSummary>,
    pub file_documentation: BTreeMap<String, String>,
    pub sequence_diagram: Option<String>,
    pub class_diagram: Option<String>,
    pub technologies_used: Vec<Language>,
    pub total_files: usize,
    pub total_lines: usize,
    pub total_classes: usize,
    pub total_functions: usize,
    pub warnings: Vec<AnalysisWarning>,
}

impl From<AnalysisResult> for AnalysisReport {
    fn from(result: AnalysisResult) -> Self {
        let (technologies_used, total_files, total_lines, total_classes, total_functions) =
            match &result.summary {
                Some(summary) => (
                    summary.technologies(),
                    summary.total_files,
                    summary.total_lines,
                    summary.count_of(DeclarationKind::Class),
                    summary.count_of(DeclarationKind::Function),
                ),
                None => (Vec::new(), 0, 0, 0, 0),
            };

        Self {
            analysis_id: result.id,
            project_overview: result.overview,
            file_structure: result.summary,
            file_documentation: result.file_docs,
            sequence_diagram: result.sequence_diagram,
            class_diagram: result.class_diagram,
            technologies_used,
            total_files,
            total_lines,
            total_classes,
            total_functions,
            warnings: result.warnings,
        }
    }
}

/// 合并视图：状态 + 尽力而为的结果，失败时只有终止错误
#[derive(Debug, Serialize)]
pub struct AnalysisDetail {
    #[serde(flatten)]
    pub status: StatusResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl From<AnalysisResult> for AnalysisDetail {
    fn from(result: AnalysisResult) -> Self {
        let status = StatusResponse::from(&result);
        match result.status {
            AnalysisStatus::Failed => Self {
                status,
                result: None,
                error: result.error,
            },
            _ => Self {
                status,
                result: Some(AnalysisReport::from(result)),
                error: None,
            },
        }
    }
}

/// 服务信息
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub endpoints: BTreeMap<&'static str, &'static str>,
}
