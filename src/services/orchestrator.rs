//! 分析编排器
//!
//! 每个请求在后台任务中依次执行：源校验 / 克隆 → 文件枚举 → 并发提取 → 汇总 → 文档合成。
//! 状态机 `pending → running → {completed, failed}`，只有本模块修改结果记录。

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::{AnalysisError, ErrorKind};
use crate::models::analysis::{AnalysisRequest, AnalysisResult, AnalysisStatus, AnalysisWarning};
use crate::services::code_analyzer::{CodeAnalyzer, ProjectSummary};
use crate::services::doc_generator::{ArtifactInput, ArtifactKind, DocSynthesizer};
use crate::services::repository::{RepositoryWalker, SourceLocator, WalkOutcome};
use crate::services::result_store::{ResultStore, StoreError};

/// 流水线参数
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub default_max_files: usize,
    pub extract_concurrency: usize,
    pub synthesis_concurrency: usize,
    pub max_file_docs: usize,
    pub analysis_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_max_files: config.default_max_files,
            extract_concurrency: config.extract_concurrency.max(1),
            synthesis_concurrency: config.synthesis_concurrency.max(1),
            max_file_docs: config.max_file_docs,
            analysis_timeout: config.analysis_timeout(),
        }
    }
}

/// 提交失败
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("invalid request: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 已提交的分析
pub struct AnalysisHandle {
    pub id: String,
    /// 后台任务，结束时结果记录已处于终态
    pub task: JoinHandle<()>,
}

/// 待合成的产物
#[derive(Debug, Clone, PartialEq, Eq)]
enum ArtifactJob {
    Overview,
    FileDoc(String),
    SequenceDiagram,
    ClassDiagram,
}

impl ArtifactJob {
    fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactJob::Overview => ArtifactKind::Overview,
            ArtifactJob::FileDoc(_) => ArtifactKind::FileDoc,
            ArtifactJob::SequenceDiagram => ArtifactKind::SequenceDiagram,
            ArtifactJob::ClassDiagram => ArtifactKind::ClassDiagram,
        }
    }

    fn apply(self, result: &mut AnalysisResult, text: String) {
        match self {
            ArtifactJob::Overview => result.overview = Some(text),
            ArtifactJob::FileDoc(path) => {
                result.file_docs.insert(path, text);
            }
            ArtifactJob::SequenceDiagram => result.sequence_diagram = Some(text),
            ArtifactJob::ClassDiagram => result.class_diagram = Some(text),
        }
    }

    /// 已产出，或已经因失败记过警告
    fn is_settled(&self, result: &AnalysisResult) -> bool {
        let produced = match self {
            ArtifactJob::Overview => result.overview.is_some(),
            ArtifactJob::FileDoc(path) => result.file_docs.contains_key(path),
            ArtifactJob::SequenceDiagram => result.sequence_diagram.is_some(),
            ArtifactJob::ClassDiagram => result.class_diagram.is_some(),
        };
        let path = match self {
            ArtifactJob::FileDoc(path) => Some(path.as_str()),
            _ => None,
        };
        produced
            || result
                .warnings
                .iter()
                .any(|w| w.artifact == Some(self.kind()) && w.path.as_deref() == path)
    }

    fn warning(&self, err: &AnalysisError) -> AnalysisWarning {
        self.annotate(AnalysisWarning::new(err.kind(), err.to_string()))
    }

    fn annotate(&self, warning: AnalysisWarning) -> AnalysisWarning {
        let warning = warning.with_artifact(self.kind());
        match self {
            ArtifactJob::FileDoc(path) => warning.with_path(path.as_str()),
            _ => warning,
        }
    }
}

/// 账户级别的失败：后续请求必然同样失败
fn halts_synthesis(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::InferenceAuthError | ErrorKind::InferenceQuotaError)
}

fn document_jobs(excerpts: &BTreeMap<String, String>) -> Vec<ArtifactJob> {
    let mut jobs = vec![ArtifactJob::Overview];
    jobs.extend(excerpts.keys().cloned().map(ArtifactJob::FileDoc));
    jobs
}

fn diagram_jobs() -> Vec<ArtifactJob> {
    vec![ArtifactJob::SequenceDiagram, ArtifactJob::ClassDiagram]
}

/// 请求要求的全部产物
fn planned_jobs(request: &AnalysisRequest, excerpts: &BTreeMap<String, String>) -> Vec<ArtifactJob> {
    let mut jobs = Vec::new();
    if request.include_documentation {
        jobs.extend(document_jobs(excerpts));
    }
    if request.include_diagrams {
        jobs.extend(diagram_jobs());
    }
    jobs
}

/// 分析编排器
pub struct AnalysisOrchestrator {
    store: Arc<ResultStore>,
    walker: Arc<RepositoryWalker>,
    analyzer: CodeAnalyzer,
    synthesizer: Option<Arc<DocSynthesizer>>,
    /// 同时运行的分析数上限
    permits: Arc<Semaphore>,
    settings: PipelineSettings,
}

impl AnalysisOrchestrator {
    pub fn new(
        config: &AppConfig,
        store: Arc<ResultStore>,
        synthesizer: Option<Arc<DocSynthesizer>>,
    ) -> Self {
        Self {
            store,
            walker: Arc::new(RepositoryWalker::new(config)),
            analyzer: CodeAnalyzer::new(),
            synthesizer,
            permits: Arc::new(Semaphore::new(config.max_concurrent_analyses.max(1))),
            settings: PipelineSettings::from_config(config),
        }
    }

    pub fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    pub fn synthesis_enabled(&self) -> bool {
        self.synthesizer.is_some()
    }

    /// 受理请求并在后台启动分析
    pub fn submit(self: &Arc<Self>, request: AnalysisRequest) -> Result<AnalysisHandle, SubmitError> {
        request.validate().map_err(SubmitError::Invalid)?;
        let id = self.store.insert_pending(request.clone())?;
        info!("Accepted analysis {} for source {}", id, request.source);

        let this = Arc::clone(self);
        let task_id = id.clone();
        let task = tokio::spawn(async move {
            this.drive(task_id, request).await;
        });

        Ok(AnalysisHandle { id, task })
    }

    /// 等待工作许可，运行流水线，最后写入终态
    async fn drive(self: Arc<Self>, id: String, request: AnalysisRequest) {
        let _permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.finish(&id, Err(AnalysisError::Internal("worker pool closed".to_string())));
                return;
            }
        };

        let worker = Arc::clone(&self);
        let worker_id = id.clone();
        // 单独的任务：流水线内部 panic 时仍能把记录标记为失败
        let pipeline = tokio::spawn(async move { worker.run_pipeline(&worker_id, &request).await });

        let outcome = match pipeline.await {
            Ok(outcome) => outcome,
            Err(e) => Err(AnalysisError::Internal(format!("analysis task aborted: {}", e))),
        };
        self.finish(&id, outcome);
    }

    fn finish(&self, id: &str, outcome: Result<(), AnalysisError>) {
        let recorded = self.store.update(id, |result| match &outcome {
            Ok(()) => result.complete(),
            Err(err) => result.fail(err),
        });

        match (&outcome, recorded) {
            (Ok(()), Ok(Ok(()))) => info!("Analysis {} completed", id),
            (Err(err), Ok(Ok(()))) => error!("Analysis {} failed ({:?}): {}", id, err.kind(), err),
            (_, Ok(Err(e))) => error!("Analysis {} could not be finalized: {}", id, e),
            (_, Err(e)) => error!("Analysis {} could not be finalized: {}", id, e),
        }
    }

    /// 修改本请求的记录
    fn record<T>(&self, id: &str, f: impl FnOnce(&mut AnalysisResult) -> T) -> Result<T, AnalysisError> {
        self.store
            .update(id, f)
            .map_err(|e| AnalysisError::Internal(e.to_string()))
    }

    /// 墙钟上限覆盖整个请求，但只有结构阶段超时才会让请求失败；
    /// 合成阶段超时时未完成的产物记为警告，请求照常完成。
    async fn run_pipeline(&self, id: &str, request: &AnalysisRequest) -> Result<(), AnalysisError> {
        let limit = self.settings.analysis_timeout;
        let deadline = Instant::now() + limit;

        let (summary, excerpts) = timeout_at(deadline, self.run_structure(id, request))
            .await
            .map_err(|_| AnalysisError::Timeout(limit))??;

        if !request.wants_artifacts() {
            return Ok(());
        }

        let synthesis = self.synthesize_artifacts(id, request, &summary, &excerpts);
        match timeout_at(deadline, synthesis).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let planned = planned_jobs(request, &excerpts);
                let omitted = self.record(id, |r| {
                    let unfinished: Vec<ArtifactJob> =
                        planned.into_iter().filter(|job| !job.is_settled(r)).collect();
                    for job in &unfinished {
                        r.warn(job.warning(&AnalysisError::Timeout(limit)));
                    }
                    unfinished.len()
                })?;
                warn!(
                    "Analysis {}: synthesis hit the {}s limit, {} artifacts omitted",
                    id,
                    limit.as_secs(),
                    omitted
                );
                Ok(())
            }
        }
    }

    /// 源校验 / 克隆 → 枚举 → 提取 → 汇总；返回汇总和需要生成文档的文件摘录
    async fn run_structure(
        &self,
        id: &str,
        request: &AnalysisRequest,
    ) -> Result<(ProjectSummary, BTreeMap<String, String>), AnalysisError> {
        self.record(id, |r| {
            let started = r.transition(AnalysisStatus::Running);
            r.advance(10, "Initializing analysis");
            started
        })?
        .map_err(|e| AnalysisError::Internal(e.to_string()))?;

        let locator = SourceLocator::parse(&request.source, request.input_type, self.walker.allowed_hosts())?;
        let project_name = locator.project_name();
        let tree = self.walker.materialize(&locator).await?;

        let max_files = request.max_files.unwrap_or(self.settings.default_max_files);
        let walker = Arc::clone(&self.walker);
        let root = tree.root().to_path_buf();
        let outcome = tokio::task::spawn_blocking(move || walker.enumerate(&root, max_files))
            .await
            .map_err(|e| AnalysisError::Internal(format!("walk task failed: {}", e)))??;

        if outcome.truncated {
            let message = format!(
                "file limit reached: analyzed {} of {} eligible files",
                outcome.files.len(),
                outcome.total_eligible
            );
            self.record(id, |r| r.warn(AnalysisWarning::new(ErrorKind::TruncatedInput, message)))?;
        }
        self.record(id, |r| r.advance(20, "Analyzing code structure"))?;

        let (summary, excerpts, warnings) = self.extract_all(&project_name, &outcome).await;
        info!(
            "Analysis {}: {} files, {} lines, {} warnings",
            id,
            summary.total_files,
            summary.total_lines,
            warnings.len()
        );
        self.record(id, |r| {
            r.summary = Some(summary.clone());
            r.warnings.extend(warnings);
            r.advance(50, "Generating documentation");
        })?;

        // 合成只用内存中的摘录，克隆目录在这里释放
        if tree.is_clone() {
            debug!("Removing clone of {} at {}", project_name, tree.root().display());
        }
        drop(tree);
        Ok((summary, excerpts))
    }

    /// 有界并发地提取所有文件并汇总
    async fn extract_all(
        &self,
        project_name: &str,
        outcome: &WalkOutcome,
    ) -> (ProjectSummary, BTreeMap<String, String>, Vec<AnalysisWarning>) {
        let doc_targets: BTreeSet<&str> = outcome
            .files
            .iter()
            .take(self.settings.max_file_docs)
            .map(|f| f.relative.as_str())
            .collect();

        let mut summary = ProjectSummary::new(project_name);
        for dir in &outcome.directories {
            summary.add_directory(dir);
        }
        let mut excerpts = BTreeMap::new();
        let mut warnings = Vec::new();

        let mut extractions = stream::iter(outcome.files.iter().cloned())
            .map(|file| {
                let analyzer = self.analyzer.clone();
                async move {
                    let relative = file.relative.clone();
                    let joined =
                        tokio::task::spawn_blocking(move || analyzer.extract_file(&file.path, &file.relative))
                            .await;
                    (relative, joined)
                }
            })
            .buffer_unordered(self.settings.extract_concurrency);

        while let Some((relative, joined)) = extractions.next().await {
            match joined {
                Ok(Ok(extraction)) => {
                    if let Some(message) = extraction.warning {
                        warnings.push(
                            AnalysisWarning::new(ErrorKind::ParseWarning, message).with_path(relative.as_str()),
                        );
                    }
                    if doc_targets.contains(relative.as_str()) {
                        excerpts.insert(relative, extraction.excerpt);
                    }
                    summary.add_record(extraction.record);
                }
                Ok(Err(e)) => {
                    warn!("Skipping unreadable file: {}", e);
                    warnings.push(
                        AnalysisWarning::new(ErrorKind::ParseWarning, e.to_string()).with_path(relative.as_str()),
                    );
                }
                Err(e) => {
                    warn!("Extraction task for {} aborted: {}", relative, e);
                    warnings.push(
                        AnalysisWarning::new(ErrorKind::ParseWarning, format!("extraction aborted: {}", e))
                            .with_path(relative.as_str()),
                    );
                }
            }
        }

        // 完成顺序不确定，按路径排序
        warnings.sort_by(|a, b| a.path.cmp(&b.path));
        (summary, excerpts, warnings)
    }

    async fn synthesize_artifacts(
        &self,
        id: &str,
        request: &AnalysisRequest,
        summary: &ProjectSummary,
        excerpts: &BTreeMap<String, String>,
    ) -> Result<(), AnalysisError> {
        let Some(synthesizer) = self.synthesizer.as_deref() else {
            warn!("No inference backend configured, skipping documentation for {}", id);
            self.record(id, |r| {
                r.warn(AnalysisWarning::new(
                    ErrorKind::InferenceAuthError,
                    "no API key configured; documentation and diagrams were skipped",
                ));
                r.advance(80, "Skipping documentation");
            })?;
            return Ok(());
        };

        let halted = Mutex::new(None);

        if request.include_documentation {
            let jobs = document_jobs(excerpts);
            self.run_jobs(id, synthesizer, summary, excerpts, jobs, &halted)
                .await?;
        }

        self.record(id, |r| r.advance(80, "Generating diagrams"))?;

        if request.include_diagrams {
            self.run_jobs(id, synthesizer, summary, excerpts, diagram_jobs(), &halted)
                .await?;
        }

        Ok(())
    }

    /// 每个产物独立合成，单个失败只记为警告；鉴权或额度失败后不再发起新请求
    async fn run_jobs(
        &self,
        id: &str,
        synthesizer: &DocSynthesizer,
        summary: &ProjectSummary,
        excerpts: &BTreeMap<String, String>,
        jobs: Vec<ArtifactJob>,
        halted: &Mutex<Option<ErrorKind>>,
    ) -> Result<(), AnalysisError> {
        let mut completions = stream::iter(jobs)
            .map(|job| async move {
                if halted.lock().is_some() {
                    return (job, None);
                }
                let input = match &job {
                    ArtifactJob::Overview => ArtifactInput::Overview(summary),
                    ArtifactJob::FileDoc(path) => match summary.files.get(path) {
                        Some(record) => ArtifactInput::FileDoc {
                            record,
                            excerpt: excerpts.get(path).map(String::as_str).unwrap_or_default(),
                        },
                        None => {
                            let missing = AnalysisError::Internal(format!("no record for {}", path));
                            return (job.clone(), Some(Err(missing)));
                        }
                    },
                    ArtifactJob::SequenceDiagram => ArtifactInput::SequenceDiagram(summary),
                    ArtifactJob::ClassDiagram => ArtifactInput::ClassDiagram(summary),
                };
                let outcome = synthesizer.synthesize(input).await;
                (job, Some(outcome))
            })
            .buffer_unordered(self.settings.synthesis_concurrency);

        while let Some((job, outcome)) = completions.next().await {
            let warning = match outcome {
                Some(Ok(text)) => {
                    self.record(id, |r| job.apply(r, text))?;
                    continue;
                }
                Some(Err(err)) => {
                    if halts_synthesis(err.kind()) {
                        halted.lock().get_or_insert(err.kind());
                    }
                    warn!("Analysis {}: {} omitted: {}", id, job.kind(), err);
                    job.warning(&err)
                }
                None => {
                    let kind = halted.lock().unwrap_or(ErrorKind::InferenceAuthError);
                    job.annotate(AnalysisWarning::new(
                        kind,
                        format!("skipped after an earlier {:?}", kind),
                    ))
                }
            };
            self.record(id, |r| r.warn(warning))?;
        }

        Ok(())
    }
}
