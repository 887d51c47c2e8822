//! 应用配置管理
//!
//! 从可执行文件同级目录的 `config.json` 加载配置，再用进程环境变量覆盖。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::AppError;

/// 获取配置文件路径
fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("CODEDOC_CONFIG") {
        return PathBuf::from(path);
    }

    // 配置文件位于可执行文件同级目录
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.json")
}

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM API 密钥（通常来自环境变量）
    #[serde(default)]
    pub api_key: String,

    /// LLM API 基础 URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// 模型名称
    #[serde(default = "default_model")]
    pub model: String,

    /// 温度参数 (0.0 - 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// 最大 token 数
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// 单次推理请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// 暂时性错误的最大重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// 重试基础退避时间（毫秒，指数增长）
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// 监听地址
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// 允许分析的本地根目录（为空时仅检查符号链接逃逸）
    #[serde(default)]
    pub allowed_roots: Vec<PathBuf>,

    /// 允许克隆的远程主机
    #[serde(default = "default_allowed_clone_hosts")]
    pub allowed_clone_hosts: Vec<String>,

    /// 克隆超时（秒）
    #[serde(default = "default_clone_timeout_secs")]
    pub clone_timeout_secs: u64,

    /// 单个分析请求的墙钟时间上限（秒）
    #[serde(default = "default_analysis_timeout_secs")]
    pub analysis_timeout_secs: u64,

    /// 同时运行的分析数量
    #[serde(default = "default_max_concurrent_analyses")]
    pub max_concurrent_analyses: usize,

    /// 单个请求内文件解析并行度
    #[serde(default = "default_extract_concurrency")]
    pub extract_concurrency: usize,

    /// 单个请求内推理调用并行度
    #[serde(default = "default_synthesis_concurrency")]
    pub synthesis_concurrency: usize,

    /// 最多生成多少个文件级文档
    #[serde(default = "default_max_file_docs")]
    pub max_file_docs: usize,

    /// 最大文件大小（字节，默认1MB）
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// 请求未指定时的最大文件数
    #[serde(default = "default_max_files")]
    pub default_max_files: usize,

    /// 额外的忽略模式（glob）
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// 已结束结果的保留时间（秒）
    #[serde(default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,

    /// 结果存储容量
    #[serde(default = "default_max_stored_results")]
    pub max_stored_results: usize,
}

fn default_base_url() -> String {
    "https://api.groq.com/openai".to_string()
}

fn default_model() -> String {
    "llama-3.1-70b-versatile".to_string()
}

fn default_temperature() -> f64 {
    0.3
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_bind_addr() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_allowed_clone_hosts() -> Vec<String> {
    vec!["github.com".to_string(), "www.github.com".to_string()]
}

fn default_clone_timeout_secs() -> u64 {
    300
}

fn default_analysis_timeout_secs() -> u64 {
    900
}

fn default_max_concurrent_analyses() -> usize {
    4
}

fn default_extract_concurrency() -> usize {
    8
}

fn default_synthesis_concurrency() -> usize {
    3
}

fn default_max_file_docs() -> usize {
    20
}

fn default_max_file_size() -> u64 {
    1024 * 1024 // 1MB
}

fn default_max_files() -> usize {
    1000
}

fn default_ignore_patterns() -> Vec<String> {
    vec!["*.min.js".to_string(), "*.log".to_string()]
}

fn default_result_ttl_secs() -> u64 {
    3600
}

fn default_max_stored_results() -> usize {
    256
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            bind_addr: default_bind_addr(),
            allowed_roots: Vec::new(),
            allowed_clone_hosts: default_allowed_clone_hosts(),
            clone_timeout_secs: default_clone_timeout_secs(),
            analysis_timeout_secs: default_analysis_timeout_secs(),
            max_concurrent_analyses: default_max_concurrent_analyses(),
            extract_concurrency: default_extract_concurrency(),
            synthesis_concurrency: default_synthesis_concurrency(),
            max_file_docs: default_max_file_docs(),
            max_file_size: default_max_file_size(),
            default_max_files: default_max_files(),
            ignore_patterns: default_ignore_patterns(),
            result_ttl_secs: default_result_ttl_secs(),
            max_stored_results: default_max_stored_results(),
        }
    }
}

impl AppConfig {
    /// 从指定文件加载配置
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("读取配置文件失败 {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("解析配置文件失败 {}: {}", path.display(), e)))
    }

    /// 使用环境变量覆盖配置
    ///
    /// `lookup` 通常是 `std::env::var(..).ok()`，测试中可替换。
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("LLM_API_KEY").or_else(|| non_empty("GROQ_API_KEY")) {
            self.api_key = key;
        }
        if let Some(url) = non_empty("LLM_BASE_URL") {
            self.base_url = url;
        }
        if let Some(model) = non_empty("LLM_MODEL") {
            self.model = model;
        }
        if let Some(bind) = non_empty("CODEDOC_BIND") {
            self.bind_addr = bind;
        }
        if let Some(roots) = non_empty("CODEDOC_ALLOWED_ROOTS") {
            self.allowed_roots = std::env::split_paths(&roots).collect();
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn clone_timeout(&self) -> Duration {
        Duration::from_secs(self.clone_timeout_secs)
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis_timeout_secs)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }
}

/// 加载配置：文件（可选）+ 环境变量
pub fn load_config() -> AppConfig {
    let path = get_config_path();
    let mut config = if path.exists() {
        match AppConfig::from_file(&path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{}; falling back to defaults", e);
                AppConfig::default()
            }
        }
    } else {
        AppConfig::default()
    };

    config.apply_env_overrides(|key| std::env::var(key).ok());
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.base_url, "https://api.groq.com/openai");
        assert_eq!(config.model, "llama-3.1-70b-versatile");
        assert!((config.temperature - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.default_max_files, 1000);
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"model": "gpt-4o", "max_retries": 5}"#).unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.max_file_size, 1024 * 1024);
        assert_eq!(config.allowed_clone_hosts, vec!["github.com", "www.github.com"]);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("GROQ_API_KEY", "groq-key"),
            ("LLM_MODEL", "claude-3-5-sonnet"),
            ("CODEDOC_BIND", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.api_key, "groq-key");
        assert_eq!(config.model, "claude-3-5-sonnet");
        // 空白值不覆盖
        assert_eq!(config.bind_addr, "127.0.0.1:5000");
    }

    #[test]
    fn test_llm_api_key_takes_precedence() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| match k {
            "LLM_API_KEY" => Some("primary".to_string()),
            "GROQ_API_KEY" => Some("secondary".to_string()),
            _ => None,
        });
        assert_eq!(config.api_key, "primary");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"bind_addr": "0.0.0.0:8080"}"#).unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");

        fs::write(&path, "not json").unwrap();
        assert!(AppConfig::from_file(&path).is_err());
    }
}
