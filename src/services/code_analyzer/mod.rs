//! 代码分析器主模块
//!
//! 对单个文件做结构化提取：语言分类 → tree-sitter 解析 → 声明 / 导入 / 调用目标。
//! 解析失败只降级为空记录加警告，不会中断整个分析。

mod c_family;
mod go;
mod java;
mod javascript;
pub mod language;
mod python;
mod rust_lang;
pub mod syntax;
pub mod types;

use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

pub use language::Language;
pub use types::{Declaration, DeclarationKind, DependencyEdge, Extraction, FileRecord, ProjectSummary};

/// 文件级文档使用的源码片段长度（字符）
pub const EXCERPT_CHARS: usize = 4000;

/// 读取失败的文件不产生记录
#[derive(Debug, thiserror::Error)]
#[error("failed to read {path}: {source}")]
pub struct ExtractError {
    pub path: String,
    #[source]
    pub source: io::Error,
}

/// 代码分析器
#[derive(Debug, Clone)]
pub struct CodeAnalyzer {
    excerpt_chars: usize,
}

impl Default for CodeAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeAnalyzer {
    pub fn new() -> Self {
        Self {
            excerpt_chars: EXCERPT_CHARS,
        }
    }

    /// 读取并提取单个文件
    ///
    /// 同步阻塞调用，异步上下文中应放到 `spawn_blocking` 里执行。
    pub fn extract_file(&self, path: &Path, relative_path: &str) -> Result<Extraction, ExtractError> {
        let bytes = fs::read(path).map_err(|source| ExtractError {
            path: relative_path.to_string(),
            source,
        })?;
        let size = bytes.len() as u64;

        match String::from_utf8(bytes) {
            Ok(source) => Ok(self.extract_source(relative_path, &source, size)),
            // 读到了内容但不是文本：保留空记录
            Err(_) => {
                warn!("Not valid UTF-8, skipping parse: {}", relative_path);
                Ok(Extraction {
                    record: FileRecord::empty(relative_path, Language::classify(relative_path), size, 0),
                    excerpt: String::new(),
                    warning: Some(format!("{}: not valid UTF-8 text", relative_path)),
                })
            }
        }
    }

    /// 对已加载的源码做提取
    pub fn extract_source(&self, relative_path: &str, source: &str, size: u64) -> Extraction {
        let language = Language::classify(relative_path);
        let lines = source.lines().count();
        let excerpt: String = source.chars().take(self.excerpt_chars).collect();
        let mut record = FileRecord::empty(relative_path, language, size, lines);

        if !language.is_supported() {
            debug!("Unsupported language, skipping parse: {}", relative_path);
            return Extraction {
                record,
                excerpt,
                warning: None,
            };
        }

        match syntax::parse_facts(language, Path::new(relative_path), source) {
            Ok(facts) => {
                record.declarations = facts.declarations;
                record.imports = facts.imports;
                record.references = facts.references;
                Extraction {
                    record,
                    excerpt,
                    warning: None,
                }
            }
            Err(e) => {
                warn!("Parse failed for {} ({}): {}", relative_path, language, e);
                Extraction {
                    record,
                    excerpt,
                    warning: Some(format!("{}: {}", relative_path, e)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extract_file_reads_and_parses() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.py");
        fs::write(&path, "class A:\n    pass\n").unwrap();

        let extraction = CodeAnalyzer::new().extract_file(&path, "a.py").unwrap();
        assert!(extraction.warning.is_none());
        assert_eq!(extraction.record.language, Language::Python);
        assert_eq!(extraction.record.lines, 2);
        assert_eq!(extraction.record.size, 18);
        assert_eq!(extraction.record.count_of(DeclarationKind::Class), 1);
    }

    #[test]
    fn test_unsupported_language_is_empty_without_warning() {
        let extraction = CodeAnalyzer::new().extract_source("notes.txt", "class A:\n", 9);
        assert_eq!(extraction.record.language, Language::Unsupported);
        assert!(extraction.record.declarations.is_empty());
        assert!(extraction.warning.is_none());
    }

    #[test]
    fn test_parse_failure_degrades_to_empty_record() {
        let extraction = CodeAnalyzer::new().extract_source("bad.py", "def broken(:\n  return\n", 22);
        assert_eq!(extraction.record.path, "bad.py");
        assert!(extraction.record.declarations.is_empty());
        assert!(extraction.record.imports.is_empty());
        assert!(extraction.warning.unwrap().starts_with("bad.py"));
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let source = "x = 1\n".repeat(2000);
        let extraction = CodeAnalyzer::new().extract_source("big.py", &source, source.len() as u64);
        assert_eq!(extraction.excerpt.chars().count(), EXCERPT_CHARS);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = CodeAnalyzer::new()
            .extract_file(&dir.path().join("gone.py"), "gone.py")
            .unwrap_err();
        assert_eq!(err.path, "gone.py");
        assert_eq!(err.source.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_binary_file_degrades_to_empty_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.py");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();
        let extraction = CodeAnalyzer::new().extract_file(&path, "blob.py").unwrap();
        assert_eq!(extraction.record.size, 4);
        assert!(extraction.record.declarations.is_empty());
        assert!(extraction.warning.is_some());
    }
}
