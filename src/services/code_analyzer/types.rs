//! 结构化提取结果的类型定义

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::language::Language;

/// 声明种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Class,
    Function,
}

/// 类 / 函数声明
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
    /// 起始行（从 1 开始）
    pub start_line: usize,
    /// 结束行（包含）
    pub end_line: usize,
}

/// 单个文件的提取记录，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// 相对于仓库根目录的路径（`/` 分隔）
    pub path: String,
    pub language: Language,
    /// 文件大小（字节）
    pub size: u64,
    pub lines: usize,
    /// 按源码顺序排列的声明
    pub declarations: Vec<Declaration>,
    /// import / include 的原始模块文本
    pub imports: Vec<String>,
    /// 作为调用目标出现的标识符（尽力而为）
    pub references: Vec<String>,
}

impl FileRecord {
    /// 没有任何声明的记录（不支持的语言或解析失败）
    pub fn empty(path: impl Into<String>, language: Language, size: u64, lines: usize) -> Self {
        Self {
            path: path.into(),
            language,
            size,
            lines,
            declarations: Vec::new(),
            imports: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn count_of(&self, kind: DeclarationKind) -> usize {
        self.declarations.iter().filter(|d| d.kind == kind).count()
    }
}

/// 单文件提取的完整输出
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: FileRecord,
    /// 供文件级文档使用的源码片段
    pub excerpt: String,
    /// 非致命的解析 / 读取警告
    pub warning: Option<String>,
}

/// 依赖边：文件 → 被导入的模块
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
}

/// 项目级汇总
///
/// 所有集合都是有序映射，合并顺序不影响结果。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub name: String,
    pub total_files: usize,
    pub total_lines: usize,
    /// 每种语言的文件数
    pub languages: BTreeMap<Language, usize>,
    pub directories: BTreeSet<String>,
    pub files: BTreeMap<String, FileRecord>,
    pub dependency_edges: BTreeSet<DependencyEdge>,
}

impl ProjectSummary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// 从任意顺序的记录构建汇总
    pub fn from_records(name: impl Into<String>, records: impl IntoIterator<Item = FileRecord>) -> Self {
        let mut summary = Self::new(name);
        for record in records {
            summary.add_record(record);
        }
        summary
    }

    /// 并入一条文件记录；同一路径重复并入时以新记录为准
    pub fn add_record(&mut self, record: FileRecord) {
        if let Some(previous) = self.files.remove(&record.path) {
            self.retract(&previous);
        }

        self.total_files += 1;
        self.total_lines += record.lines;
        *self.languages.entry(record.language).or_insert(0) += 1;
        for import in &record.imports {
            self.dependency_edges.insert(DependencyEdge {
                from: record.path.clone(),
                to: import.clone(),
            });
        }
        if let Some((dir, _)) = record.path.rsplit_once('/') {
            self.add_directory(dir);
        }

        self.files.insert(record.path.clone(), record);
    }

    fn retract(&mut self, record: &FileRecord) {
        self.total_files -= 1;
        self.total_lines -= record.lines;
        if let Some(count) = self.languages.get_mut(&record.language) {
            *count -= 1;
            if *count == 0 {
                self.languages.remove(&record.language);
            }
        }
        self.dependency_edges.retain(|edge| edge.from != record.path);
    }

    /// 记录目录及其所有上级目录
    pub fn add_directory(&mut self, dir: &str) {
        let mut current = dir;
        while !current.is_empty() {
            if !self.directories.insert(current.to_string()) {
                break;
            }
            match current.rsplit_once('/') {
                Some((parent, _)) => current = parent,
                None => break,
            }
        }
    }

    /// 出现过的语言（有序）
    pub fn technologies(&self) -> Vec<Language> {
        self.languages.keys().copied().collect()
    }

    pub fn count_of(&self, kind: DeclarationKind) -> usize {
        self.files.values().map(|f| f.count_of(kind)).sum()
    }

    /// 所有声明，按 (文件, 源码顺序) 排列
    pub fn declarations(&self) -> impl Iterator<Item = (&str, &Declaration)> {
        self.files
            .values()
            .flat_map(|f| f.declarations.iter().map(move |d| (f.path.as_str(), d)))
    }
}
