//! LLM Prompt 模板
//!
//! 项目概览、文件文档、时序图、类图四种 Prompt。
//! 模板只依赖结构化事实，相同输入总是渲染出相同的 Prompt。

use crate::services::code_analyzer::{DeclarationKind, FileRecord, Language, ProjectSummary};

/// 结构概览里最多列出的目录数
const MAX_LISTED_DIRS: usize = 20;
/// 每种语言最多列出的文件数
const MAX_FILES_PER_LANGUAGE: usize = 10;
/// 最多列出的依赖边
const MAX_LISTED_EDGES: usize = 40;
/// 时序图 / 类图里最多列出的关键文件
const MAX_KEY_FILES: usize = 20;
const MAX_CLASS_FILES: usize = 15;

pub const SYSTEM_PROMPT: &str =
    "You are a senior software engineer writing accurate technical documentation from structural facts about a codebase. Never invent files, classes or functions that are not listed.";

/// 项目概览 Prompt
pub const OVERVIEW_PROMPT: &str = r#"Analyze this codebase and provide a comprehensive project overview.

Project: {project_name}
Total Files: {total_files}
Total Lines of Code: {total_lines}
Technologies: {technologies}
Classes: {class_count}
Functions: {function_count}

File Structure:
{file_structure}

Import Edges (file -> module):
{dependency_edges}

Please provide:
1. Project purpose and functionality
2. Architecture overview
3. Key components and their roles
4. Technology stack analysis
5. Development patterns used

Format your response as a well-structured markdown document."#;

/// 单文件文档 Prompt
pub const FILE_DOC_PROMPT: &str = r#"Generate concise documentation for this {language} file.

Path: {file_path}
Size: {lines} lines, {size} bytes

Declarations:
{declarations}

Imports:
{imports}

Source excerpt:
```{language}
{excerpt}
```

Provide:
1. Purpose and functionality (1-2 sentences)
2. Key components/functions/classes
3. Dependencies and relationships

Format your response as markdown."#;

/// 时序图 Prompt
pub const SEQUENCE_DIAGRAM_PROMPT: &str = r#"Based on this codebase analysis, create a sequence diagram that shows the main flow of the application.

Project: {project_name}
Technologies: {technologies}
Key Files: {key_files}

Import Edges (file -> module):
{dependency_edges}

Generate a Mermaid sequence diagram that shows:
1. Main user interactions
2. Key system components
3. Data flow between components
4. External service calls (if any)

Return only the Mermaid sequence diagram syntax, starting with:
sequenceDiagram"#;

/// 类图 Prompt
pub const CLASS_DIAGRAM_PROMPT: &str = r#"Based on this codebase analysis, create a class diagram that shows the main classes and their relationships.

Project: {project_name}
Technologies: {technologies}
Object-Oriented Files: {class_files}

Classes by file:
{classes}

Generate a Mermaid class diagram that shows:
1. Main classes/entities
2. Class relationships (inheritance, composition, association)
3. Key methods and properties
4. Interfaces (if applicable)

Return only the Mermaid class diagram syntax, starting with:
classDiagram"#;

/// 格式化项目概览 Prompt
pub fn format_overview_prompt(summary: &ProjectSummary) -> String {
    OVERVIEW_PROMPT
        .replace("{project_name}", &summary.name)
        .replace("{total_files}", &summary.total_files.to_string())
        .replace("{total_lines}", &summary.total_lines.to_string())
        .replace("{technologies}", &format_technologies(summary))
        .replace(
            "{class_count}",
            &summary.count_of(DeclarationKind::Class).to_string(),
        )
        .replace(
            "{function_count}",
            &summary.count_of(DeclarationKind::Function).to_string(),
        )
        .replace("{file_structure}", &format_file_structure(summary))
        .replace("{dependency_edges}", &format_dependency_edges(summary))
}

/// 格式化单文件文档 Prompt
pub fn format_file_doc_prompt(record: &FileRecord, excerpt: &str) -> String {
    FILE_DOC_PROMPT
        .replace("{language}", record.language.as_str())
        .replace("{file_path}", &record.path)
        .replace("{lines}", &record.lines.to_string())
        .replace("{size}", &record.size.to_string())
        .replace("{declarations}", &format_declarations(record))
        .replace("{imports}", &bullet_list(record.imports.iter().map(String::as_str)))
        // 源码片段最后替换，避免其中的占位符样式文本被二次替换
        .replace("{excerpt}", excerpt)
}

/// 格式化时序图 Prompt
pub fn format_sequence_diagram_prompt(summary: &ProjectSummary) -> String {
    let key_files: Vec<&str> = summary
        .files
        .keys()
        .take(MAX_KEY_FILES)
        .map(String::as_str)
        .collect();

    SEQUENCE_DIAGRAM_PROMPT
        .replace("{project_name}", &summary.name)
        .replace("{technologies}", &format_technologies(summary))
        .replace("{key_files}", &or_none(key_files.join(", ")))
        .replace("{dependency_edges}", &format_dependency_edges(summary))
}

/// 格式化类图 Prompt，只关注有类概念的语言
pub fn format_class_diagram_prompt(summary: &ProjectSummary) -> String {
    let class_files: Vec<&FileRecord> = summary
        .files
        .values()
        .filter(|f| f.language.has_classes())
        .take(MAX_CLASS_FILES)
        .collect();

    let names: Vec<&str> = class_files.iter().map(|f| f.path.as_str()).collect();
    let classes: Vec<String> = class_files
        .iter()
        .filter_map(|f| {
            let declared: Vec<&str> = f
                .declarations
                .iter()
                .filter(|d| d.kind == DeclarationKind::Class)
                .map(|d| d.name.as_str())
                .collect();
            if declared.is_empty() {
                None
            } else {
                Some(format!("- {}: {}", f.path, declared.join(", ")))
            }
        })
        .collect();

    CLASS_DIAGRAM_PROMPT
        .replace("{project_name}", &summary.name)
        .replace("{technologies}", &format_technologies(summary))
        .replace("{class_files}", &or_none(names.join(", ")))
        .replace("{classes}", &or_none(classes.join("\n")))
}

fn format_technologies(summary: &ProjectSummary) -> String {
    let names: Vec<&str> = summary.technologies().into_iter().map(Language::as_str).collect();
    or_none(names.join(", "))
}

/// 目录在前，文件按语言分组
fn format_file_structure(summary: &ProjectSummary) -> String {
    let mut lines: Vec<String> = summary
        .directories
        .iter()
        .take(MAX_LISTED_DIRS)
        .map(|dir| format!("[dir] {}/", dir))
        .collect();

    for language in summary.languages.keys() {
        lines.push(format!("\n{} files:", language.as_str().to_uppercase()));
        lines.extend(
            summary
                .files
                .values()
                .filter(|f| f.language == *language)
                .take(MAX_FILES_PER_LANGUAGE)
                .map(|f| format!("  {} ({} lines)", f.path, f.lines)),
        );
    }

    or_none(lines.join("\n"))
}

fn format_dependency_edges(summary: &ProjectSummary) -> String {
    let edges: Vec<String> = summary
        .dependency_edges
        .iter()
        .take(MAX_LISTED_EDGES)
        .map(|edge| format!("- {} -> {}", edge.from, edge.to))
        .collect();
    or_none(edges.join("\n"))
}

fn format_declarations(record: &FileRecord) -> String {
    bullet_list(record.declarations.iter().map(|d| {
        let kind = match d.kind {
            DeclarationKind::Class => "class",
            DeclarationKind::Function => "function",
        };
        format!("{} {} (lines {}-{})", kind, d.name, d.start_line, d.end_line)
    }))
}

fn bullet_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let lines: Vec<String> = items
        .into_iter()
        .map(|item| format!("- {}", item.as_ref()))
        .collect();
    or_none(lines.join("\n"))
}

fn or_none(text: String) -> String {
    if text.is_empty() {
        "(none)".to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::code_analyzer::Declaration;

    fn sample_summary() -> ProjectSummary {
        let mut a = FileRecord::empty("pkg/a.py", Language::Python, 20, 3);
        a.declarations.push(Declaration {
            name: "A".to_string(),
            kind: DeclarationKind::Class,
            start_line: 1,
            end_line: 3,
        });
        let mut b = FileRecord::empty("b.go", Language::Go, 10, 2);
        b.imports.push("fmt".to_string());
        ProjectSummary::from_records("demo", vec![a, b])
    }

    #[test]
    fn test_overview_embeds_facts() {
        let prompt = format_overview_prompt(&sample_summary());
        assert!(prompt.contains("Project: demo"));
        assert!(prompt.contains("Total Files: 2"));
        assert!(prompt.contains("Technologies: python, go"));
        assert!(prompt.contains("- b.go -> fmt"));
        assert!(prompt.contains("[dir] pkg/"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn test_prompts_are_deterministic() {
        let summary = sample_summary();
        assert_eq!(format_overview_prompt(&summary), format_overview_prompt(&summary));
        assert_eq!(
            format_sequence_diagram_prompt(&summary),
            format_sequence_diagram_prompt(&summary.clone())
        );
    }

    #[test]
    fn test_class_diagram_focuses_on_class_languages() {
        let prompt = format_class_diagram_prompt(&sample_summary());
        assert!(prompt.contains("Object-Oriented Files: pkg/a.py"));
        assert!(prompt.contains("- pkg/a.py: A"));
        assert!(!prompt.contains("b.go"));
    }

    #[test]
    fn test_file_doc_keeps_excerpt_verbatim() {
        let record = FileRecord::empty("tpl.py", Language::Python, 5, 1);
        let excerpt = "x = '{file_path}'";
        let prompt = format_file_doc_prompt(&record, excerpt);
        assert!(prompt.contains("Path: tpl.py"));
        assert!(prompt.contains(excerpt));
        assert!(prompt.contains("Declarations:\n(none)"));
    }
}
