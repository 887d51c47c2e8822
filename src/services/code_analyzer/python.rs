//! Python 节点规则

use tree_sitter::Node;

use super::syntax::{callee_name, field_text, node_text, LanguageRules};
use super::types::DeclarationKind;

pub(super) const RULES: LanguageRules = LanguageRules {
    classify,
    imports,
    call_target,
};

fn classify(node: Node<'_>, src: &[u8]) -> Option<(DeclarationKind, String)> {
    let kind = match node.kind() {
        "class_definition" => DeclarationKind::Class,
        "function_definition" => DeclarationKind::Function,
        _ => return None,
    };
    field_text(node, "name", src).map(|name| (kind, name))
}

fn imports(node: Node<'_>, src: &[u8]) -> Vec<String> {
    match node.kind() {
        // import a.b, c as d
        "import_statement" => {
            let mut cursor = node.walk();
            let modules: Vec<String> = node
                .children_by_field_name("name", &mut cursor)
                .filter_map(|child| {
                    if child.kind() == "aliased_import" {
                        field_text(child, "name", src)
                    } else {
                        node_text(child, src)
                    }
                })
                .collect();
            modules
        }
        // from a.b import c
        "import_from_statement" => field_text(node, "module_name", src).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn call_target(node: Node<'_>, src: &[u8]) -> Option<String> {
    if node.kind() != "call" {
        return None;
    }
    node.child_by_field_name("function")
        .and_then(|callee| callee_name(callee, src))
}

#[cfg(test)]
mod tests {
    use crate::services::code_analyzer::language::Language;
    use crate::services::code_analyzer::syntax::parse_facts;
    use crate::services::code_analyzer::types::DeclarationKind;
    use std::path::Path;

    const SOURCE: &str = r#"
import os
import xml.etree.ElementTree as ET
from .models import User
from typing import Optional

class Repository(Base):
    def __init__(self, path):
        self.path = os.path.join(path, "x")

    @property
    def name(self):
        return helper(self.path)

def main():
    repo = Repository(".")
    print(repo.name)
"#;

    #[test]
    fn test_python_facts() {
        let facts = parse_facts(Language::Python, Path::new("repo.py"), SOURCE).unwrap();

        let decls: Vec<(DeclarationKind, &str)> = facts
            .declarations
            .iter()
            .map(|d| (d.kind, d.name.as_str()))
            .collect();
        assert_eq!(
            decls,
            vec![
                (DeclarationKind::Class, "Repository"),
                (DeclarationKind::Function, "__init__"),
                (DeclarationKind::Function, "name"),
                (DeclarationKind::Function, "main"),
            ]
        );

        assert_eq!(
            facts.imports,
            vec!["os", "xml.etree.ElementTree", ".models", "typing"]
        );
        assert!(facts.references.contains(&"join".to_string()));
        assert!(facts.references.contains(&"helper".to_string()));
        assert!(facts.references.contains(&"Repository".to_string()));
        assert!(facts.references.contains(&"print".to_string()));
    }
}
