//! JavaScript / TypeScript 节点规则
//!
//! TS 语法是 JS 语法的超集，这里同时覆盖 TS 特有的抽象类和接口。

use tree_sitter::Node;

use super::syntax::{callee_name, field_text, node_text, strip_string_literal, LanguageRules};
use super::types::DeclarationKind;

pub(super) const RULES: LanguageRules = LanguageRules {
    classify,
    imports,
    call_target,
};

fn classify(node: Node<'_>, src: &[u8]) -> Option<(DeclarationKind, String)> {
    let kind = match node.kind() {
        "class_declaration" | "class" | "abstract_class_declaration" | "interface_declaration" => {
            DeclarationKind::Class
        }
        "function_declaration" | "generator_function_declaration" | "method_definition" => {
            DeclarationKind::Function
        }
        // const handler = () => {}
        "variable_declarator" => {
            let value = node.child_by_field_name("value")?;
            if !matches!(
                value.kind(),
                "arrow_function" | "function_expression" | "function" | "generator_function"
            ) {
                return None;
            }
            let name = node.child_by_field_name("name")?;
            if name.kind() != "identifier" {
                return None;
            }
            return node_text(name, src).map(|n| (DeclarationKind::Function, n));
        }
        _ => return None,
    };
    field_text(node, "name", src).map(|name| (kind, name))
}

fn imports(node: Node<'_>, src: &[u8]) -> Vec<String> {
    match node.kind() {
        // import x from './x' / export { y } from './y'
        "import_statement" | "export_statement" => node
            .child_by_field_name("source")
            .and_then(|s| node_text(s, src))
            .map(|raw| strip_string_literal(&raw))
            .into_iter()
            .collect(),
        // require('./x') / import('./x')
        "call_expression" => {
            let Some(function) = node.child_by_field_name("function") else {
                return Vec::new();
            };
            let is_loader = function.kind() == "import"
                || (function.kind() == "identifier"
                    && node_text(function, src).as_deref() == Some("require"));
            if !is_loader {
                return Vec::new();
            }
            node.child_by_field_name("arguments")
                .and_then(|args| args.named_child(0))
                .filter(|arg| arg.kind() == "string")
                .and_then(|arg| node_text(arg, src))
                .map(|raw| strip_string_literal(&raw))
                .into_iter()
                .collect()
        }
        _ => Vec::new(),
    }
}

fn call_target(node: Node<'_>, src: &[u8]) -> Option<String> {
    let callee = match node.kind() {
        "call_expression" => node.child_by_field_name("function")?,
        "new_expression" => node.child_by_field_name("constructor")?,
        _ => return None,
    };
    callee_name(callee, src)
}
