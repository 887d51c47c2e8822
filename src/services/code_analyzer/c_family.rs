//! C / C++ 节点规则

use tree_sitter::Node;

use super::syntax::{callee_name, field_text, node_text, strip_string_literal, LanguageRules};
use super::types::DeclarationKind;

pub(super) const RULES: LanguageRules = LanguageRules {
    classify,
    imports,
    call_target,
};

fn classify(node: Node<'_>, src: &[u8]) -> Option<(DeclarationKind, String)> {
    match node.kind() {
        "function_definition" => {
            let declarator = node.child_by_field_name("declarator")?;
            declarator_name(declarator, src).map(|name| (DeclarationKind::Function, name))
        }
        // 只计入带定义体的 struct / class，前置声明忽略
        "struct_specifier" | "class_specifier" => {
            node.child_by_field_name("body")?;
            field_text(node, "name", src).map(|name| (DeclarationKind::Class, name))
        }
        _ => None,
    }
}

/// 沿声明符链找到函数名：`*foo(int)`、`Foo::bar() const` 等
fn declarator_name(node: Node<'_>, src: &[u8]) -> Option<String> {
    let mut current = node;
    loop {
        match current.kind() {
            "identifier" | "field_identifier" | "qualified_identifier" | "destructor_name"
            | "operator_name" | "type_identifier" => return node_text(current, src),
            _ => {}
        }
        current = match current.child_by_field_name("declarator") {
            Some(inner) => inner,
            // reference_declarator 没有字段名
            None => {
                let count = current.named_child_count();
                if count == 0 {
                    return None;
                }
                current.named_child(count - 1)?
            }
        };
    }
}

fn imports(node: Node<'_>, src: &[u8]) -> Vec<String> {
    if node.kind() != "preproc_include" {
        return Vec::new();
    }
    field_text(node, "path", src)
        .map(|raw| strip_string_literal(&raw))
        .into_iter()
        .collect()
}

fn call_target(node: Node<'_>, src: &[u8]) -> Option<String> {
    if node.kind() != "call_expression" {
        return None;
    }
    node.child_by_field_name("function")
        .and_then(|callee| callee_name(callee, src))
}
