//! Codebase Documentation Generator
//!
//! 分析 GitHub 仓库或本地目录的源码结构，借助 LLM 生成项目概览、文件文档和 Mermaid 图。

pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod services;
pub mod state;
