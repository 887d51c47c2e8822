//! 数据模型

pub mod analysis;
pub mod api;
