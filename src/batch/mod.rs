//! # 批量处理模块
//!
//! 对目录中的多个衍射数据文件并行执行同一操作。
//!
//! ## 功能
//! - 自动检测输入类型（文件/目录）
//! - 收集匹配文件列表
//! - 并行处理，共享只读的空间群注册表
//! - 进度反馈与统计
//!
//! ## 依赖关系
//! - 被 `commands/merge.rs` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::FileCollector;
pub use runner::{BatchRunner, ProcessResult};
