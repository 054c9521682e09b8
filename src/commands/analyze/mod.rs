//! # analyze 命令实现
//!
//! 分析功能统一入口，包含多个子命令：
//! - `classify`: 数据类型推断
//! - `stats`: 合并 R 因子
//! - `compare`: 数据集相关性
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的参数
//! - 子模块: classify, stats, compare

pub mod classify;
pub mod compare;
pub mod stats;

use crate::cli::analyze::{AnalyzeArgs, AnalyzeCommands};
use crate::error::Result;
use crate::symmetry::SpaceGroupRegistry;

/// 执行 analyze 命令
pub fn execute(registry: &SpaceGroupRegistry, args: AnalyzeArgs) -> Result<()> {
    match args.command {
        AnalyzeCommands::Classify(classify_args) => classify::execute(registry, classify_args),
        AnalyzeCommands::Stats(stats_args) => stats::execute(registry, stats_args),
        AnalyzeCommands::Compare(compare_args) => compare::execute(registry, compare_args),
    }
}
