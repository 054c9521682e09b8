//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `merge`: 合并等价观测并导出
//! - `analyze`: 分析功能（嵌套子命令）
//!   - `classify`: 数据类型推断
//!   - `stats`: 合并 R 因子
//!   - `compare`: 数据集相关性
//! - `convert`: mmCIF 表格转 MTZ 表格
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: input, merge, analyze, convert

pub mod analyze;
pub mod convert;
pub mod input;
pub mod merge;

use clap::{Parser, Subcommand};

/// hklmerge - 衍射强度合并与统计工具
#[derive(Parser)]
#[command(name = "hklmerge")]
#[command(version)]
#[command(about = "Merge X-ray diffraction intensities and compute data-quality statistics", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Merge symmetry-equivalent observations and write an MTZ-style CSV
    Merge(merge::MergeArgs),

    /// Classify, compute merging statistics, or compare datasets
    Analyze(analyze::AnalyzeArgs),

    /// Convert an mmCIF reflection table into MTZ columns
    Convert(convert::ConvertArgs),
}
