//! # analyze 子命令 CLI 定义
//!
//! 分析功能统一入口，包含多个子命令：
//! - `classify`: 推断数据类型
//! - `stats`: 按分辨率壳层计算 R-merge / R-meas / R-pim
//! - `compare`: 两个数据集的相关性
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/analyze/` 相应模块

use super::input::{BinningMethod, DataKind, InputOptions, Weighting};

use clap::{Args, Subcommand};
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────
// Analyze 主命令
// ─────────────────────────────────────────────────────────────

/// analyze 主命令参数
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[command(subcommand)]
    pub command: AnalyzeCommands,
}

/// analyze 子命令
#[derive(Subcommand, Debug)]
pub enum AnalyzeCommands {
    /// Infer whether a table holds unmerged, mean or anomalous data
    Classify(ClassifyArgs),

    /// Merging statistics in resolution shells
    Stats(StatsArgs),

    /// Correlation between two merged datasets
    Compare(CompareArgs),
}

// ─────────────────────────────────────────────────────────────
// classify
// ─────────────────────────────────────────────────────────────

/// classify 子命令参数
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Reflection files to inspect
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    #[command(flatten)]
    pub input_options: InputOptions,
}

// ─────────────────────────────────────────────────────────────
// stats
// ─────────────────────────────────────────────────────────────

/// stats 子命令参数
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Unmerged reflection file
    pub input: PathBuf,

    /// Number of resolution shells
    #[arg(long, default_value_t = 10)]
    pub bins: usize,

    /// How shell boundaries are placed
    #[arg(long, value_enum, default_value = "equal-count")]
    pub method: BinningMethod,

    /// Merge target for the statistics (mean or anomalous)
    #[arg(long, value_enum, default_value = "mean")]
    pub request: DataKind,

    /// Central estimate used for the residuals
    #[arg(long, value_enum, default_value = "weighted")]
    pub weighting: Weighting,

    /// Keep systematically absent reflections
    #[arg(long, default_value_t = false)]
    pub keep_absences: bool,

    /// Write the shell table to a CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Plot R factors against resolution (.png or .svg)
    #[arg(long)]
    pub plot: Option<PathBuf>,

    /// Figure width in pixels (for PNG) or points (for SVG)
    #[arg(long, default_value_t = 1200)]
    pub width: u32,

    /// Figure height in pixels (for PNG) or points (for SVG)
    #[arg(long, default_value_t = 800)]
    pub height: u32,

    #[command(flatten)]
    pub input_options: InputOptions,
}

// ─────────────────────────────────────────────────────────────
// compare
// ─────────────────────────────────────────────────────────────

/// compare 子命令参数
#[derive(Args, Debug)]
pub struct CompareArgs {
    /// First reflection file
    pub first: PathBuf,

    /// Second reflection file
    pub second: PathBuf,

    /// Which merged data to compare
    #[arg(long, value_enum, default_value = "merged-ma")]
    pub request: DataKind,

    /// Central estimate used when an input must be merged first
    #[arg(long, value_enum, default_value = "weighted")]
    pub weighting: Weighting,

    #[command(flatten)]
    pub input_options: InputOptions,
}
