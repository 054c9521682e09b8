//! # merge 子命令 CLI 定义
//!
//! 读入强度表格，合并等价观测并写出 MTZ 风格的 CSV。
//! 输入为目录时进入批量模式。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/merge.rs`

use super::input::{DataKind, InputOptions, Weighting};

use clap::Args;
use std::path::PathBuf;

/// merge 子命令参数
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Input: reflection file or directory of reflection files
    pub input: PathBuf,

    /// Output: CSV file (single mode) or directory (batch mode)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Which data to produce
    #[arg(long, value_enum, default_value = "merged-am")]
    pub request: DataKind,

    /// Central estimate used when merging observations
    #[arg(long, value_enum, default_value = "weighted")]
    pub weighting: Weighting,

    /// Add observation counts (NOBS or N(+)/N(-)) to the output
    #[arg(long, default_value_t = false)]
    pub with_nobs: bool,

    /// Keep systematically absent reflections
    #[arg(long, default_value_t = false)]
    pub keep_absences: bool,

    /// Apply the STARANISO anisotropy correction found in the input
    #[arg(long, default_value_t = false)]
    pub aniso_correct: bool,

    /// Fail when an acentric reflection has only one Friedel mate
    #[arg(long, default_value_t = false)]
    pub check_complete: bool,

    #[command(flatten)]
    pub input_options: InputOptions,

    // ─────────────────────────────────────────────────────────────
    // 批量处理参数
    // ─────────────────────────────────────────────────────────────
    /// Glob pattern for input files (batch mode, e.g., "*.csv,*.hkl,XDS_ASCII*")
    #[arg(long, default_value = "*.csv,*.hkl,XDS_ASCII*")]
    pub pattern: String,

    /// Number of parallel jobs (0 = auto, batch mode only)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Recurse into subdirectories (batch mode)
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Overwrite existing output files
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,
}
