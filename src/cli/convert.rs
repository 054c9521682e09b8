//! # convert 子命令 CLI 定义
//!
//! 把 mmCIF `_refln` 表格按映射表转换为 MTZ 风格的 CSV。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/convert.rs`

use clap::Args;
use std::path::PathBuf;

/// convert 子命令参数
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Input mmCIF reflection table (CSV with _refln.* headers)
    pub input: PathBuf,

    /// Output CSV file (default: <input stem>_mtz.csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Column mapping file (tag label type dataset [remap]); built-in table if omitted
    #[arg(long)]
    pub spec: Option<PathBuf>,

    /// Print the column mapping in use and exit
    #[arg(long, default_value_t = false)]
    pub print_spec: bool,

    /// Overwrite existing output files
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,
}
