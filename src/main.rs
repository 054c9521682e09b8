//! # hklmerge - 衍射强度合并与统计工具
//!
//! 读入 MTZ / mmCIF / XDS_ASCII 格式的衍射强度，在晶体对称下约化、
//! 合并等价观测，并计算 R-merge、R-meas、R-pim 与数据集相关性。
//!
//! ## 子命令
//! - `merge` - 合并并导出 MTZ 风格的 CSV
//! - `analyze` - 分析功能
//!   - `classify` - 数据类型推断
//!   - `stats` - 按分辨率壳层的合并统计
//!   - `compare` - 两个数据集的相关性
//! - `convert` - mmCIF 表格转 MTZ 列
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/          (命令行参数定义)
//!   ├── commands/     (命令执行逻辑)
//!   │     ├── parsers/      (格式读取)
//!   │     ├── intensities/  (衍射点集合、合并、导出)
//!   │     ├── stats/        (R 因子、分壳、相关性)
//!   │     ├── symmetry/     (空间群与不对称单元)
//!   │     ├── conversion.rs (mmCIF → MTZ 映射)
//!   │     └── models/       (数据模型)
//!   ├── batch/        (批量并行处理)
//!   ├── utils/        (工具函数)
//!   └── error.rs      (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod conversion;
mod error;
mod intensities;
mod models;
mod parsers;
mod stats;
mod symmetry;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
