//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。空间群注册表在这里构建一次，
//! 以只读引用传给各命令。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `parsers/`, `intensities/`, `stats/`, `utils/`
//! - 子模块: load, merge, analyze, convert

pub mod analyze;
pub mod convert;
pub mod load;
pub mod merge;

use crate::cli::Commands;
use crate::error::Result;
use crate::symmetry::SpaceGroupRegistry;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    let registry = SpaceGroupRegistry::standard()?;
    match cmd {
        Commands::Merge(args) => merge::execute(&registry, args),
        Commands::Analyze(args) => analyze::execute(&registry, args),
        Commands::Convert(args) => convert::execute(args),
    }
}
