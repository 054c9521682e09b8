//! # 统计模块
//!
//! 合并 R 因子、分辨率分壳、数据集间相关性，以及壳层统计图。
//!
//! ## 依赖关系
//! - 被 `intensities/merge.rs`, `commands/analyze/` 使用
//! - 使用 `models/cell.rs`
//! - 子模块: merging_r, binner, correlation, plot

pub mod binner;
pub mod correlation;
pub mod merging_r;
pub mod plot;

pub use binner::{BinMethod, Binner};
pub use correlation::Correlation;
pub use merging_r::MergingR;
