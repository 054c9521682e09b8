//! # 衍射强度模块
//!
//! 衍射点集合及其生命周期：读入、过滤、排序、类型推断、合并、导出。
//!
//! ```text
//! 来源表格 ─► read_* ─► [remove_systematic_absences] ─► sort
//!          ─► [check_data_type_under_symmetry] ─► merge_in_place
//!          ─► { calculate_merging_rs, calculate_correlation, prepare_merged_mtz }
//! ```
//!
//! ## 子模块
//! - `store`: 数据集与基本操作
//! - `ingest`: 各格式读入与请求解析
//! - `classify`: 数据类型推断
//! - `merge`: 合并与统计
//! - `aniso`: STARANISO 各向异性校正
//! - `export`: 导出为 MTZ 表格
//!
//! ## 依赖关系
//! - 被 `commands/`, `stats/binner.rs` 使用
//! - 使用 `models/`, `symmetry/`, `parsers/`, `stats/`

pub mod aniso;
pub mod classify;
pub mod export;
pub mod ingest;
pub mod merge;
pub mod store;

pub use classify::check_data_type_under_symmetry;
pub use ingest::{lookup_mtz_spacegroup, lookup_spacegroup};
pub use merge::{MergeWeighting, MergingStats};
pub use store::Intensities;
