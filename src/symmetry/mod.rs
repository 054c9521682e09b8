//! # 对称性模块
//!
//! 空间群操作、只读空间群注册表和倒空间不对称单元约化。
//!
//! ## 子模块
//! - `ops`: 对称操作 (R, t) 与三元式解析
//! - `groups`: 空间群与注册表
//! - `asu`: 不对称单元约化
//!
//! ## 依赖关系
//! - 被 `parsers/`, `intensities/`, `commands/` 使用
//! - 使用 `models/reflection.rs`

pub mod asu;
pub mod groups;
pub mod ops;

pub use asu::ReciprocalAsu;
pub use groups::{GroupOps, SpaceGroup, SpaceGroupRegistry};
pub use ops::Op;
