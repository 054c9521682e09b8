//! # 数据模型模块
//!
//! 定义衍射点记录、晶胞和张量等值类型。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `intensities/`, `stats/` 使用
//! - 子模块: reflection, cell, tensor

pub mod cell;
pub mod reflection;
pub mod tensor;

pub use cell::UnitCell;
pub use reflection::{DataRequest, DataType, FriedelSign, Miller, Refl};
pub use tensor::SMat33;
