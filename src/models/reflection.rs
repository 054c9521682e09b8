//! # 衍射点数据模型
//!
//! 定义单个衍射观测/衍射点记录以及数据类型标记。
//!
//! 数据类型分为两个枚举：
//! - `DataType`：数据当前的物理状态（未合并 / 平均 / 反常）
//! - `DataRequest`：读入或合并时的请求，只作为入口函数参数使用
//!
//! ## 依赖关系
//! - 被 `intensities/`, `parsers/`, `stats/` 使用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};
use std::fmt;

/// Miller 指数 (h, k, l)
pub type Miller = [i32; 3];

/// Friedel 对的取向
///
/// 顺序与 -1 / 0 / +1 一致，用作排序的次关键字。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum FriedelSign {
    /// I(-)
    Minus,
    /// 平均强度或未合并数据
    #[default]
    None,
    /// I(+)
    Plus,
}

impl FriedelSign {
    pub fn from_orientation(positive: bool) -> Self {
        if positive {
            FriedelSign::Plus
        } else {
            FriedelSign::Minus
        }
    }
}

/// 衍射点记录
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Refl {
    pub hkl: Miller,
    pub sign: FriedelSign,
    /// 未合并数据的对称操作编码（M/ISYM 约定），0 表示未设置
    pub isym: i8,
    /// 合并进来的观测数，合并前为 0
    pub nobs: u32,
    pub value: f64,
    pub sigma: f64,
}

impl Refl {
    /// 排序关键字：(hkl, sign)
    pub fn key(&self) -> (Miller, FriedelSign) {
        (self.hkl, self.sign)
    }
}

/// 数据的物理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataType {
    #[default]
    Unknown,
    Unmerged,
    Mean,
    Anomalous,
}

impl DataType {
    pub fn type_str(&self) -> &'static str {
        match self {
            DataType::Unmerged => "I",
            DataType::Mean => "<I>",
            DataType::Anomalous => "I+/I-",
            DataType::Unknown => "n/a",
        }
    }

    pub fn is_merged(&self) -> bool {
        matches!(self, DataType::Mean | DataType::Anomalous)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Unknown => write!(f, "Unknown"),
            DataType::Unmerged => write!(f, "Unmerged"),
            DataType::Mean => write!(f, "Mean"),
            DataType::Anomalous => write!(f, "Anomalous"),
        }
    }
}

/// 读入/合并请求
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataRequest {
    Unmerged,
    Mean,
    Anomalous,
    /// 有平均强度用平均强度，否则用反常强度
    MergedMA,
    /// 有反常强度用反常强度，否则用平均强度
    MergedAM,
    /// 有未合并数据用未合并数据，否则同 MergedAM
    UAM,
}

impl DataRequest {
    /// 请求是否需要合并后的数据
    pub fn wants_merged(&self) -> bool {
        !matches!(self, DataRequest::Unmerged | DataRequest::UAM)
    }
}

impl fmt::Display for DataRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataRequest::Unmerged => write!(f, "unmerged"),
            DataRequest::Mean => write!(f, "mean"),
            DataRequest::Anomalous => write!(f, "anomalous"),
            DataRequest::MergedMA => write!(f, "merged (mean, else anomalous)"),
            DataRequest::MergedAM => write!(f, "merged (anomalous, else mean)"),
            DataRequest::UAM => write!(f, "unmerged, else merged"),
        }
    }
}
