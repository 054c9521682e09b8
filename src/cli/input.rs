//! # 共享的输入参数
//!
//! 各子命令共用的元数据覆盖参数，以及请求、权重和分壳方式的取值枚举。
//!
//! ## 依赖关系
//! - 被 `cli/merge.rs`, `cli/analyze.rs` 使用
//! - 枚举映射到 `models/`, `intensities/`, `stats/` 中的类型

use crate::intensities::MergeWeighting;
use crate::models::DataRequest;
use crate::stats::BinMethod;

use clap::{Args, ValueEnum};

/// 覆盖或补充输入文件中的元数据
#[derive(Args, Debug, Clone, Default)]
pub struct InputOptions {
    /// Space group symbol or number (e.g., "P 21 21 21", "19")
    #[arg(long, env = "HKLMERGE_SPACEGROUP")]
    pub spacegroup: Option<String>,

    /// Unit cell "a b c alpha beta gamma" (Å, degrees)
    #[arg(long, env = "HKLMERGE_CELL")]
    pub cell: Option<String>,

    /// X-ray wavelength in Å
    #[arg(long, env = "HKLMERGE_WAVELENGTH")]
    pub wavelength: Option<f64>,
}

// ─────────────────────────────────────────────────────────────
// 取值枚举
// ─────────────────────────────────────────────────────────────

/// 数据请求
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum DataKind {
    /// Individual observations
    Unmerged,
    /// Mean intensities <I>
    Mean,
    /// Friedel-separated intensities I(+)/I(-)
    Anomalous,
    /// Mean if available, otherwise anomalous
    MergedMa,
    /// Anomalous if available, otherwise mean
    MergedAm,
    /// Unmerged if available, otherwise merged-am
    Uam,
}

impl From<DataKind> for DataRequest {
    fn from(kind: DataKind) -> Self {
        match kind {
            DataKind::Unmerged => DataRequest::Unmerged,
            DataKind::Mean => DataRequest::Mean,
            DataKind::Anomalous => DataRequest::Anomalous,
            DataKind::MergedMa => DataRequest::MergedMA,
            DataKind::MergedAm => DataRequest::MergedAM,
            DataKind::Uam => DataRequest::UAM,
        }
    }
}

/// 合并时的中心估计
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum Weighting {
    /// Inverse-variance weighted mean
    #[default]
    Weighted,
    /// Plain arithmetic mean
    Unweighted,
}

impl From<Weighting> for MergeWeighting {
    fn from(w: Weighting) -> Self {
        match w {
            Weighting::Weighted => MergeWeighting::Weighted,
            Weighting::Unweighted => MergeWeighting::Unweighted,
        }
    }
}

/// 分辨率分壳方式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum BinningMethod {
    /// Equal number of reflections per shell
    #[default]
    EqualCount,
    /// Equal width in d*
    Dstar,
    /// Equal width in d*²
    Dstar2,
    /// Equal width in d*³
    Dstar3,
}

impl From<BinningMethod> for BinMethod {
    fn from(m: BinningMethod) -> Self {
        match m {
            BinningMethod::EqualCount => BinMethod::EqualCount,
            BinningMethod::Dstar => BinMethod::Dstar,
            BinningMethod::Dstar2 => BinMethod::Dstar2,
            BinningMethod::Dstar3 => BinMethod::Dstar3,
        }
    }
}
