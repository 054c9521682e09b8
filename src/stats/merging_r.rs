//! # 合并 R 因子
//!
//! R-merge / R-meas / R-pim 的累加器。不同分辨率壳层的累加器可以逐项相加得到总体统计。
//!
//! ```text
//! nobs > 1:  r_merge += d
//!            t = d / sqrt(nobs - 1)
//!            r_pim   += t
//!            r_meas  += sqrt(nobs) * t
//! ```
//!
//! ## 依赖关系
//! - 被 `intensities/merge.rs`, `commands/analyze/stats.rs` 使用
//! - 无外部模块依赖

use serde::Serialize;
use std::iter::Sum;
use std::ops::AddAssign;

/// 合并统计累加器
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MergingR {
    pub all_refl: u64,
    pub unique_refl: u64,
    pub r_merge_num: f64,
    pub r_meas_num: f64,
    pub r_pim_num: f64,
    /// 原始观测强度绝对值之和
    pub intensity_sum: f64,
}

impl MergingR {
    /// 加入一组等价观测
    ///
    /// `r_merge_num` 为该组的 Σ|I - <I>|，单个观测的组不贡献分子。
    pub fn add(&mut self, r_merge_num: f64, nobs: u32, intensity_sum: f64) {
        self.all_refl += nobs as u64;
        self.unique_refl += 1;
        self.intensity_sum += intensity_sum;
        if nobs > 1 {
            self.r_merge_num += r_merge_num;
            let t = r_merge_num / ((nobs - 1) as f64).sqrt();
            self.r_pim_num += t;
            self.r_meas_num += (nobs as f64).sqrt() * t;
        }
    }

    pub fn add_other(&mut self, other: &MergingR) {
        self.all_refl += other.all_refl;
        self.unique_refl += other.unique_refl;
        self.r_merge_num += other.r_merge_num;
        self.r_meas_num += other.r_meas_num;
        self.r_pim_num += other.r_pim_num;
        self.intensity_sum += other.intensity_sum;
    }

    /// 0/0 时为 NaN
    pub fn r_merge(&self) -> f64 {
        self.r_merge_num / self.intensity_sum
    }

    pub fn r_meas(&self) -> f64 {
        self.r_meas_num / self.intensity_sum
    }

    pub fn r_pim(&self) -> f64 {
        self.r_pim_num / self.intensity_sum
    }

    /// 平均多重度
    pub fn multiplicity(&self) -> f64 {
        self.all_refl as f64 / self.unique_refl as f64
    }
}

impl AddAssign<&MergingR> for MergingR {
    fn add_assign(&mut self, other: &MergingR) {
        self.add_other(other);
    }
}

impl AddAssign for MergingR {
    fn add_assign(&mut self, other: MergingR) {
        self.add_other(&other);
    }
}

impl<'r> Sum<&'r MergingR> for MergingR {
    fn sum<I: Iterator<Item = &'r MergingR>>(iter: I) -> Self {
        let mut total = MergingR::default();
        for m in iter {
            total += m;
        }
        total
    }
}
