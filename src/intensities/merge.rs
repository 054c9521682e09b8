//! # 合并
//!
//! 把未合并观测按不对称单元代表（反常数据再按 Friedel 取向）分组，
//! 每组合并为一个独立衍射点，同时累加合并 R 因子。
//!
//! ## 合并强度
//! - `Weighted`（默认）：<I> = Σ(I/σ²) / Σ(1/σ²)，σ = 1/sqrt(Σ1/σ²)
//! - `Unweighted`：<I> = ΣI / n，σ = sqrt(Σσ²) / n
//!
//! R 因子分子 d = Σ|I - <I>| 使用同一个 <I>。
//!
//! ## 依赖关系
//! - 被 `commands/merge.rs`, `commands/analyze/` 使用
//! - 使用 `stats/merging_r.rs`, `stats/binner.rs`, `stats/correlation.rs`

use crate::error::{HklError, Result};
use crate::intensities::store::Intensities;
use crate::models::{DataRequest, DataType, FriedelSign, Miller, Refl};
use crate::stats::{Binner, Correlation, MergingR};
use crate::symmetry::ReciprocalAsu;

use serde::Serialize;
use std::cmp::Ordering;

/// 合并强度的估计方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MergeWeighting {
    /// 按 1/σ² 加权
    #[default]
    Weighted,
    /// 算术平均
    Unweighted,
}

/// 一组等价观测的合并结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupSummary {
    pub hkl: Miller,
    pub sign: FriedelSign,
    pub nobs: u32,
    pub value: f64,
    pub sigma: f64,
    /// Σ|I - <I>|
    pub residual: f64,
    /// Σ|I|
    pub abs_sum: f64,
}

/// 合并统计：每个壳层一个累加器，另加总体
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergingStats {
    pub shells: Vec<MergingR>,
    pub overall: MergingR,
}

/// 把一组观测合并
fn summarize(hkl: Miller, sign: FriedelSign, members: &[(f64, f64)], weighting: MergeWeighting) -> GroupSummary {
    let n = members.len() as f64;
    let (value, sigma) = match weighting {
        MergeWeighting::Weighted => {
            let (mut sum_w, mut sum_wi) = (0.0, 0.0);
            for &(value, sigma) in members {
                let w = 1.0 / (sigma * sigma);
                sum_w += w;
                sum_wi += w * value;
            }
            (sum_wi / sum_w, 1.0 / sum_w.sqrt())
        }
        MergeWeighting::Unweighted => {
            let sum: f64 = members.iter().map(|m| m.0).sum();
            let sum_sq: f64 = members.iter().map(|m| m.1 * m.1).sum();
            (sum / n, sum_sq.sqrt() / n)
        }
    };
    GroupSummary {
        hkl,
        sign,
        nobs: members.len() as u32,
        value,
        sigma,
        residual: members.iter().map(|m| (m.0 - value).abs()).sum(),
        abs_sum: members.iter().map(|m| m.0.abs()).sum(),
    }
}

impl<'a> Intensities<'a> {
    /// 把请求解析为合并的目标类型
    ///
    /// MergedAM 只在来源可能带有反常信号时合并为 I(+)/I(-)：
    /// 中心对称空间群或来源声明遵守 Friedel 定律时合并为平均强度。
    pub fn merge_target(&self, request: DataRequest) -> Result<DataType> {
        match request {
            DataRequest::Mean | DataRequest::MergedMA => Ok(DataType::Mean),
            DataRequest::Anomalous => Ok(DataType::Anomalous),
            DataRequest::MergedAM => {
                let gops = self.group_ops("merging")?;
                if self.friedel_law || gops.is_centrosymmetric() {
                    Ok(DataType::Mean)
                } else {
                    Ok(DataType::Anomalous)
                }
            }
            DataRequest::Unmerged | DataRequest::UAM => Err(HklError::InvalidRequest(format!(
                "cannot merge into {} data",
                request
            ))),
        }
    }

    /// 解码 isym 并分组，按 (hkl, sign) 排序返回每组的合并结果
    ///
    /// 前置条件：未合并、已排序、有空间群、isym 均可解码。
    pub fn group_observations(&self, target: DataType, weighting: MergeWeighting) -> Result<Vec<GroupSummary>> {
        let operation = "merging";
        self.require_unmerged(operation)?;
        self.require_sorted(operation)?;
        if !target.is_merged() {
            return Err(HklError::InvalidRequest(format!("cannot merge into {} data", target)));
        }
        let gops = self.group_ops(operation)?;
        let asu = ReciprocalAsu::new(&gops);

        let mut keyed: Vec<(Miller, FriedelSign, f64, f64)> = Vec::with_capacity(self.data.len());
        for refl in &self.data {
            let orig = self.original_hkl(refl)?;
            let (hkl, positive) = asu.to_asu_sign(&orig);
            let sign = match target {
                DataType::Anomalous => FriedelSign::from_orientation(positive),
                _ => FriedelSign::None,
            };
            keyed.push((hkl, sign, refl.value, refl.sigma));
        }
        keyed.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut groups = Vec::new();
        let mut members: Vec<(f64, f64)> = Vec::new();
        for (i, &(hkl, sign, value, sigma)) in keyed.iter().enumerate() {
            members.push((value, sigma));
            let last = keyed
                .get(i + 1)
                .map_or(true, |next| (next.0, next.1) != (hkl, sign));
            if last {
                groups.push(summarize(hkl, sign, &members, weighting));
                members.clear();
            }
        }
        Ok(groups)
    }

    /// 原地合并，返回本次合并的总体 R 因子
    pub fn merge_in_place(&mut self, request: DataRequest, weighting: MergeWeighting) -> Result<MergingR> {
        let target = self.merge_target(request)?;
        let groups = self.group_observations(target, weighting)?;

        let mut stats = MergingR::default();
        let mut merged = Vec::with_capacity(groups.len());
        for g in &groups {
            stats.add(g.residual, g.nobs, g.abs_sum);
            merged.push(Refl {
                hkl: g.hkl,
                sign: g.sign,
                isym: 0,
                nobs: g.nobs,
                value: g.value,
                sigma: g.sigma,
            });
        }
        self.data = merged;
        self.isym_ops.clear();
        self.data_type = target;
        Ok(stats)
    }

    /// 计算合并 R 因子，不修改数据
    ///
    /// 提供分壳器时按壳层累加，总体为各壳层之和。
    pub fn calculate_merging_rs(
        &self,
        binner: Option<&Binner>,
        request: DataRequest,
        weighting: MergeWeighting,
    ) -> Result<MergingStats> {
        let target = self.merge_target(request)?;
        let groups = self.group_observations(target, weighting)?;

        let mut shells = vec![MergingR::default(); binner.map_or(1, |b| b.size())];
        for g in &groups {
            let bin = binner.map_or(0, |b| b.get_bin(&g.hkl));
            shells[bin].add(g.residual, g.nobs, g.abs_sum);
        }
        let overall = shells.iter().sum();
        if binner.is_none() {
            shells.clear();
        }
        Ok(MergingStats { shells, overall })
    }

    /// 两个已合并、已排序数据集在共有 (hkl, sign) 上的相关性
    pub fn calculate_correlation(&self, other: &Intensities) -> Result<Correlation> {
        let operation = "correlation";
        self.require_merged(operation)?;
        other.require_merged(operation)?;
        self.require_sorted(operation)?;
        other.require_sorted(operation)?;

        let mut corr = Correlation::default();
        let (mut i, mut j) = (0, 0);
        while i < self.data.len() && j < other.data.len() {
            let (a, b) = (&self.data[i], &other.data[j]);
            match a.key().cmp(&b.key()) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    corr.add_point(a.value, b.value);
                    i += 1;
                    j += 1;
                }
            }
        }
        Ok(corr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UnitCell;
    use crate::stats::BinMethod;
    use crate::symmetry::{SpaceGroup, SpaceGroupRegistry};
    use std::borrow::Cow;

    fn unmerged<'a>(sg: &'a SpaceGroup, rows: &[(Miller, f64, f64)]) -> Intensities<'a> {
        let mut intensities = Intensities::new();
        intensities.spacegroup = Some(Cow::Borrowed(sg));
        intensities.data_type = DataType::Unmerged;
        intensities.unit_cell = UnitCell::new(50.0, 60.0, 70.0, 90.0, 90.0, 90.0);
        for &(hkl, value, sigma) in rows {
            intensities.add_if_valid(hkl, FriedelSign::None, 0, value, sigma);
        }
        intensities.sort();
        intensities
    }

    #[test]
    fn test_three_observations_merge_to_one() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let sg = registry.find("P 21 21 21").unwrap();
        // 三个对称等价观测
        let mut data = unmerged(sg, &[([1, 2, 3], 10.0, 1.0), ([-1, -2, 3], 12.0, 1.0), ([1, -2, -3], 11.0, 1.0)]);
        let stats = data.merge_in_place(DataRequest::Mean, MergeWeighting::Weighted).unwrap();

        assert_eq!(data.data_type, DataType::Mean);
        assert_eq!(data.len(), 1);
        let refl = data.data[0];
        assert_eq!(refl.nobs, 3);
        assert_eq!(refl.sign, FriedelSign::None);
        assert!((refl.value - 11.0).abs() < 1e-12);
        assert!((refl.sigma - 1.0 / 3.0_f64.sqrt()).abs() < 1e-12);
        assert!(data.isym_ops.is_empty());

        assert_eq!(stats.all_refl, 3);
        assert_eq!(stats.unique_refl, 1);
        assert!((stats.intensity_sum - 33.0).abs() < 1e-12);
        assert!((stats.r_merge_num - 2.0).abs() < 1e-12);
        assert!(stats.r_merge() > 0.0);
    }

    #[test]
    fn test_unweighted_estimate() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let sg = registry.find("P 1").unwrap();
        let mut data = unmerged(sg, &[([1, 2, 3], 10.0, 1.0), ([1, 2, 3], 20.0, 2.0)]);
        data.merge_in_place(DataRequest::Mean, MergeWeighting::Unweighted).unwrap();
        assert!((data.data[0].value - 15.0).abs() < 1e-12);
        assert!((data.data[0].sigma - 5.0_f64.sqrt() / 2.0).abs() < 1e-12);
    }

    /// P 2 3 中 (1,2,3) 的 12 个观测：7 个正取向，5 个 Friedel 对
    fn p23_friedel_pair_rows() -> Vec<(Miller, f64, f64)> {
        vec![
            ([1, 2, 3], 100.0, 10.0),
            ([2, 3, 1], 120.0, 12.0),
            ([3, 1, 2], 90.0, 9.0),
            ([-1, -2, 3], 110.0, 11.0),
            ([-2, 3, -1], 130.0, 13.0),
            ([3, -1, -2], 80.0, 10.0),
            ([1, -2, -3], 105.0, 8.0),
            ([-1, -2, -3], 95.0, 10.0),
            ([1, 2, -3], 115.0, 12.0),
            ([-2, -3, -1], 85.0, 9.0),
            ([-3, 1, 2], 100.0, 11.0),
            ([2, -3, 1], 125.0, 14.0),
        ]
    }

    #[test]
    fn test_merging_rs_reference_values() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let sg = registry.find("P 2 3").unwrap();
        let data = unmerged(sg, &p23_friedel_pair_rows());
        assert_eq!(data.len(), 12);

        let weighted = data
            .calculate_merging_rs(None, DataRequest::Anomalous, MergeWeighting::Weighted)
            .unwrap()
            .overall;
        assert_eq!(weighted.all_refl, 12);
        assert_eq!(weighted.unique_refl, 2);
        assert!((weighted.r_merge() - 0.121798).abs() < 5e-5);
        assert!((weighted.r_meas() - 0.133372).abs() < 5e-5);
        assert!((weighted.r_pim() - 0.054116).abs() < 5e-5);

        let unweighted = data
            .calculate_merging_rs(None, DataRequest::Anomalous, MergeWeighting::Unweighted)
            .unwrap()
            .overall;
        assert!((unweighted.r_merge() - 0.122709).abs() < 5e-5);
        assert!((unweighted.r_meas() - 0.134474).abs() < 5e-5);
        assert!((unweighted.r_pim() - 0.054775).abs() < 5e-5);

        let mut merged = data.clone();
        merged.merge_in_place(DataRequest::Anomalous, MergeWeighting::Weighted).unwrap();
        assert_eq!(merged.len(), 2);
        let (minus, plus) = (merged.data[0], merged.data[1]);
        assert_eq!((minus.hkl, minus.sign, minus.nobs), ([3, 1, 2], FriedelSign::Minus, 5));
        assert_eq!((plus.hkl, plus.sign, plus.nobs), ([3, 1, 2], FriedelSign::Plus, 7));
        assert!((plus.value - 102.224656).abs() < 1e-5);
        assert!((plus.sigma - 3.804269).abs() < 1e-5);
        assert!((minus.value - 99.918711).abs() < 1e-5);
        assert!((minus.sigma - 4.841799).abs() < 1e-5);
    }

    #[test]
    fn test_nobs_sum_equals_raw_count() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let sg = registry.find("P 21 21 21").unwrap();
        let mut data = unmerged(
            sg,
            &[
                ([1, 2, 3], 10.0, 1.0),
                ([-1, -2, -3], 9.0, 1.0),
                ([2, 0, 0], 4.0, 1.0),
                ([-2, 0, 0], 5.0, 1.0),
                ([3, 1, 1], 7.0, 1.0),
                ([0, 0, 4], 1.0, 0.0),
            ],
        );
        let raw = data.len();
        assert_eq!(raw, 5);
        data.merge_in_place(DataRequest::Anomalous, MergeWeighting::Weighted).unwrap();
        let total: u32 = data.data.iter().map(|r| r.nobs).sum();
        assert_eq!(total as usize, raw);
        assert!(data.is_sorted());
        // (1,2,3) 的 Friedel 对在反常合并中分开，(2,0,0) 为中心衍射点合为一组
        assert_eq!(data.len(), 4);
    }

    #[test]
    fn test_identical_observations_give_zero_r() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let sg = registry.find("P 1").unwrap();
        let data = unmerged(sg, &[([1, 0, 0], 5.0, 1.0), ([1, 0, 0], 5.0, 1.0), ([0, 1, 0], 3.0, 1.0)]);
        let stats = data
            .calculate_merging_rs(None, DataRequest::Mean, MergeWeighting::Weighted)
            .unwrap();
        assert!(stats.shells.is_empty());
        assert_eq!(stats.overall.r_merge(), 0.0);
        assert_eq!(stats.overall.r_meas(), 0.0);
        assert_eq!(stats.overall.r_pim(), 0.0);
        assert_eq!(stats.overall.intensity_sum, 13.0);
        assert_eq!(data.data_type, DataType::Unmerged);
    }

    #[test]
    fn test_binned_stats_sum_to_overall() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let sg = registry.find("P 1").unwrap();
        let data = unmerged(
            sg,
            &[
                ([1, 0, 0], 5.0, 1.0),
                ([1, 0, 0], 6.0, 1.0),
                ([5, 5, 5], 2.0, 1.0),
                ([5, 5, 5], 3.0, 1.0),
                ([10, 10, 10], 1.0, 1.0),
            ],
        );
        let binner = Binner::from_intensities(2, BinMethod::Dstar2, &data).unwrap();
        let stats = data
            .calculate_merging_rs(Some(&binner), DataRequest::Mean, MergeWeighting::Weighted)
            .unwrap();
        assert_eq!(stats.shells.len(), 2);
        let unique: u64 = stats.shells.iter().map(|s| s.unique_refl).sum();
        assert_eq!(unique, stats.overall.unique_refl);
        assert_eq!(stats.overall.all_refl, 5);
    }

    #[test]
    fn test_preconditions() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let sg = registry.find("P 1").unwrap();
        let mut data = unmerged(sg, &[([2, 0, 0], 5.0, 1.0), ([1, 0, 0], 6.0, 1.0)]);
        data.data.swap(0, 1);
        assert!(matches!(
            data.merge_in_place(DataRequest::Mean, MergeWeighting::Weighted),
            Err(HklError::NotSorted { .. })
        ));
        data.sort();
        assert!(matches!(
            data.merge_in_place(DataRequest::UAM, MergeWeighting::Weighted),
            Err(HklError::InvalidRequest(_))
        ));
        data.merge_in_place(DataRequest::Mean, MergeWeighting::Weighted).unwrap();
        assert!(matches!(
            data.merge_in_place(DataRequest::Mean, MergeWeighting::Weighted),
            Err(HklError::NotUnmerged { .. })
        ));

        let mut no_sg = unmerged(sg, &[([1, 0, 0], 6.0, 1.0)]);
        no_sg.spacegroup = None;
        assert!(matches!(
            no_sg.merge_in_place(DataRequest::Mean, MergeWeighting::Weighted),
            Err(HklError::MissingSpaceGroup(_))
        ));
    }

    #[test]
    fn test_merged_am_prefers_mean_for_centrosymmetric() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let centro = unmerged(registry.find("P -1").unwrap(), &[]);
        assert_eq!(centro.merge_target(DataRequest::MergedAM).unwrap(), DataType::Mean);
        let acentric = unmerged(registry.find("P 1").unwrap(), &[]);
        assert_eq!(acentric.merge_target(DataRequest::MergedAM).unwrap(), DataType::Anomalous);

        let mut friedel = unmerged(registry.find("P 3").unwrap(), &[]);
        friedel.friedel_law = true;
        assert_eq!(friedel.merge_target(DataRequest::MergedAM).unwrap(), DataType::Mean);
        assert_eq!(friedel.merge_target(DataRequest::Anomalous).unwrap(), DataType::Anomalous);
    }

    #[test]
    fn test_correlation_with_copy() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let sg = registry.find("P 1").unwrap();
        let mut data = unmerged(
            sg,
            &[([1, 0, 0], 5.0, 1.0), ([0, 1, 0], 8.0, 1.0), ([0, 0, 1], 2.0, 1.0), ([1, 1, 0], 4.0, 1.0)],
        );
        assert!(matches!(data.calculate_correlation(&data), Err(HklError::NotMerged { .. })));
        data.merge_in_place(DataRequest::Mean, MergeWeighting::Weighted).unwrap();
        let copy = data.clone();
        let corr = data.calculate_correlation(&copy).unwrap();
        assert_eq!(corr.n, 4);
        assert!((corr.coefficient() - 1.0).abs() < 1e-12);
        assert!(corr.intercept().abs() < 1e-12);

        let mut partial = copy.clone();
        partial.data.remove(0);
        assert_eq!(data.calculate_correlation(&partial).unwrap().n, 3);

        let mut unsorted = copy;
        unsorted.data.reverse();
        assert!(matches!(data.calculate_correlation(&unsorted), Err(HklError::NotSorted { .. })));
    }
}
