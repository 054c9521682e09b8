//! # 衍射点集合
//!
//! `Intensities` 持有有序的衍射点记录及晶体元数据。
//! 空间群通常借用注册表中的条目，由表格对称操作构建时则自行持有。
//!
//! ## 依赖关系
//! - 被 `intensities/` 各子模块、`stats/`、`commands/` 使用
//! - 使用 `models/`, `symmetry/`

use crate::error::{HklError, Result};
use crate::intensities::aniso::AnisoScaling;
use crate::models::{DataType, FriedelSign, Miller, Refl, UnitCell};
use crate::symmetry::ops::negate;
use crate::symmetry::{GroupOps, Op, ReciprocalAsu, SpaceGroup};

use std::borrow::Cow;

/// 衍射强度数据集
#[derive(Debug, Clone, Default)]
pub struct Intensities<'a> {
    pub data: Vec<Refl>,
    pub spacegroup: Option<Cow<'a, SpaceGroup>>,
    pub unit_cell: UnitCell,
    /// 晶胞参数的均方根偏差（来源提供时）
    pub unit_cell_rmsd: [f64; 6],
    pub wavelength: f64,
    pub data_type: DataType,
    /// 来源声明 I(+) = I(-)，即没有可用的反常信号
    pub friedel_law: bool,
    /// 解码 isym 所用的对称操作
    pub isym_ops: Vec<Op>,
    pub staraniso_b: AnisoScaling,
}

impl<'a> Intensities<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn type_str(&self) -> &'static str {
        self.data_type.type_str()
    }

    pub fn spacegroup_str(&self) -> String {
        self.spacegroup
            .as_deref()
            .map(|sg| sg.xhm.clone())
            .unwrap_or_else(|| "none".to_string())
    }

    /// 空间群的完整操作集，未设置空间群时报错
    pub fn group_ops(&self, operation: &str) -> Result<GroupOps> {
        self.spacegroup
            .as_deref()
            .map(SpaceGroup::operations)
            .ok_or_else(|| HklError::MissingSpaceGroup(operation.to_string()))
    }

    /// 读入前检查数据集为空
    pub(crate) fn ensure_empty(&self) -> Result<()> {
        if self.data.is_empty() && self.data_type == DataType::Unknown {
            Ok(())
        } else {
            Err(HklError::InvalidRequest(format!(
                "dataset already holds {} ({} records)",
                self.data_type,
                self.data.len()
            )))
        }
    }

    /// 唯一的入口过滤：强度非 NaN 且 sigma > 0
    pub fn add_if_valid(&mut self, hkl: Miller, sign: FriedelSign, isym: i8, value: f64, sigma: f64) {
        // XDS 以负 sigma 标记被拒绝的观测
        if !value.is_nan() && sigma > 0.0 {
            self.data.push(Refl {
                hkl,
                sign,
                isym,
                nobs: 0,
                value,
                sigma,
            });
        }
    }

    /// (d_max, d_min)
    pub fn resolution_range(&self) -> Result<(f64, f64)> {
        if self.data.is_empty() {
            return Err(HklError::InvalidRequest(
                "resolution range of an empty dataset".to_string(),
            ));
        }
        if !self.unit_cell.is_crystal() {
            return Err(HklError::InvalidArgument(
                "unit cell not set (use --cell)".to_string(),
            ));
        }
        let mut d_max = 0.0_f64;
        let mut d_min = f64::INFINITY;
        for refl in &self.data {
            let d = self.unit_cell.calculate_d(&refl.hkl);
            d_max = d_max.max(d);
            d_min = d_min.min(d);
        }
        Ok((d_max, d_min))
    }

    /// 删除系统消光的衍射点，未设置空间群时不做任何事
    ///
    /// 返回删除的记录数。
    pub fn remove_systematic_absences(&mut self) -> usize {
        let gops = match self.spacegroup.as_deref() {
            Some(sg) => sg.operations(),
            None => return 0,
        };
        let before = self.data.len();
        self.data.retain(|r| !gops.is_systematically_absent(&r.hkl));
        before - self.data.len()
    }

    pub fn sort(&mut self) {
        self.data.sort_by_key(|r| r.key());
    }

    pub fn is_sorted(&self) -> bool {
        self.data.windows(2).all(|w| w[0].key() <= w[1].key())
    }

    pub(crate) fn require_sorted(&self, operation: &str) -> Result<()> {
        if self.is_sorted() {
            Ok(())
        } else {
            Err(HklError::NotSorted {
                operation: operation.to_string(),
            })
        }
    }

    pub(crate) fn require_unmerged(&self, operation: &str) -> Result<()> {
        if self.data_type == DataType::Unmerged {
            Ok(())
        } else {
            Err(HklError::NotUnmerged {
                operation: operation.to_string(),
                found: self.data_type.to_string(),
            })
        }
    }

    pub(crate) fn require_merged(&self, operation: &str) -> Result<()> {
        if self.data_type.is_merged() {
            Ok(())
        } else {
            Err(HklError::NotMerged {
                operation: operation.to_string(),
                found: self.data_type.to_string(),
            })
        }
    }

    /// 由 isym 还原观测的原始指数
    ///
    /// isym 为 0 时存储的 hkl 即原始指数。
    pub fn original_hkl(&self, refl: &Refl) -> Result<Miller> {
        if refl.isym == 0 {
            return Ok(refl.hkl);
        }
        let idx = (refl.isym as i32 - 1) / 2;
        let op = if refl.isym > 0 {
            self.isym_ops.get(idx as usize)
        } else {
            None
        };
        let op = op.ok_or(HklError::InvalidIsym {
            isym: refl.isym,
            hkl: refl.hkl,
            nops: self.isym_ops.len(),
        })?;
        let signed = if refl.isym % 2 == 1 {
            refl.hkl
        } else {
            negate(&refl.hkl)
        };
        Ok(op.inverse().apply_to_hkl(&signed))
    }

    /// 把未合并数据的指数换成不对称单元代表，isym 相对于空间群自身的操作重新编码
    pub fn switch_to_asu_indices(&mut self) -> Result<()> {
        self.require_unmerged("switching to asu indices")?;
        let gops = self.group_ops("switching to asu indices")?;
        let asu = ReciprocalAsu::new(&gops);
        let mut switched = Vec::with_capacity(self.data.len());
        for refl in &self.data {
            let orig = self.original_hkl(refl)?;
            let (hkl, isym) = asu.to_asu_isym(&orig);
            switched.push(Refl { hkl, isym, ..*refl });
        }
        self.data = switched;
        self.isym_ops = gops.ops.clone();
        Ok(())
    }

    /// 去重后的不对称单元指数，Friedel 对共用一个指数
    ///
    /// 未合并数据按 isym 还原后重新约化，重复观测只计一次。
    pub fn unique_asu_indices(&self) -> Result<Vec<Miller>> {
        let mut hkls = match (self.data_type, self.spacegroup.as_deref()) {
            (DataType::Unmerged, Some(sg)) => {
                let gops = sg.operations();
                let asu = ReciprocalAsu::new(&gops);
                self.data
                    .iter()
                    .map(|refl| Ok(asu.to_asu_sign(&self.original_hkl(refl)?).0))
                    .collect::<Result<Vec<_>>>()?
            }
            _ => self.data.iter().map(|refl| refl.hkl).collect(),
        };
        hkls.sort_unstable();
        hkls.dedup();
        Ok(hkls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetry::SpaceGroupRegistry;

    #[test]
    fn test_add_if_valid_filters_sigma_and_nan() {
        let mut intensities = Intensities::new();
        intensities.add_if_valid([1, 2, 3], FriedelSign::None, 1, 10.0, 1.0);
        intensities.add_if_valid([1, 2, 3], FriedelSign::None, 1, 11.0, -1.0);
        intensities.add_if_valid([1, 2, 3], FriedelSign::None, 1, 12.0, 0.0);
        intensities.add_if_valid([1, 2, 3], FriedelSign::None, 1, f64::NAN, 1.0);
        assert_eq!(intensities.len(), 1);
        assert_eq!(intensities.data[0].sigma, 1.0);
        assert_eq!(intensities.data[0].nobs, 0);
    }

    #[test]
    fn test_sort_and_is_sorted() {
        let mut intensities = Intensities::new();
        intensities.add_if_valid([2, 0, 0], FriedelSign::Plus, 0, 1.0, 1.0);
        intensities.add_if_valid([1, 0, 0], FriedelSign::Plus, 0, 1.0, 1.0);
        intensities.add_if_valid([1, 0, 0], FriedelSign::Minus, 0, 1.0, 1.0);
        assert!(!intensities.is_sorted());
        intensities.sort();
        assert!(intensities.is_sorted());
        assert_eq!(intensities.data[0].key(), ([1, 0, 0], FriedelSign::Minus));
    }

    #[test]
    fn test_remove_systematic_absences() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let mut intensities = Intensities::new();
        intensities.add_if_valid([0, 0, 3], FriedelSign::None, 0, 1.0, 1.0);
        intensities.add_if_valid([0, 0, 4], FriedelSign::None, 0, 1.0, 1.0);
        // 没有空间群时不删除
        assert_eq!(intensities.remove_systematic_absences(), 0);
        intensities.spacegroup = registry.find("P 21 21 21").map(Cow::Borrowed);
        assert_eq!(intensities.remove_systematic_absences(), 1);
        assert_eq!(intensities.data[0].hkl, [0, 0, 4]);
    }

    #[test]
    fn test_resolution_range() {
        let mut intensities = Intensities::new();
        assert!(intensities.resolution_range().is_err());
        intensities.unit_cell = UnitCell::new(10.0, 10.0, 10.0, 90.0, 90.0, 90.0);
        intensities.add_if_valid([1, 0, 0], FriedelSign::None, 0, 1.0, 1.0);
        intensities.add_if_valid([0, 0, 5], FriedelSign::None, 0, 1.0, 1.0);
        let (dmax, dmin) = intensities.resolution_range().unwrap();
        assert!((dmax - 10.0).abs() < 1e-9);
        assert!((dmin - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_switch_to_asu_indices() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let mut intensities = Intensities::new();
        intensities.spacegroup = registry.find("P 21 21 21").map(Cow::Borrowed);
        intensities.data_type = DataType::Unmerged;
        intensities.add_if_valid([-1, -2, 3], FriedelSign::None, 0, 5.0, 1.0);
        intensities.add_if_valid([1, 2, 3], FriedelSign::None, 0, 6.0, 1.0);
        intensities.switch_to_asu_indices().unwrap();
        assert_eq!(intensities.data[0].hkl, intensities.data[1].hkl);
        assert_eq!(intensities.isym_ops.len(), 4);
        // 解码后回到原始指数
        assert_eq!(intensities.original_hkl(&intensities.data[0]).unwrap(), [-1, -2, 3]);
    }

    #[test]
    fn test_invalid_isym() {
        let mut intensities = Intensities::new();
        intensities.isym_ops = vec![Op::identity()];
        intensities.add_if_valid([1, 2, 3], FriedelSign::None, 5, 1.0, 1.0);
        assert!(matches!(
            intensities.original_hkl(&intensities.data[0]),
            Err(HklError::InvalidIsym { isym: 5, .. })
        ));
        let refl = Refl { isym: 2, ..intensities.data[0] };
        assert_eq!(intensities.original_hkl(&refl).unwrap(), [-1, -2, -3]);
    }
}
