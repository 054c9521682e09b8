//! # 分辨率分壳
//!
//! 把衍射点按 1/d² 分配到分辨率壳层。`limits[i]` 为第 i 个壳层的 1/d² 上限，
//! 超出最后一个上限的点归入最后一个壳层。
//!
//! ## 分壳方式
//! - `EqualCount`: 每个壳层唯一衍射点数相同
//! - `Dstar`: d* 等间距
//! - `Dstar2`: d*² 等间距
//! - `Dstar3`: d*³ 等间距（壳层体积相同）
//!
//! ## 依赖关系
//! - 被 `intensities/merge.rs`, `commands/analyze/stats.rs` 使用
//! - 使用 `models/cell.rs`

use crate::error::{HklError, Result};
use crate::intensities::Intensities;
use crate::models::{Miller, UnitCell};

/// 分壳方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinMethod {
    #[default]
    EqualCount,
    Dstar,
    Dstar2,
    Dstar3,
}

/// 分辨率分壳器
#[derive(Debug, Clone)]
pub struct Binner {
    pub cell: UnitCell,
    /// 最低分辨率点的 1/d²
    pub min_1_d2: f64,
    /// 每个壳层的 1/d² 上限，递增，最后一个为最高分辨率点
    pub limits: Vec<f64>,
}

impl Binner {
    /// 根据一组 1/d² 值建立壳层
    pub fn setup(nbins: usize, method: BinMethod, cell: UnitCell, inv_d2: &[f64]) -> Result<Self> {
        if nbins == 0 {
            return Err(HklError::InvalidArgument("number of bins must be positive".to_string()));
        }
        if inv_d2.is_empty() {
            return Err(HklError::InvalidArgument("no reflections to bin".to_string()));
        }
        let mut values: Vec<f64> = inv_d2.iter().copied().filter(|v| v.is_finite()).collect();
        if values.is_empty() {
            return Err(HklError::InvalidArgument("no finite resolution values".to_string()));
        }
        values.sort_by(|a, b| a.total_cmp(b));
        let min_1_d2 = values[0];
        let max_1_d2 = values[values.len() - 1];

        let mut limits = Vec::with_capacity(nbins);
        match method {
            BinMethod::EqualCount => {
                let n = values.len();
                for i in 1..nbins {
                    let idx = i * n / nbins;
                    let limit = if idx == 0 {
                        min_1_d2
                    } else {
                        0.5 * (values[idx - 1] + values[idx.min(n - 1)])
                    };
                    limits.push(limit);
                }
            }
            BinMethod::Dstar => {
                let (lo, hi) = (min_1_d2.sqrt(), max_1_d2.sqrt());
                let step = (hi - lo) / nbins as f64;
                for i in 1..nbins {
                    limits.push((lo + i as f64 * step).powi(2));
                }
            }
            BinMethod::Dstar2 => {
                let step = (max_1_d2 - min_1_d2) / nbins as f64;
                for i in 1..nbins {
                    limits.push(min_1_d2 + i as f64 * step);
                }
            }
            BinMethod::Dstar3 => {
                let (lo, hi) = (min_1_d2.powf(1.5), max_1_d2.powf(1.5));
                let step = (hi - lo) / nbins as f64;
                for i in 1..nbins {
                    limits.push((lo + i as f64 * step).powf(2.0 / 3.0));
                }
            }
        }
        limits.push(max_1_d2);

        Ok(Binner {
            cell,
            min_1_d2,
            limits,
        })
    }

    /// 按数据集中的唯一衍射点建立壳层，需要有效晶胞
    pub fn from_intensities(nbins: usize, method: BinMethod, intensities: &Intensities) -> Result<Self> {
        let cell = intensities.unit_cell;
        if !cell.is_crystal() {
            return Err(HklError::InvalidArgument(
                "resolution binning needs a unit cell (use --cell)".to_string(),
            ));
        }
        let inv_d2: Vec<f64> = intensities
            .unique_asu_indices()?
            .iter()
            .map(|hkl| cell.calculate_1_d2(hkl))
            .collect();
        Self::setup(nbins, method, cell, &inv_d2)
    }

    pub fn size(&self) -> usize {
        self.limits.len()
    }

    pub fn get_bin_from_1_d2(&self, inv_d2: f64) -> usize {
        let idx = self.limits.partition_point(|&limit| limit < inv_d2);
        idx.min(self.limits.len() - 1)
    }

    pub fn get_bin(&self, hkl: &Miller) -> usize {
        self.get_bin_from_1_d2(self.cell.calculate_1_d2(hkl))
    }

    /// 壳层的高分辨率端
    pub fn dmin_of_bin(&self, n: usize) -> f64 {
        1.0 / self.limits[n].sqrt()
    }

    /// 壳层的低分辨率端
    pub fn dmax_of_bin(&self, n: usize) -> f64 {
        if n == 0 {
            1.0 / self.min_1_d2.sqrt()
        } else {
            1.0 / self.limits[n - 1].sqrt()
        }
    }
}
