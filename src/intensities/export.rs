//! # 导出合并数据
//!
//! 把已合并的数据集投影为 MTZ 表格，每个独立衍射点一行。
//!
//! ## 列布局
//! - 平均强度: `H K L IMEAN SIGIMEAN [NOBS]`
//! - 反常强度: `H K L I(+) SIGI(+) I(-) SIGI(-) [N(+) N(-)]`，缺少的一半为 NaN
//!
//! ## 依赖关系
//! - 被 `commands/merge.rs` 调用
//! - 使用 `parsers/mtz.rs` 的 MtzTable

use crate::error::{HklError, Result};
use crate::intensities::store::Intensities;
use crate::models::{DataType, FriedelSign};
use crate::parsers::mtz::{MtzDataset, MtzTable};

impl<'a> Intensities<'a> {
    /// 生成合并数据的 MTZ 表格，需要已合并且已排序
    pub fn prepare_merged_mtz(&self, with_nobs: bool) -> Result<MtzTable> {
        let operation = "export";
        self.require_merged(operation)?;
        self.require_sorted(operation)?;

        let mut mtz = MtzTable::new("");
        mtz.title = format!("merged {} data", self.type_str());
        mtz.spacegroup = self.spacegroup.as_deref().map(|sg| sg.xhm.clone());
        mtz.cell = self.unit_cell;
        mtz.datasets.push(MtzDataset {
            id: 1,
            project: "hklmerge".to_string(),
            crystal: "crystal".to_string(),
            dataset: "merged".to_string(),
            wavelength: self.wavelength,
        });
        if let Some(sg) = self.spacegroup.as_deref() {
            mtz.symops = sg.operations().ops;
        }
        for label in ["H", "K", "L"] {
            mtz.add_column(label, 'H', 0);
        }

        match self.data_type {
            DataType::Mean => {
                mtz.add_column("IMEAN", 'J', 1);
                mtz.add_column("SIGIMEAN", 'Q', 1);
                if with_nobs {
                    mtz.add_column("NOBS", 'I', 1);
                }
                for refl in &self.data {
                    let mut row = vec![
                        refl.hkl[0] as f64,
                        refl.hkl[1] as f64,
                        refl.hkl[2] as f64,
                        refl.value,
                        refl.sigma,
                    ];
                    if with_nobs {
                        row.push(refl.nobs as f64);
                    }
                    mtz.push_row(&row);
                }
            }
            DataType::Anomalous => {
                for (label, kind) in [("I(+)", 'K'), ("SIGI(+)", 'M'), ("I(-)", 'K'), ("SIGI(-)", 'M')] {
                    mtz.add_column(label, kind, 1);
                }
                if with_nobs {
                    mtz.add_column("N(+)", 'I', 1);
                    mtz.add_column("N(-)", 'I', 1);
                }
                // 排序后同一 hkl 的 I(-) 在 I(+) 之前
                let mut i = 0;
                while i < self.data.len() {
                    let hkl = self.data[i].hkl;
                    let mut plus = (f64::NAN, f64::NAN, f64::NAN);
                    let mut minus = (f64::NAN, f64::NAN, f64::NAN);
                    while i < self.data.len() && self.data[i].hkl == hkl {
                        let refl = &self.data[i];
                        let entry = (refl.value, refl.sigma, refl.nobs as f64);
                        match refl.sign {
                            FriedelSign::Minus => minus = entry,
                            _ => plus = entry,
                        }
                        i += 1;
                    }
                    let mut row = vec![
                        hkl[0] as f64,
                        hkl[1] as f64,
                        hkl[2] as f64,
                        plus.0,
                        plus.1,
                        minus.0,
                        minus.1,
                    ];
                    if with_nobs {
                        row.push(plus.2);
                        row.push(minus.2);
                    }
                    mtz.push_row(&row);
                }
            }
            DataType::Unmerged | DataType::Unknown => {
                return Err(HklError::NotMerged {
                    operation: operation.to_string(),
                    found: self.data_type.to_string(),
                });
            }
        }
        Ok(mtz)
    }
}
