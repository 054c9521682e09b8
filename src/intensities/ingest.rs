//! # 数据读入
//!
//! 把 MTZ / mmCIF / XDS_ASCII 表格中的观测读入 `Intensities`。
//!
//! 所有读入路径都经过 `add_if_valid`：NaN 强度或非正 sigma 的观测被静默丢弃。
//! 已知空间群时，合并数据的指数在读入时约化到不对称单元，
//! 没有 M/ISYM 的未合并数据在读入时计算 isym。
//!
//! ## 请求解析
//! | 请求 | 结果 |
//! |------|------|
//! | Unmerged | 来源必须含未合并数据 |
//! | Mean / Anomalous | 读取对应的列 |
//! | MergedMA | 有平均强度用平均强度，否则反常 |
//! | MergedAM | 有反常强度用反常强度，否则平均 |
//! | UAM | 有未合并数据用未合并数据，否则同 MergedAM |
//!
//! ## 依赖关系
//! - 被 `commands/load.rs` 调用
//! - 使用 `parsers/`, `symmetry/`, `intensities/classify.rs`, `intensities/aniso.rs`

use crate::error::{HklError, Result};
use crate::intensities::classify::check_data_type_under_symmetry;
use crate::intensities::store::Intensities;
use crate::models::{DataRequest, DataType, FriedelSign, Miller};
use crate::parsers::{MtzTable, ReflectionSource, ReflnTable, XdsAscii};
use crate::symmetry::{GroupOps, ReciprocalAsu, SpaceGroup, SpaceGroupRegistry};

use std::borrow::Cow;

const MTZ_UNMERGED: [&str; 3] = ["M/ISYM", "I", "SIGI"];
const MTZ_MEAN: [&str; 2] = ["IMEAN", "SIGIMEAN"];
const MTZ_ANOMALOUS: [&str; 4] = ["I(+)", "SIGI(+)", "I(-)", "SIGI(-)"];
const MTZ_PLAIN: [&str; 2] = ["I", "SIGI"];

const CIF_UNMERGED: [&str; 2] = ["intensity_net", "intensity_sigma"];
const CIF_MEAN: [&str; 2] = ["intensity_meas", "intensity_sigma"];
const CIF_F_SQUARED: [&str; 2] = ["F_squared_meas", "F_squared_sigma"];
const CIF_ANOMALOUS: [&str; 4] = [
    "pdbx_I_plus",
    "pdbx_I_plus_sigma",
    "pdbx_I_minus",
    "pdbx_I_minus_sigma",
];

/// 来源中可用的数据布局
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Availability {
    pub unmerged: bool,
    pub mean: bool,
    pub anomalous: bool,
    /// 只有 I/SIGI 两列、类型由推断得到的合并表格
    pub inferred: bool,
}

impl Availability {
    /// 把请求解析为具体的物理状态
    pub fn resolve(&self, request: DataRequest, source_name: &str) -> Result<DataType> {
        let resolved = match request {
            DataRequest::Unmerged => self.unmerged.then_some(DataType::Unmerged),
            DataRequest::Mean => self.mean.then_some(DataType::Mean),
            DataRequest::Anomalous => self.anomalous.then_some(DataType::Anomalous),
            DataRequest::MergedMA => self.merged_ma(),
            DataRequest::MergedAM => self.merged_am(),
            DataRequest::UAM => {
                if self.unmerged {
                    Some(DataType::Unmerged)
                } else {
                    self.merged_am()
                }
            }
        };
        resolved.ok_or_else(|| {
            HklError::UnsupportedFormat(format!("no {} data in {}", request, source_name))
        })
    }

    fn merged_ma(&self) -> Option<DataType> {
        if self.mean {
            Some(DataType::Mean)
        } else if self.anomalous {
            Some(DataType::Anomalous)
        } else {
            None
        }
    }

    fn merged_am(&self) -> Option<DataType> {
        if self.anomalous {
            Some(DataType::Anomalous)
        } else if self.mean {
            Some(DataType::Mean)
        } else {
            None
        }
    }
}

/// 按名称在注册表中查找空间群，名称缺失时返回 None
pub fn lookup_spacegroup<'r>(
    registry: &'r SpaceGroupRegistry,
    name: Option<&str>,
) -> Result<Option<&'r SpaceGroup>> {
    match name {
        Some(name) if !name.trim().is_empty() => registry.require(name).map(Some),
        _ => Ok(None),
    }
}

/// MTZ 表格的空间群；名称不在注册表中时退回表格的对称操作
pub fn lookup_mtz_spacegroup<'r>(
    registry: &'r SpaceGroupRegistry,
    mtz: &MtzTable,
) -> Result<Option<Cow<'r, SpaceGroup>>> {
    registry.resolve(mtz.spacegroup.as_deref(), &mtz.symops)
}

fn has_columns(mtz: &MtzTable, labels: &[&str]) -> bool {
    labels.iter().all(|l| mtz.column_index(l).is_some())
}

fn has_tags(rb: &ReflnTable, tags: &[&str]) -> bool {
    tags.iter().all(|t| rb.find_column(t).is_some())
}

/// MTZ 表格中可用的数据布局
///
/// 只有 I/SIGI 的合并表格需要空间群来推断类型。
pub fn mtz_availability(mtz: &MtzTable, spacegroup: Option<&SpaceGroup>) -> Result<Availability> {
    let mut avail = Availability {
        unmerged: has_columns(mtz, &MTZ_UNMERGED),
        mean: has_columns(mtz, &MTZ_MEAN),
        anomalous: has_columns(mtz, &MTZ_ANOMALOUS),
        inferred: false,
    };
    if mtz.is_merged() && !avail.mean && !avail.anomalous && has_columns(mtz, &MTZ_PLAIN) {
        if spacegroup.is_none() {
            return Err(HklError::MissingSpaceGroup(format!(
                "inferring the data type of I/SIGI columns in {}",
                mtz.source_path
            )));
        }
        avail.inferred = true;
        match check_data_type_under_symmetry(mtz, spacegroup).0 {
            DataType::Unmerged => avail.unmerged = true,
            DataType::Mean => avail.mean = true,
            DataType::Anomalous => avail.anomalous = true,
            DataType::Unknown => {}
        }
    }
    Ok(avail)
}

pub fn mmcif_availability(rb: &ReflnTable) -> Availability {
    Availability {
        unmerged: rb.is_unmerged() && has_tags(rb, &CIF_UNMERGED),
        mean: has_tags(rb, &CIF_MEAN) || has_tags(rb, &CIF_F_SQUARED),
        anomalous: has_tags(rb, &CIF_ANOMALOUS),
        inferred: false,
    }
}

pub fn xds_availability(xds: &XdsAscii) -> Availability {
    Availability {
        unmerged: !xds.merged,
        mean: xds.merged && xds.friedel_law,
        anomalous: xds.merged && !xds.friedel_law,
        inferred: false,
    }
}

impl<'a> Intensities<'a> {
    // ─────────────────────────────────────────────────────────────
    // 共用
    // ─────────────────────────────────────────────────────────────

    /// 已知空间群时约化指数；未合并数据同时计算 isym
    fn add_reduced(
        &mut self,
        asu: Option<&ReciprocalAsu>,
        target: DataType,
        hkl: Miller,
        value: f64,
        sigma: f64,
    ) -> Result<()> {
        match (target, asu) {
            (DataType::Unmerged, Some(asu)) => {
                let (asu_hkl, isym) = asu.to_asu_isym(&hkl);
                self.add_if_valid(asu_hkl, FriedelSign::None, isym, value, sigma);
            }
            (DataType::Unmerged, None) => {
                self.add_if_valid(hkl, FriedelSign::None, 0, value, sigma);
            }
            (DataType::Mean, asu) => {
                let asu_hkl = asu.map_or(hkl, |a| a.to_asu_sign(&hkl).0);
                self.add_if_valid(asu_hkl, FriedelSign::None, 0, value, sigma);
            }
            (DataType::Anomalous, Some(asu)) => {
                let (asu_hkl, positive) = asu.to_asu_sign(&hkl);
                self.add_if_valid(asu_hkl, FriedelSign::from_orientation(positive), 0, value, sigma);
            }
            (DataType::Anomalous, None) => {
                return Err(HklError::MissingSpaceGroup(
                    "reading one Friedel mate per row".to_string(),
                ));
            }
            (DataType::Unknown, _) => {
                return Err(HklError::InvalidRequest(
                    "cannot read data of unknown type".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// 一行中的 I(+) 与 I(-)
    ///
    /// 中心衍射点只保留 I(+)。完整性检查只对非中心对称空间群中的非中心衍射点生效。
    fn add_anomalous_pair(
        &mut self,
        gops: Option<&GroupOps>,
        hkl: Miller,
        plus: (f64, f64),
        minus: (f64, f64),
        check_complete: bool,
        source_name: &str,
    ) -> Result<()> {
        let centric = gops.is_some_and(|g| g.is_reflection_centric(&hkl));
        let centrosymmetric = gops.is_some_and(|g| g.is_centrosymmetric());
        if check_complete && !centrosymmetric && !centric && plus.0.is_nan() != minus.0.is_nan() {
            return Err(HklError::IncompleteFriedelPair {
                hkl,
                source_name: source_name.to_string(),
            });
        }
        match gops {
            Some(gops) => {
                let (asu_hkl, positive) = ReciprocalAsu::new(gops).to_asu_sign(&hkl);
                self.add_if_valid(asu_hkl, FriedelSign::from_orientation(positive), 0, plus.0, plus.1);
                if !centric {
                    self.add_if_valid(asu_hkl, FriedelSign::from_orientation(!positive), 0, minus.0, minus.1);
                }
            }
            None => {
                self.add_if_valid(hkl, FriedelSign::Plus, 0, plus.0, plus.1);
                self.add_if_valid(hkl, FriedelSign::Minus, 0, minus.0, minus.1);
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // MTZ
    // ─────────────────────────────────────────────────────────────

    fn copy_mtz_metadata(&mut self, registry: &'a SpaceGroupRegistry, mtz: &MtzTable) -> Result<()> {
        self.ensure_empty()?;
        self.spacegroup = lookup_mtz_spacegroup(registry, mtz)?;
        self.unit_cell = mtz.cell;
        self.wavelength = mtz.wavelength();
        Ok(())
    }

    /// M/ISYM, I, SIGI；isym 按原样保存，由合并时解码
    pub fn read_unmerged_intensities_from_mtz(
        &mut self,
        registry: &'a SpaceGroupRegistry,
        mtz: &MtzTable,
    ) -> Result<()> {
        self.copy_mtz_metadata(registry, mtz)?;
        let [c_isym, c_i, c_sig] = MTZ_UNMERGED.map(|l| mtz.require_column(l));
        let (c_isym, c_i, c_sig) = (c_isym?, c_i?, c_sig?);

        self.isym_ops = if mtz.symops.is_empty() {
            self.spacegroup
                .as_deref()
                .map(|sg| sg.operations().ops)
                .unwrap_or_default()
        } else {
            mtz.symops.clone()
        };

        let stride = mtz.ncols();
        for n in 0..mtz.nreflections() {
            let row = mtz.row(n);
            // M/ISYM = 256 * M + ISYM
            let isym = (row[c_isym] as i32).rem_euclid(256) as i8;
            self.add_if_valid(mtz.get_hkl(n * stride), FriedelSign::None, isym, row[c_i], row[c_sig]);
        }
        self.data_type = DataType::Unmerged;
        Ok(())
    }

    /// IMEAN, SIGIMEAN
    pub fn read_mean_intensities_from_mtz(
        &mut self,
        registry: &'a SpaceGroupRegistry,
        mtz: &MtzTable,
    ) -> Result<()> {
        self.copy_mtz_metadata(registry, mtz)?;
        let [c_i, c_sig] = MTZ_MEAN.map(|l| mtz.require_column(l));
        let (c_i, c_sig) = (c_i?, c_sig?);
        let gops = self.spacegroup.as_deref().map(SpaceGroup::operations);
        let asu = gops.as_ref().map(ReciprocalAsu::new);

        let stride = mtz.ncols();
        for n in 0..mtz.nreflections() {
            let row = mtz.row(n);
            self.add_reduced(asu.as_ref(), DataType::Mean, mtz.get_hkl(n * stride), row[c_i], row[c_sig])?;
        }
        self.data_type = DataType::Mean;
        Ok(())
    }

    /// I(+), SIGI(+), I(-), SIGI(-)
    pub fn read_anomalous_intensities_from_mtz(
        &mut self,
        registry: &'a SpaceGroupRegistry,
        mtz: &MtzTable,
        check_complete: bool,
    ) -> Result<()> {
        self.copy_mtz_metadata(registry, mtz)?;
        let mut cols = [0usize; 4];
        for (col, label) in cols.iter_mut().zip(MTZ_ANOMALOUS) {
            *col = mtz.require_column(label)?;
        }
        let [cp, csp, cm, csm] = cols;
        let gops = self.spacegroup.as_deref().map(SpaceGroup::operations);

        let stride = mtz.ncols();
        for n in 0..mtz.nreflections() {
            let row = mtz.row(n);
            self.add_anomalous_pair(
                gops.as_ref(),
                mtz.get_hkl(n * stride),
                (row[cp], row[csp]),
                (row[cm], row[csm]),
                check_complete,
                &mtz.source_path,
            )?;
        }
        self.data_type = DataType::Anomalous;
        Ok(())
    }

    /// 只有 I/SIGI 的表格，按推断出的类型读入
    fn read_inferred_intensities_from_mtz(
        &mut self,
        registry: &'a SpaceGroupRegistry,
        mtz: &MtzTable,
        target: DataType,
    ) -> Result<()> {
        self.copy_mtz_metadata(registry, mtz)?;
        let [c_i, c_sig] = MTZ_PLAIN.map(|l| mtz.require_column(l));
        let (c_i, c_sig) = (c_i?, c_sig?);
        let gops = self.group_ops("reading I/SIGI columns")?;
        let asu = ReciprocalAsu::new(&gops);

        let stride = mtz.ncols();
        for n in 0..mtz.nreflections() {
            let row = mtz.row(n);
            self.add_reduced(Some(&asu), target, mtz.get_hkl(n * stride), row[c_i], row[c_sig])?;
        }
        if target == DataType::Unmerged {
            self.isym_ops = gops.ops.clone();
        }
        self.data_type = target;
        Ok(())
    }

    /// 按请求读取 MTZ，并取出 STARANISO 张量
    pub fn read_mtz(
        &mut self,
        registry: &'a SpaceGroupRegistry,
        mtz: &MtzTable,
        request: DataRequest,
        check_complete: bool,
    ) -> Result<()> {
        let sg = lookup_mtz_spacegroup(registry, mtz)?;
        let avail = mtz_availability(mtz, sg.as_deref())?;
        let target = avail.resolve(request, &mtz.source_path)?;
        if avail.inferred {
            self.read_inferred_intensities_from_mtz(registry, mtz, target)?;
        } else {
            match target {
                DataType::Unmerged => self.read_unmerged_intensities_from_mtz(registry, mtz)?,
                DataType::Mean => self.read_mean_intensities_from_mtz(registry, mtz)?,
                DataType::Anomalous => {
                    self.read_anomalous_intensities_from_mtz(registry, mtz, check_complete)?
                }
                DataType::Unknown => {}
            }
        }
        self.take_staraniso_b_from_mtz(mtz)?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // mmCIF
    // ─────────────────────────────────────────────────────────────

    fn copy_mmcif_metadata(&mut self, registry: &'a SpaceGroupRegistry, rb: &ReflnTable) -> Result<()> {
        self.ensure_empty()?;
        self.spacegroup =
            lookup_spacegroup(registry, rb.spacegroup.as_deref())?.map(Cow::Borrowed);
        self.unit_cell = rb.cell;
        self.wavelength = rb.wavelength;
        let esd_keys = [
            "_cell.length_a_esd",
            "_cell.length_b_esd",
            "_cell.length_c_esd",
            "_cell.angle_alpha_esd",
            "_cell.angle_beta_esd",
            "_cell.angle_gamma_esd",
        ];
        for (i, key) in esd_keys.iter().enumerate() {
            self.unit_cell_rmsd[i] = rb.item_value(key).unwrap_or(0.0);
        }
        Ok(())
    }

    fn read_mmcif_columns(
        &mut self,
        registry: &'a SpaceGroupRegistry,
        rb: &ReflnTable,
        tags: [&str; 2],
        target: DataType,
    ) -> Result<()> {
        self.copy_mmcif_metadata(registry, rb)?;
        let c_i = rb.require_column(tags[0])?;
        let c_sig = rb.require_column(tags[1])?;
        let gops = self.spacegroup.as_deref().map(SpaceGroup::operations);
        let asu = gops.as_ref().map(ReciprocalAsu::new);

        for n in 0..rb.len() {
            self.add_reduced(
                asu.as_ref(),
                target,
                rb.hkl[n],
                rb.value_or_nan(n, c_i),
                rb.value_or_nan(n, c_sig),
            )?;
        }
        if target == DataType::Unmerged {
            if let Some(gops) = gops {
                self.isym_ops = gops.ops;
            }
        }
        self.data_type = target;
        Ok(())
    }

    /// `_diffrn_refln.intensity_net` / `intensity_sigma`
    pub fn read_unmerged_intensities_from_mmcif(
        &mut self,
        registry: &'a SpaceGroupRegistry,
        rb: &ReflnTable,
    ) -> Result<()> {
        self.read_mmcif_columns(registry, rb, CIF_UNMERGED, DataType::Unmerged)
    }

    /// `_refln.intensity_meas` / `intensity_sigma`
    pub fn read_mean_intensities_from_mmcif(
        &mut self,
        registry: &'a SpaceGroupRegistry,
        rb: &ReflnTable,
    ) -> Result<()> {
        self.read_mmcif_columns(registry, rb, CIF_MEAN, DataType::Mean)
    }

    /// `_refln.F_squared_meas` / `F_squared_sigma`，作为平均强度
    pub fn read_f_squared_from_mmcif(
        &mut self,
        registry: &'a SpaceGroupRegistry,
        rb: &ReflnTable,
    ) -> Result<()> {
        self.read_mmcif_columns(registry, rb, CIF_F_SQUARED, DataType::Mean)
    }

    /// `_refln.pdbx_I_plus` 等四列
    pub fn read_anomalous_intensities_from_mmcif(
        &mut self,
        registry: &'a SpaceGroupRegistry,
        rb: &ReflnTable,
        check_complete: bool,
    ) -> Result<()> {
        self.copy_mmcif_metadata(registry, rb)?;
        let mut cols = [0usize; 4];
        for (col, tag) in cols.iter_mut().zip(CIF_ANOMALOUS) {
            *col = rb.require_column(tag)?;
        }
        let gops = self.spacegroup.as_deref().map(SpaceGroup::operations);

        for n in 0..rb.len() {
            self.add_anomalous_pair(
                gops.as_ref(),
                rb.hkl[n],
                (rb.value_or_nan(n, cols[0]), rb.value_or_nan(n, cols[1])),
                (rb.value_or_nan(n, cols[2]), rb.value_or_nan(n, cols[3])),
                check_complete,
                &rb.source_path,
            )?;
        }
        self.data_type = DataType::Anomalous;
        Ok(())
    }

    /// 按请求读取 mmCIF 数据块，并取出 STARANISO 张量
    pub fn read_mmcif(
        &mut self,
        registry: &'a SpaceGroupRegistry,
        rb: &ReflnTable,
        request: DataRequest,
        check_complete: bool,
    ) -> Result<()> {
        match mmcif_availability(rb).resolve(request, &rb.source_path)? {
            DataType::Unmerged => self.read_unmerged_intensities_from_mmcif(registry, rb)?,
            DataType::Mean => {
                if has_tags(rb, &CIF_MEAN) {
                    self.read_mean_intensities_from_mmcif(registry, rb)?
                } else {
                    self.read_f_squared_from_mmcif(registry, rb)?
                }
            }
            DataType::Anomalous => {
                self.read_anomalous_intensities_from_mmcif(registry, rb, check_complete)?
            }
            DataType::Unknown => {}
        }
        self.take_staraniso_b_from_mmcif(rb);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // XDS_ASCII
    // ─────────────────────────────────────────────────────────────

    /// MERGE=FALSE 读为未合并数据；MERGE=TRUE 按 FRIEDEL'S_LAW 读为平均或反常强度
    pub fn read_xds(&mut self, registry: &'a SpaceGroupRegistry, xds: &XdsAscii) -> Result<()> {
        self.ensure_empty()?;
        self.spacegroup = match xds.spacegroup_number {
            0 => None,
            number => Some(Cow::Borrowed(
                registry
                    .get_by_number(number)
                    .ok_or_else(|| HklError::UnknownSpaceGroup(number.to_string()))?,
            )),
        };
        self.unit_cell = xds.cell;
        self.wavelength = xds.wavelength;
        self.friedel_law = xds.friedel_law;

        let target = if !xds.merged {
            DataType::Unmerged
        } else if xds.friedel_law {
            DataType::Mean
        } else {
            DataType::Anomalous
        };
        let gops = self.spacegroup.as_deref().map(SpaceGroup::operations);
        let asu = gops.as_ref().map(ReciprocalAsu::new);
        for refl in &xds.data {
            self.add_reduced(asu.as_ref(), target, refl.hkl, refl.iobs, refl.sigma)?;
        }
        if target == DataType::Unmerged {
            if let Some(gops) = gops {
                self.isym_ops = gops.ops;
            }
        }
        self.data_type = target;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // 统一入口
    // ─────────────────────────────────────────────────────────────

    pub fn read_source(
        &mut self,
        registry: &'a SpaceGroupRegistry,
        source: &ReflectionSource,
        request: DataRequest,
        check_complete: bool,
    ) -> Result<()> {
        match source {
            ReflectionSource::Mtz(mtz) => self.read_mtz(registry, mtz, request, check_complete),
            ReflectionSource::Mmcif(rb) => self.read_mmcif(registry, rb, request, check_complete),
            ReflectionSource::Xds(xds) => {
                xds_availability(xds).resolve(request, &xds.source_path)?;
                self.read_xds(registry, xds)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::mmcif::parse_refln_csv;
    use crate::parsers::mtz::parse_mtz_csv;
    use crate::parsers::xds::parse_xds_ascii;

    fn registry() -> SpaceGroupRegistry {
        SpaceGroupRegistry::standard().unwrap()
    }

    #[test]
    fn test_resolve_requests() {
        let merged_both = Availability {
            mean: true,
            anomalous: true,
            ..Default::default()
        };
        assert_eq!(merged_both.resolve(DataRequest::MergedMA, "x").unwrap(), DataType::Mean);
        assert_eq!(merged_both.resolve(DataRequest::MergedAM, "x").unwrap(), DataType::Anomalous);
        assert_eq!(merged_both.resolve(DataRequest::UAM, "x").unwrap(), DataType::Anomalous);
        assert!(merged_both.resolve(DataRequest::Unmerged, "x").is_err());

        let mean_only = Availability {
            mean: true,
            ..Default::default()
        };
        assert_eq!(mean_only.resolve(DataRequest::MergedAM, "x").unwrap(), DataType::Mean);
        assert!(mean_only.resolve(DataRequest::Anomalous, "x").is_err());

        let unmerged = Availability {
            unmerged: true,
            ..Default::default()
        };
        assert_eq!(unmerged.resolve(DataRequest::UAM, "x").unwrap(), DataType::Unmerged);
    }

    #[test]
    fn test_unmerged_mtz_filters_invalid_sigma() {
        let text = "\
# spacegroup: P 21 21 21
H,K,L,M/ISYM,I,SIGI
1,2,3,1,10.0,1.0
1,2,3,1,11.0,-1.0
1,2,3,1,12.0,0.0
";
        let mtz = parse_mtz_csv(text, "u.csv").unwrap();
        let registry = registry();
        let mut intensities = Intensities::new();
        intensities.read_mtz(&registry, &mtz, DataRequest::Unmerged, false).unwrap();
        assert_eq!(intensities.data_type, DataType::Unmerged);
        assert_eq!(intensities.len(), 1);
        assert_eq!(intensities.data[0].sigma, 1.0);
        assert_eq!(intensities.data[0].isym, 1);
        assert_eq!(intensities.isym_ops.len(), 4);
    }

    #[test]
    fn test_anomalous_mtz_check_complete() {
        let text = "\
# spacegroup: P 21 21 21
H,K,L,I(+),SIGI(+),I(-),SIGI(-)
1,2,3,10.0,1.0,?,?
";
        let mtz = parse_mtz_csv(text, "a.csv").unwrap();
        let registry = registry();

        let mut strict = Intensities::new();
        let err = strict.read_mtz(&registry, &mtz, DataRequest::Anomalous, true);
        assert!(matches!(err, Err(HklError::IncompleteFriedelPair { hkl: [1, 2, 3], .. })));

        let mut lenient = Intensities::new();
        lenient.read_mtz(&registry, &mtz, DataRequest::Anomalous, false).unwrap();
        assert_eq!(lenient.len(), 1);
        assert_eq!(lenient.data[0].sign, FriedelSign::Plus);
    }

    #[test]
    fn test_centric_reflection_passes_check() {
        // (1,2,0) 在 P 21 21 21 中是中心衍射点
        let text = "\
# spacegroup: P 21 21 21
H,K,L,I(+),SIGI(+),I(-),SIGI(-)
1,2,0,10.0,1.0,?,?
";
        let mtz = parse_mtz_csv(text, "c.csv").unwrap();
        let registry = registry();
        let mut intensities = Intensities::new();
        intensities.read_mtz(&registry, &mtz, DataRequest::Anomalous, true).unwrap();
        assert_eq!(intensities.len(), 1);
    }

    #[test]
    fn test_mean_never_stores_sign() {
        let text = "\
# spacegroup: P 1
H,K,L,IMEAN,SIGIMEAN,I(+),SIGI(+),I(-),SIGI(-)
1,2,3,10.0,1.0,11.0,1.0,9.0,1.0
";
        let mtz = parse_mtz_csv(text, "m.csv").unwrap();
        let registry = registry();
        let mut intensities = Intensities::new();
        intensities.read_mtz(&registry, &mtz, DataRequest::MergedMA, false).unwrap();
        assert_eq!(intensities.data_type, DataType::Mean);
        assert!(intensities.data.iter().all(|r| r.sign == FriedelSign::None));

        let mut anomalous = Intensities::new();
        anomalous.read_mtz(&registry, &mtz, DataRequest::MergedAM, false).unwrap();
        assert_eq!(anomalous.data_type, DataType::Anomalous);
        assert_eq!(anomalous.len(), 2);
    }

    #[test]
    fn test_inferred_mtz_types() {
        let registry = registry();
        let unmerged = "# spacegroup: P 21 21 21\nH,K,L,I,SIGI\n1,2,3,10,1\n-1,-2,3,12,1\n";
        let mtz = parse_mtz_csv(unmerged, "p.csv").unwrap();
        let mut intensities = Intensities::new();
        intensities.read_mtz(&registry, &mtz, DataRequest::UAM, false).unwrap();
        assert_eq!(intensities.data_type, DataType::Unmerged);
        assert_eq!(intensities.data[0].hkl, intensities.data[1].hkl);
        assert_ne!(intensities.data[0].isym, 0);

        let anomalous = "# spacegroup: P 21 21 21\nH,K,L,I,SIGI\n1,2,3,10,1\n-1,-2,-3,12,1\n";
        let mtz = parse_mtz_csv(anomalous, "p.csv").unwrap();
        let mut intensities = Intensities::new();
        intensities.read_mtz(&registry, &mtz, DataRequest::MergedAM, false).unwrap();
        assert_eq!(intensities.data_type, DataType::Anomalous);
        intensities.sort();
        assert_eq!(intensities.data[0].sign, FriedelSign::Minus);
        assert_eq!(intensities.data[1].sign, FriedelSign::Plus);

        let no_sg = parse_mtz_csv("H,K,L,I,SIGI\n1,2,3,10,1\n", "p.csv").unwrap();
        let mut intensities = Intensities::new();
        assert!(matches!(
            intensities.read_mtz(&registry, &no_sg, DataRequest::MergedAM, false),
            Err(HklError::MissingSpaceGroup(_))
        ));
    }

    #[test]
    fn test_store_must_be_empty() {
        let registry = registry();
        let mtz = parse_mtz_csv("H,K,L,IMEAN,SIGIMEAN\n1,2,3,10,1\n", "m.csv").unwrap();
        let mut intensities = Intensities::new();
        intensities.read_mtz(&registry, &mtz, DataRequest::Mean, false).unwrap();
        assert!(intensities.read_mtz(&registry, &mtz, DataRequest::Mean, false).is_err());
    }

    #[test]
    fn test_mmcif_readers() {
        let registry = registry();
        let text = "\
# spacegroup: P 1 21 1
# cell: 30 40 50 90 100 90
_refln.index_h,_refln.index_k,_refln.index_l,_refln.F_squared_meas,_refln.F_squared_sigma
1,0,2,150.1,12.0
1,1,2,?,.
";
        let rb = parse_refln_csv(text, "f.csv", "f").unwrap();
        let mut intensities = Intensities::new();
        intensities.read_mmcif(&registry, &rb, DataRequest::MergedMA, false).unwrap();
        assert_eq!(intensities.data_type, DataType::Mean);
        assert_eq!(intensities.len(), 1);
        assert_eq!(intensities.spacegroup_str(), "P 1 21 1");

        let unmerged = "\
# spacegroup: P 1 21 1
_diffrn_refln.index_h,_diffrn_refln.index_k,_diffrn_refln.index_l,_diffrn_refln.intensity_net,_diffrn_refln.intensity_sigma
1,2,3,5.0,1.0
-1,2,-3,6.0,1.0
";
        let rb = parse_refln_csv(unmerged, "u.csv", "u").unwrap();
        let mut intensities = Intensities::new();
        intensities.read_mmcif(&registry, &rb, DataRequest::UAM, false).unwrap();
        assert_eq!(intensities.data_type, DataType::Unmerged);
        assert_eq!(intensities.data[0].hkl, intensities.data[1].hkl);
        assert_eq!(intensities.isym_ops.len(), 2);
    }

    #[test]
    fn test_read_xds() {
        let registry = registry();
        let text = "\
!FORMAT=XDS_ASCII    MERGE=FALSE    FRIEDEL'S_LAW=TRUE
!SPACE_GROUP_NUMBER=   19
!UNIT_CELL_CONSTANTS=    50.0    60.0    70.0  90.000  90.000  90.000
!ITEM_H=1
!ITEM_K=2
!ITEM_L=3
!ITEM_IOBS=4
!ITEM_SIGMA(IOBS)=5
!END_OF_HEADER
     1     2     3  1.000E+01  1.0E+00
    -1    -2     3  1.200E+01  1.0E+00
     2     0     0  3.000E+00 -1.0E+00
!END_OF_DATA
";
        let xds = parse_xds_ascii(text, "XDS_ASCII.HKL").unwrap();
        let source = ReflectionSource::Xds(xds);
        let mut intensities = Intensities::new();
        assert!(intensities.read_source(&registry, &source, DataRequest::Mean, false).is_err());
        intensities.read_source(&registry, &source, DataRequest::UAM, false).unwrap();
        assert_eq!(intensities.data_type, DataType::Unmerged);
        // 负 sigma 被丢弃
        assert_eq!(intensities.len(), 2);
        assert_eq!(intensities.spacegroup.as_deref().map(|sg| sg.number), Some(19));
    }

    #[test]
    fn test_xds_common_protein_groups() {
        let registry = registry();
        let cases = [
            (146, 9),
            (155, 18),
            (169, 6),
            (170, 6),
            (178, 12),
            (179, 12),
            (94, 8),
            (91, 8),
            (95, 8),
            (182, 12),
        ];
        for (number, order) in cases {
            let text = format!(
                "\
!FORMAT=XDS_ASCII    MERGE=FALSE    FRIEDEL'S_LAW=FALSE
!SPACE_GROUP_NUMBER= {}
!UNIT_CELL_CONSTANTS=    60.0    60.0    90.0  90.000  90.000 120.000
!ITEM_H=1
!ITEM_K=2
!ITEM_L=3
!ITEM_IOBS=4
!ITEM_SIGMA(IOBS)=5
!END_OF_HEADER
     1     2     3  1.000E+01  1.0E+00
!END_OF_DATA
",
                number
            );
            let source = ReflectionSource::Xds(parse_xds_ascii(&text, "XDS_ASCII.HKL").unwrap());
            let mut intensities = Intensities::new();
            intensities.read_source(&registry, &source, DataRequest::UAM, false).unwrap();
            assert_eq!(intensities.spacegroup.as_deref().map(|sg| sg.number), Some(number));
            assert_eq!(intensities.isym_ops.len(), order, "{}", number);
            assert!(!intensities.friedel_law);
        }
    }

    #[test]
    fn test_mtz_symops_stand_in_for_unknown_name() {
        let registry = registry();
        let text = "\
# spacegroup: P 1 1 21
# symop: x,y,z
# symop: -x,-y,z+1/2
H,K,L,IMEAN,SIGIMEAN
1,2,3,10,1
0,0,1,5,1
";
        let mtz = parse_mtz_csv(text, "c_unique.csv").unwrap();
        let mut intensities = Intensities::new();
        intensities.read_mtz(&registry, &mtz, DataRequest::Mean, false).unwrap();
        assert_eq!(intensities.spacegroup_str(), "P 1 1 21");
        assert_eq!(intensities.group_ops("test").unwrap().order(), 2);
        // 0 0 l 只有 l 为偶数时出现
        assert_eq!(intensities.remove_systematic_absences(), 1);
        assert_eq!(intensities.len(), 1);

        let text = "# spacegroup: P 1 1 21\nH,K,L,IMEAN,SIGIMEAN\n1,2,3,10,1\n";
        let unknown = parse_mtz_csv(text, "x.csv").unwrap();
        let mut intensities = Intensities::new();
        assert!(matches!(
            intensities.read_mtz(&registry, &unknown, DataRequest::Mean, false),
            Err(HklError::UnknownSpaceGroup(_))
        ));
    }
}
