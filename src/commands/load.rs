//! # 读入流水线
//!
//! 各子命令共用的读入步骤：
//!
//! ```text
//! 读取文件 ─► 覆盖元数据 ─► read_source ─► [去系统消光] ─► [各向异性校正]
//!          ─► [switch_to_asu_indices] ─► sort ─► [merge_in_place]
//! ```
//!
//! 来源为未合并数据而请求为合并数据时，先按未合并读入再合并。
//!
//! ## 依赖关系
//! - 被 `commands/merge.rs`, `commands/analyze/` 调用
//! - 使用 `parsers/`, `intensities/`, `symmetry/`

use crate::cli::input::InputOptions;
use crate::error::Result;
use crate::intensities::ingest::mtz_availability;
use crate::intensities::{lookup_mtz_spacegroup, Intensities, MergeWeighting};
use crate::models::{DataRequest, DataType, UnitCell};
use crate::parsers::mtz::MtzDataset;
use crate::parsers::{self, ReflectionSource};
use crate::stats::MergingR;
use crate::symmetry::SpaceGroupRegistry;

use std::path::Path;

/// 读入选项
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub request: DataRequest,
    pub weighting: MergeWeighting,
    pub check_complete: bool,
    pub keep_absences: bool,
    pub aniso_correct: bool,
}

impl LoadOptions {
    pub fn new(request: DataRequest) -> Self {
        Self {
            request,
            weighting: MergeWeighting::default(),
            check_complete: false,
            keep_absences: false,
            aniso_correct: false,
        }
    }
}

/// 读入结果
#[derive(Debug)]
pub struct Loaded<'a> {
    pub intensities: Intensities<'a>,
    pub format: &'static str,
    /// 删除的系统消光记录数
    pub absences: usize,
    /// 读入后合并时的总体统计
    pub merge_stats: Option<MergingR>,
    /// 应用了各向异性校正
    pub aniso_applied: bool,
}

/// 用命令行参数覆盖来源表格中的元数据
pub fn apply_overrides(
    registry: &SpaceGroupRegistry,
    source: &mut ReflectionSource,
    options: &InputOptions,
) -> Result<()> {
    let cell = options.cell.as_deref().map(UnitCell::parse).transpose()?;
    let spacegroup = options
        .spacegroup
        .as_deref()
        .map(|name| registry.require(name))
        .transpose()?;

    match source {
        ReflectionSource::Mtz(mtz) => {
            if let Some(sg) = spacegroup {
                mtz.spacegroup = Some(sg.xhm.clone());
            }
            if let Some(cell) = cell {
                mtz.cell = cell;
            }
            if let Some(wavelength) = options.wavelength {
                if mtz.datasets.is_empty() {
                    mtz.datasets.push(MtzDataset {
                        id: 1,
                        project: String::new(),
                        crystal: String::new(),
                        dataset: String::new(),
                        wavelength,
                    });
                }
                for dataset in &mut mtz.datasets {
                    dataset.wavelength = wavelength;
                }
            }
        }
        ReflectionSource::Mmcif(rb) => {
            if let Some(sg) = spacegroup {
                rb.spacegroup = Some(sg.xhm.clone());
            }
            if let Some(cell) = cell {
                rb.cell = cell;
            }
            if let Some(wavelength) = options.wavelength {
                rb.wavelength = wavelength;
            }
        }
        ReflectionSource::Xds(xds) => {
            if let Some(sg) = spacegroup {
                xds.spacegroup_number = sg.number;
            }
            if let Some(cell) = cell {
                xds.cell = cell;
            }
            if let Some(wavelength) = options.wavelength {
                xds.wavelength = wavelength;
            }
        }
    }
    Ok(())
}

/// 读入一个文件并走完整个读入流水线
pub fn load_intensities<'a>(
    registry: &'a SpaceGroupRegistry,
    path: &Path,
    input: &InputOptions,
    options: LoadOptions,
) -> Result<Loaded<'a>> {
    let mut source = parsers::read_source_file(path)?;
    apply_overrides(registry, &mut source, input)?;
    load_from_source(registry, &source, options)
}

/// 来源是否只含未合并数据
///
/// 只有 I/SIGI 的 MTZ 表格按推断的类型判断。
fn holds_unmerged(registry: &SpaceGroupRegistry, source: &ReflectionSource) -> Result<bool> {
    match source {
        ReflectionSource::Mtz(mtz) => {
            let spacegroup = lookup_mtz_spacegroup(registry, mtz)?;
            let avail = mtz_availability(mtz, spacegroup.as_deref())?;
            Ok(avail.unmerged && !avail.mean && !avail.anomalous)
        }
        other => Ok(other.is_unmerged()),
    }
}

/// 对已读取的来源执行读入流水线
pub fn load_from_source<'a>(
    registry: &'a SpaceGroupRegistry,
    source: &ReflectionSource,
    options: LoadOptions,
) -> Result<Loaded<'a>> {
    let merge_after_read = options.request.wants_merged() && holds_unmerged(registry, source)?;
    let read_request = if merge_after_read {
        DataRequest::Unmerged
    } else {
        options.request
    };

    let mut intensities = Intensities::new();
    intensities.read_source(registry, source, read_request, options.check_complete)?;

    let absences = if options.keep_absences {
        0
    } else {
        intensities.remove_systematic_absences()
    };

    let aniso_applied = options.aniso_correct && intensities.staraniso_b.ok();
    if aniso_applied {
        intensities.apply_aniso_correction()?;
    }

    // 未合并数据的 isym 统一按空间群自身的操作编码
    if intensities.data_type == DataType::Unmerged && intensities.spacegroup.is_some() {
        intensities.switch_to_asu_indices()?;
    }
    intensities.sort();

    let merge_stats = if merge_after_read {
        Some(intensities.merge_in_place(options.request, options.weighting)?)
    } else {
        None
    };

    Ok(Loaded {
        intensities,
        format: source.format_name(),
        absences,
        merge_stats,
        aniso_applied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::mtz::parse_mtz_csv;
    use crate::parsers::xds::parse_xds_ascii;
    use crate::symmetry::Op;

    const XDS_UNMERGED: &str = "\
!FORMAT=XDS_ASCII    MERGE=FALSE    FRIEDEL'S_LAW=TRUE
!SPACE_GROUP_NUMBER=   19
!UNIT_CELL_CONSTANTS=    50.0    60.0    70.0  90.000  90.000  90.000
!X-RAY_WAVELENGTH=  0.97950
!NUMBER_OF_ITEMS_IN_EACH_DATA_RECORD=5
!ITEM_H=1
!ITEM_K=2
!ITEM_L=3
!ITEM_IOBS=4
!ITEM_SIGMA(IOBS)=5
!END_OF_HEADER
     1     2     3  1.000E+01  1.000E+00
    -1     2     3  1.200E+01  1.000E+00
     1    -2     3  1.100E+01  1.000E+00
     0     0     3  5.000E+00  1.000E+00
     2     0     0  7.000E+00  1.000E+00
!END_OF_DATA
";

    #[test]
    fn test_unmerged_source_is_merged_on_request() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let source = ReflectionSource::Xds(parse_xds_ascii(XDS_UNMERGED, "XDS_ASCII.HKL").unwrap());
        let loaded = load_from_source(&registry, &source, LoadOptions::new(DataRequest::Mean)).unwrap();

        // 0 0 3 在 P 21 21 21 中系统消光
        assert_eq!(loaded.absences, 1);
        assert_eq!(loaded.intensities.data_type, DataType::Mean);
        assert_eq!(loaded.intensities.len(), 2);
        let stats = loaded.merge_stats.unwrap();
        assert_eq!(stats.all_refl, 4);
        assert_eq!(stats.unique_refl, 2);
        assert_eq!(loaded.format, "XDS_ASCII");
    }

    #[test]
    fn test_keep_absences_and_unmerged_request() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let source = ReflectionSource::Xds(parse_xds_ascii(XDS_UNMERGED, "XDS_ASCII.HKL").unwrap());
        let mut options = LoadOptions::new(DataRequest::Unmerged);
        options.keep_absences = true;
        let loaded = load_from_source(&registry, &source, options).unwrap();
        assert_eq!(loaded.absences, 0);
        assert_eq!(loaded.intensities.len(), 5);
        assert!(loaded.merge_stats.is_none());
        assert!(loaded.intensities.is_sorted());
    }

    #[test]
    fn test_overrides_fill_missing_metadata() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let text = "H,K,L,IMEAN,SIGIMEAN\n1,2,3,10.0,1.0\n";
        let mut source = ReflectionSource::Mtz(parse_mtz_csv(text, "m.csv").unwrap());
        let input = InputOptions {
            spacegroup: Some("19".to_string()),
            cell: Some("50 60 70 90 90 90".to_string()),
            wavelength: Some(1.0),
        };
        apply_overrides(&registry, &mut source, &input).unwrap();
        let ReflectionSource::Mtz(mtz) = &source else {
            panic!("expected MTZ source");
        };
        assert_eq!(mtz.spacegroup.as_deref(), Some("P 21 21 21"));
        assert_eq!(mtz.cell.a, 50.0);
        assert_eq!(mtz.wavelength(), 1.0);

        let bad = InputOptions {
            spacegroup: Some("X 99".to_string()),
            ..Default::default()
        };
        assert!(apply_overrides(&registry, &mut source, &bad).is_err());
    }

    #[test]
    fn test_plain_table_inferred_unmerged_is_merged() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let text = "# spacegroup: P 1\nH,K,L,I,SIGI\n1,0,0,10,1\n1,0,0,12,1\n0,1,0,5,1\n";
        let source = ReflectionSource::Mtz(parse_mtz_csv(text, "plain.csv").unwrap());
        let loaded = load_from_source(&registry, &source, LoadOptions::new(DataRequest::Mean)).unwrap();
        assert_eq!(loaded.intensities.data_type, DataType::Mean);
        assert_eq!(loaded.intensities.len(), 2);
        assert_eq!(loaded.merge_stats.unwrap().all_refl, 3);
    }

    fn xds_p3_pair(friedel_law: &str) -> ReflectionSource {
        let text = format!(
            "\
!FORMAT=XDS_ASCII    MERGE=FALSE    FRIEDEL'S_LAW={}
!SPACE_GROUP_NUMBER=  143
!UNIT_CELL_CONSTANTS=    50.0    50.0    70.0  90.000  90.000 120.000
!ITEM_H=1
!ITEM_K=2
!ITEM_L=3
!ITEM_IOBS=4
!ITEM_SIGMA(IOBS)=5
!END_OF_HEADER
     1     2     3  1.000E+01  1.000E+00
    -1    -2    -3  1.400E+01  1.000E+00
!END_OF_DATA
",
            friedel_law
        );
        ReflectionSource::Xds(parse_xds_ascii(&text, "XDS_ASCII.HKL").unwrap())
    }

    #[test]
    fn test_merged_am_follows_friedel_law() {
        let registry = SpaceGroupRegistry::standard().unwrap();

        let source = xds_p3_pair("TRUE");
        let loaded = load_from_source(&registry, &source, LoadOptions::new(DataRequest::MergedAM)).unwrap();
        assert_eq!(loaded.intensities.data_type, DataType::Mean);
        assert_eq!(loaded.intensities.len(), 1);
        assert_eq!(loaded.intensities.data[0].nobs, 2);
        assert!((loaded.intensities.data[0].value - 12.0).abs() < 1e-12);

        let source = xds_p3_pair("FALSE");
        let loaded = load_from_source(&registry, &source, LoadOptions::new(DataRequest::MergedAM)).unwrap();
        assert_eq!(loaded.intensities.data_type, DataType::Anomalous);
        assert_eq!(loaded.intensities.len(), 2);
    }

    #[test]
    fn test_unmerged_isym_follows_group_operations() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        // 文件中的操作顺序与空间群自身的顺序不同
        let text = "\
# spacegroup: P 1 21 1
# symop: -x,y+1/2,-z
# symop: x,y,z
H,K,L,M/ISYM,I,SIGI
1,2,3,1,10.0,1.0
";
        let source = ReflectionSource::Mtz(parse_mtz_csv(text, "u.csv").unwrap());
        let loaded = load_from_source(&registry, &source, LoadOptions::new(DataRequest::Unmerged)).unwrap();
        let data = &loaded.intensities;
        assert_eq!(data.isym_ops[0], Op::identity());
        assert_eq!(data.data[0].hkl, [1, 2, 3]);
        assert_eq!(data.data[0].isym, 3);
        assert_eq!(data.original_hkl(&data.data[0]).unwrap(), [-1, 2, -3]);
    }
}
