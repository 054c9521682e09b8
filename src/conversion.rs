//! # mmCIF → MTZ 列映射
//!
//! 声明式的映射表决定 `_refln` 标签如何变成 MTZ 列：
//!
//! ```text
//! # tag            label       type  dataset  [remap]
//! index_h          H           H     0
//! status           FreeR_flag  I     0        o=1,f=0
//! intensity_meas   IMEAN       J     1
//! ```
//! 各列以空白分隔，`#` 开头为注释。remap 把符号单元格换成数值，
//! 无法解析的单元格为 NaN。
//!
//! ## 依赖关系
//! - 被 `commands/convert.rs` 调用
//! - 使用 `csv` + `serde` 读取映射表
//! - 使用 `parsers/mmcif.rs`, `parsers/mtz.rs`

use crate::error::{HklError, Result};
use crate::parsers::metadata::parse_number;
use crate::parsers::mtz::{MtzDataset, MtzTable};
use crate::parsers::ReflnTable;

use serde::Deserialize;
use std::fs;
use std::path::Path;

/// 内置映射表
const DEFAULT_SPEC: &str = "\
index_h             H           H  0
index_k             K           H  0
index_l             L           H  0
status              FreeR_flag  I  0  o=1,f=0
pdbx_r_free_flag    FreeR_flag  I  0
F_meas_au           FP          F  1
F_meas_sigma_au     SIGFP       Q  1
pdbx_F_plus         F(+)        G  1
pdbx_F_plus_sigma   SIGF(+)     L  1
pdbx_F_minus        F(-)        G  1
pdbx_F_minus_sigma  SIGF(-)     L  1
intensity_meas      IMEAN       J  1
intensity_sigma     SIGIMEAN    Q  1
pdbx_I_plus         I(+)        K  1
pdbx_I_plus_sigma   SIGI(+)     M  1
pdbx_I_minus        I(-)        K  1
pdbx_I_minus_sigma  SIGI(-)     M  1
F_calc              FC          F  1
phase_calc          PHIC        P  1
fom                 FOM         W  1
pdbx_FWT            FWT         F  1
pdbx_PHWT           PHWT        P  1
pdbx_DELFWT         DELFWT      F  1
pdbx_DELPHWT        PHDELWT     P  1
";

/// 映射表中的一行
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConversionEntry {
    pub tag: String,
    pub label: String,
    pub column_type: String,
    pub dataset_id: usize,
    #[serde(default)]
    pub remap: Option<String>,
}

impl ConversionEntry {
    fn kind(&self) -> Result<char> {
        let mut chars = self.column_type.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(HklError::InvalidArgument(format!(
                "column type of '{}' must be one letter, got '{}'",
                self.tag, self.column_type
            ))),
        }
    }

    /// 解析 `o=1,f=0` 形式的映射
    fn remap_pairs(&self) -> Result<Vec<(String, f64)>> {
        let Some(remap) = &self.remap else {
            return Ok(Vec::new());
        };
        remap
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|pair| {
                let (symbol, value) = pair.split_once('=').ok_or_else(|| {
                    HklError::InvalidArgument(format!("bad remap '{}' for {}", pair, self.tag))
                })?;
                let value = value.trim().parse::<f64>().map_err(|_| {
                    HklError::InvalidArgument(format!("bad remap value '{}' for {}", value, self.tag))
                })?;
                Ok((symbol.trim().to_string(), value))
            })
            .collect()
    }
}

/// 映射表
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionSpec {
    pub entries: Vec<ConversionEntry>,
}

impl Default for ConversionSpec {
    fn default() -> Self {
        // 内置表格式固定
        Self::parse(DEFAULT_SPEC).unwrap_or(ConversionSpec { entries: Vec::new() })
    }
}

impl ConversionSpec {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| HklError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// 空白分隔的文本先规范为制表符，再用 csv 反序列化
    pub fn parse(content: &str) -> Result<Self> {
        let normalized: String = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|l| l.split_whitespace().collect::<Vec<_>>().join("\t") + "\n")
            .collect();

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_reader(normalized.as_bytes());

        let entries = reader
            .deserialize()
            .collect::<std::result::Result<Vec<ConversionEntry>, _>>()?;
        for entry in &entries {
            entry.kind()?;
            entry.remap_pairs()?;
        }
        Ok(ConversionSpec { entries })
    }
}

/// 把 `_refln` 数据块按映射表转换为 MTZ 表格
///
/// H K L 总是前三列；同一标签只取第一个存在的来源标签。
pub fn convert_refln_to_mtz(rb: &ReflnTable, spec: &ConversionSpec) -> Result<MtzTable> {
    if rb.is_unmerged() {
        return Err(HklError::UnsupportedFormat(format!(
            "{} holds unmerged _diffrn_refln data; only _refln blocks can be converted",
            rb.source_path
        )));
    }

    let mut mtz = MtzTable::new(rb.source_path.clone());
    mtz.title = rb.block_name.clone();
    mtz.spacegroup = rb.spacegroup.clone();
    mtz.cell = rb.cell;
    mtz.datasets.push(MtzDataset {
        id: 1,
        project: rb.block_name.clone(),
        crystal: "crystal".to_string(),
        dataset: "dataset".to_string(),
        wavelength: rb.wavelength,
    });
    for label in ["H", "K", "L"] {
        mtz.add_column(label, 'H', 0);
    }

    let mut sources = Vec::new();
    for entry in &spec.entries {
        let kind = entry.kind()?;
        if kind == 'H' || mtz.column_index(&entry.label).is_some() {
            continue;
        }
        if let Some(col) = rb.find_column(&entry.tag) {
            mtz.add_column(&entry.label, kind, entry.dataset_id);
            sources.push((col, entry.remap_pairs()?));
        }
    }

    for (n, hkl) in rb.hkl.iter().enumerate() {
        let mut row = vec![hkl[0] as f64, hkl[1] as f64, hkl[2] as f64];
        for (col, remap) in &sources {
            let cell = rb.rows[n][*col].as_str();
            let value = remap
                .iter()
                .find(|(symbol, _)| symbol == cell)
                .map(|(_, v)| *v)
                .or_else(|| parse_number(cell))
                .unwrap_or(f64::NAN);
            row.push(value);
        }
        mtz.push_row(&row);
    }
    Ok(mtz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::mmcif::parse_refln_csv;

    #[test]
    fn test_default_spec_parses() {
        let spec = ConversionSpec::default();
        assert_eq!(spec.entries.len(), 24);
        let status = &spec.entries[3];
        assert_eq!(status.label, "FreeR_flag");
        assert_eq!(status.remap.as_deref(), Some("o=1,f=0"));
        assert_eq!(spec.entries[4].remap, None);
    }

    #[test]
    fn test_custom_spec_with_comments() {
        let text = "# my table\n\nintensity_meas I J 1\nintensity_sigma SIGI Q 1\n";
        let spec = ConversionSpec::parse(text).unwrap();
        assert_eq!(spec.entries.len(), 2);
        assert_eq!(spec.entries[0].label, "I");
        assert!(ConversionSpec::parse("tag LABEL XX 1\n").is_err());
        assert!(ConversionSpec::parse("tag LABEL I 1 o1\n").is_err());
    }

    #[test]
    fn test_convert_with_remap() {
        let text = "\
# spacegroup: P 21 21 21
_refln.index_h,_refln.index_k,_refln.index_l,_refln.status,_refln.intensity_meas,_refln.intensity_sigma
1,0,2,o,150.1,12.0
1,1,2,f,?,.
2,1,2,x,3.0,1.0
";
        let rb = parse_refln_csv(text, "r.csv", "r").unwrap();
        let mtz = convert_refln_to_mtz(&rb, &ConversionSpec::default()).unwrap();
        let labels: Vec<_> = mtz.columns.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["H", "K", "L", "FreeR_flag", "IMEAN", "SIGIMEAN"]);
        assert_eq!(mtz.nreflections(), 3);
        assert_eq!(mtz.row(0)[3], 1.0);
        assert_eq!(mtz.row(1)[3], 0.0);
        assert!(mtz.row(2)[3].is_nan());
        assert!(mtz.row(1)[4].is_nan());
        assert_eq!(mtz.row(0)[4], 150.1);
        assert_eq!(mtz.columns[4].kind, 'J');
    }

    #[test]
    fn test_unmerged_block_is_rejected() {
        let text = "_diffrn_refln.index_h,_diffrn_refln.index_k,_diffrn_refln.index_l\n1,2,3\n";
        let rb = parse_refln_csv(text, "u.csv", "u").unwrap();
        assert!(convert_refln_to_mtz(&rb, &ConversionSpec::default()).is_err());
    }
}
