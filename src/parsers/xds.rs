//! # XDS_ASCII 解析器
//!
//! 读取 XDS / XSCALE 输出的 XDS_ASCII.HKL 文件。
//!
//! ## 文件格式说明
//! ```text
//! !FORMAT=XDS_ASCII    MERGE=FALSE    FRIEDEL'S_LAW=TRUE
//! !SPACE_GROUP_NUMBER=   96
//! !UNIT_CELL_CONSTANTS=    78.1    78.1    37.2  90.000  90.000  90.000
//! !X-RAY_WAVELENGTH=  0.97625
//! !NUMBER_OF_ITEMS_IN_EACH_DATA_RECORD=12
//! !ITEM_H=1
//! !ITEM_K=2
//! !ITEM_L=3
//! !ITEM_IOBS=4
//! !ITEM_SIGMA(IOBS)=5
//! !ITEM_ZD=8
//! !END_OF_HEADER
//!     1    0    3  1.042E+02  8.1E+00 ...
//! !END_OF_DATA
//! ```
//! 被拒绝的观测以负 sigma 标记，由读入层过滤。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs`, `intensities/ingest.rs` 使用
//! - 使用 `regex` 解析 `!ITEM_*` 表头

use crate::error::{HklError, Result};
use crate::models::{Miller, UnitCell};

use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// XDS_ASCII 中的一条观测
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XdsRefl {
    pub hkl: Miller,
    pub iobs: f64,
    pub sigma: f64,
    /// 图像号（帧），没有 ITEM_ZD 时为 0
    pub zd: f64,
}

/// XDS_ASCII 文件
#[derive(Debug, Clone)]
pub struct XdsAscii {
    pub source_path: String,
    pub spacegroup_number: u32,
    pub cell: UnitCell,
    pub wavelength: f64,
    /// MERGE=TRUE 表示已合并（XSCALE 输出）
    pub merged: bool,
    pub friedel_law: bool,
    pub data: Vec<XdsRefl>,
}

impl XdsAscii {
    pub fn len(&self) -> usize {
        self.data.len()
    }
}

/// 读取 XDS_ASCII 文件
pub fn read_xds_ascii(path: &Path) -> Result<XdsAscii> {
    let content = fs::read_to_string(path).map_err(|e| HklError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_xds_ascii(&content, &path.display().to_string())
}

/// 表头行中 `KEY=` 之后的文本（到行尾）
fn header_rest<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let pos = line.find(key)?;
    Some(line[pos + key.len()..].trim_start())
}

/// 表头行中 `KEY=` 之后的第一个词
fn header_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    header_rest(line, key).and_then(|rest| rest.split_whitespace().next())
}

/// 从字符串内容解析 XDS_ASCII
pub fn parse_xds_ascii(content: &str, source_path: &str) -> Result<XdsAscii> {
    let parse_error = |reason: String| HklError::ParseError {
        format: "XDS_ASCII".to_string(),
        path: source_path.to_string(),
        reason,
    };

    let mut lines = content.lines();
    let first = lines
        .next()
        .ok_or_else(|| parse_error("empty file".to_string()))?;
    if !first.starts_with("!FORMAT=XDS_ASCII") {
        return Err(parse_error("missing !FORMAT=XDS_ASCII line".to_string()));
    }

    let mut xds = XdsAscii {
        source_path: source_path.to_string(),
        spacegroup_number: 0,
        cell: UnitCell::default(),
        wavelength: 0.0,
        merged: header_value(first, "MERGE=") == Some("TRUE"),
        friedel_law: header_value(first, "FRIEDEL'S_LAW=") != Some("FALSE"),
        data: Vec::new(),
    };

    let item_re = Regex::new(r"^!ITEM_([A-Z_()]+)=\s*(\d+)").map_err(|e| HklError::Other(e.to_string()))?;
    let mut items: HashMap<String, usize> = HashMap::new();
    let mut in_data = false;

    for (n, line) in lines.enumerate() {
        let line_no = n + 2;
        if !in_data {
            if let Some(caps) = item_re.captures(line) {
                // 列号从 1 开始
                let col: usize = caps[2]
                    .parse()
                    .map_err(|_| parse_error(format!("line {}: bad item column", line_no)))?;
                if col == 0 {
                    return Err(parse_error(format!("line {}: item column 0", line_no)));
                }
                items.insert(caps[1].to_string(), col - 1);
            } else if let Some(v) = header_value(line, "!SPACE_GROUP_NUMBER=") {
                xds.spacegroup_number = v
                    .parse()
                    .map_err(|_| parse_error(format!("line {}: bad space group number", line_no)))?;
            } else if let Some(rest) = header_rest(line, "!UNIT_CELL_CONSTANTS=") {
                xds.cell = UnitCell::parse(rest)?;
            } else if let Some(v) = header_value(line, "!X-RAY_WAVELENGTH=") {
                xds.wavelength = v
                    .parse()
                    .map_err(|_| parse_error(format!("line {}: bad wavelength", line_no)))?;
            } else if line.starts_with("!END_OF_HEADER") {
                in_data = true;
            }
            continue;
        }

        if line.starts_with("!END_OF_DATA") {
            break;
        }
        if line.starts_with('!') || line.trim().is_empty() {
            continue;
        }

        let column = |name: &str| -> Result<usize> {
            items
                .get(name)
                .copied()
                .ok_or_else(|| parse_error(format!("missing !ITEM_{}", name)))
        };
        let fields: Vec<&str> = line.split_whitespace().collect();
        let field = |col: usize| -> Result<f64> {
            fields
                .get(col)
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| parse_error(format!("line {}: bad or missing field {}", line_no, col + 1)))
        };

        let hkl = [
            field(column("H")?)? as i32,
            field(column("K")?)? as i32,
            field(column("L")?)? as i32,
        ];
        let zd = match items.get("ZD") {
            Some(&col) => field(col)?,
            None => 0.0,
        };
        xds.data.push(XdsRefl {
            hkl,
            iobs: field(column("IOBS")?)?,
            sigma: field(column("SIGMA(IOBS)")?)?,
            zd,
        });
    }

    if !in_data {
        return Err(parse_error("missing !END_OF_HEADER".to_string()));
    }
    Ok(xds)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
!FORMAT=XDS_ASCII    MERGE=FALSE    FRIEDEL'S_LAW=FALSE
!SPACE_GROUP_NUMBER=   19
!UNIT_CELL_CONSTANTS=    50.0    60.0    70.0  90.000  90.000  90.000
!X-RAY_WAVELENGTH=  0.97625
!NUMBER_OF_ITEMS_IN_EACH_DATA_RECORD=8
!ITEM_H=1
!ITEM_K=2
!ITEM_L=3
!ITEM_IOBS=4
!ITEM_SIGMA(IOBS)=5
!ITEM_XD=6
!ITEM_YD=7
!ITEM_ZD=8
!END_OF_HEADER
     1     2     3  1.000E+01  1.0E+00   100.0   200.0     5.2
    -1    -2     3  1.200E+01  1.0E+00   110.0   210.0    15.7
     2     0     0  3.000E+00 -1.0E+00   120.0   220.0    25.1
!END_OF_DATA
";

    #[test]
    fn test_parse_header_and_data() {
        let xds = parse_xds_ascii(SAMPLE, "XDS_ASCII.HKL").unwrap();
        assert_eq!(xds.spacegroup_number, 19);
        assert!(!xds.merged);
        assert!(!xds.friedel_law);
        assert!((xds.wavelength - 0.97625).abs() < 1e-12);
        assert!((xds.cell.parameters()[2] - 70.0).abs() < 1e-12);
        assert_eq!(xds.len(), 3);
        assert_eq!(xds.data[1].hkl, [-1, -2, 3]);
        assert!((xds.data[1].iobs - 12.0).abs() < 1e-12);
        assert!((xds.data[1].zd - 15.7).abs() < 1e-12);
        assert!(xds.data[2].sigma < 0.0);
    }

    #[test]
    fn test_rejects_other_formats() {
        assert!(parse_xds_ascii("H,K,L\n", "x").is_err());
        assert!(parse_xds_ascii("!FORMAT=XDS_ASCII MERGE=TRUE\n", "x").is_err());
    }

    #[test]
    fn test_header_value() {
        assert_eq!(header_value("!FORMAT=XDS_ASCII    MERGE=TRUE", "MERGE="), Some("TRUE"));
        assert_eq!(header_value("!FORMAT=XDS_ASCII", "MERGE="), None);
    }
}
