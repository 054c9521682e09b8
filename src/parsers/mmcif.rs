//! # mmCIF 衍射数据块
//!
//! `_refln`（合并数据）或 `_diffrn_refln`（未合并数据）循环在内存中的表示。
//! 单元格保留原始文本，`?` 与 `.` 表示缺失。
//!
//! ## CSV 格式说明
//! ```text
//! # spacegroup: P 1 21 1
//! # cell: 30.2 40.1 50.3 90 101.2 90
//! # _reflns.pdbx_aniso_B_tensor_eigenvalue_1: 7.2
//! _refln.index_h,_refln.index_k,_refln.index_l,_refln.status,_refln.intensity_meas,_refln.intensity_sigma
//! 1,0,2,o,150.1,12.0
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs`, `intensities/`, `conversion.rs` 使用
//! - 使用 `csv` 读取表格

use crate::error::{HklError, Result};
use crate::models::{Miller, UnitCell};
use crate::parsers::metadata::{parse_number, split_metadata};

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// mmCIF 衍射数据块
#[derive(Debug, Clone)]
pub struct ReflnTable {
    pub source_path: String,
    pub block_name: String,
    /// "_refln." 或 "_diffrn_refln."
    pub category: String,
    pub spacegroup: Option<String>,
    pub cell: UnitCell,
    pub wavelength: f64,
    /// 数据块内的单值条目，如 `_reflns.pdbx_aniso_B_tensor_eigenvalue_1`
    pub items: BTreeMap<String, String>,
    /// 去掉类别前缀的标签
    pub tags: Vec<String>,
    pub hkl: Vec<Miller>,
    pub rows: Vec<Vec<String>>,
}

impl ReflnTable {
    pub fn is_unmerged(&self) -> bool {
        self.category == "_diffrn_refln."
    }

    pub fn find_column(&self, tag: &str) -> Option<usize> {
        self.tags.iter().position(|t| t == tag)
    }

    pub fn require_column(&self, tag: &str) -> Result<usize> {
        self.find_column(tag).ok_or_else(|| HklError::MissingColumn {
            label: format!("{}{}", self.category, tag),
            source_name: self.source_path.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        parse_number(&self.rows[row][col])
    }

    /// 数值单元格，缺失为 NaN
    pub fn value_or_nan(&self, row: usize, col: usize) -> f64 {
        self.value(row, col).unwrap_or(f64::NAN)
    }

    pub fn item_value(&self, key: &str) -> Option<f64> {
        self.items.get(key).and_then(|v| parse_number(v))
    }
}

/// 读取 mmCIF 数据块的 CSV 文件
pub fn read_refln_csv(path: &Path) -> Result<ReflnTable> {
    let content = fs::read_to_string(path).map_err(|e| HklError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    let block_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    parse_refln_csv(&content, &path.display().to_string(), block_name)
}

/// 从字符串内容解析 mmCIF 数据块
pub fn parse_refln_csv(content: &str, source_path: &str, block_name: &str) -> Result<ReflnTable> {
    let parse_error = |reason: String| HklError::ParseError {
        format: "mmCIF (CSV)".to_string(),
        path: source_path.to_string(),
        reason,
    };

    let (metadata, body) = split_metadata(content);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());
    let headers = reader.headers()?.clone();

    let category = if headers.iter().any(|h| h.starts_with("_diffrn_refln.")) {
        "_diffrn_refln."
    } else if headers.iter().any(|h| h.starts_with("_refln.")) {
        "_refln."
    } else {
        return Err(parse_error(
            "no _refln or _diffrn_refln columns".to_string(),
        ));
    };

    let tags: Vec<String> = headers
        .iter()
        .map(|h| h.strip_prefix(category).unwrap_or(h).to_string())
        .collect();

    let mut items = BTreeMap::new();
    for (key, value) in &metadata.entries {
        if key.starts_with('_') {
            items.insert(key.clone(), value.clone());
        }
    }

    let mut table = ReflnTable {
        source_path: source_path.to_string(),
        block_name: metadata.get("block").unwrap_or(block_name).to_string(),
        category: category.to_string(),
        spacegroup: metadata
            .get("spacegroup")
            .or_else(|| metadata.get("_symmetry.space_group_name_H-M"))
            .map(|s| s.trim_matches('\'').to_string()),
        cell: UnitCell::default(),
        wavelength: 0.0,
        items,
        tags,
        hkl: Vec::new(),
        rows: Vec::new(),
    };
    if let Some(cell) = metadata.get("cell") {
        table.cell = UnitCell::parse(cell)?;
    }
    if let Some(w) = metadata.get("wavelength") {
        table.wavelength =
            parse_number(w).ok_or_else(|| parse_error(format!("bad wavelength '{}'", w)))?;
    }

    let idx = ["index_h", "index_k", "index_l"]
        .iter()
        .map(|t| table.require_column(t))
        .collect::<Result<Vec<_>>>()?;

    for (n, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() != table.tags.len() {
            return Err(parse_error(format!(
                "row {} has {} fields, expected {}",
                n + 1,
                record.len(),
                table.tags.len()
            )));
        }
        let row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        let mut hkl = [0; 3];
        for (i, &col) in idx.iter().enumerate() {
            hkl[i] = row[col].parse::<i32>().map_err(|_| {
                parse_error(format!("row {}: bad Miller index '{}'", n + 1, row[col]))
            })?;
        }
        table.hkl.push(hkl);
        table.rows.push(row);
    }

    Ok(table)
}
