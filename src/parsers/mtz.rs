//! # MTZ 表格
//!
//! MTZ 反射文件在内存中的表示：带标签和类型的列，按行存放的数值。
//! 二进制 MTZ 由外部读取器转换为该结构；命令行工具读写其 CSV 形式。
//!
//! ## CSV 格式说明
//! ```text
//! # title: lysozyme
//! # spacegroup: P 43 21 2
//! # cell: 79.1 79.1 37.9 90 90 90
//! # wavelength: 0.9184
//! # symop: -y+1/2,x+1/2,z+3/4
//! H,K,L,M/ISYM,BATCH,I,SIGI
//! 1,0,3,1,12,104.2,8.1
//! ```
//! 缺失值写作 `?`（读入时也接受 `.`、空串与 `nan`），在表内以 NaN 表示。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs`, `intensities/`, `conversion.rs` 使用
//! - 使用 `csv` 读写表格，`parsers/metadata.rs` 解析表头

use crate::error::{HklError, Result};
use crate::models::{Miller, UnitCell};
use crate::parsers::metadata::{is_missing, parse_number, split_metadata};
use crate::symmetry::Op;

use std::fs;
use std::path::Path;

/// 列描述
#[derive(Debug, Clone, PartialEq)]
pub struct MtzColumn {
    pub label: String,
    /// MTZ 列类型：H 指数、J 强度、Q 标准差、K/M 反常强度/标准差、Y M/ISYM、B 批次、I 整数、R 实数
    pub kind: char,
    pub dataset_id: usize,
}

/// 数据集
#[derive(Debug, Clone, PartialEq)]
pub struct MtzDataset {
    pub id: usize,
    pub project: String,
    pub crystal: String,
    pub dataset: String,
    pub wavelength: f64,
}

/// MTZ 表格
#[derive(Debug, Clone)]
pub struct MtzTable {
    pub source_path: String,
    pub title: String,
    pub spacegroup: Option<String>,
    pub cell: UnitCell,
    pub datasets: Vec<MtzDataset>,
    pub columns: Vec<MtzColumn>,
    /// 按行存放，长度 = 行数 × 列数
    pub data: Vec<f64>,
    pub history: Vec<String>,
    /// 未合并数据 M/ISYM 所引用的对称操作
    pub symops: Vec<Op>,
}

impl MtzTable {
    pub fn new(source_path: impl Into<String>) -> Self {
        MtzTable {
            source_path: source_path.into(),
            title: String::new(),
            spacegroup: None,
            cell: UnitCell::default(),
            datasets: vec![MtzDataset {
                id: 0,
                project: "HKL_base".to_string(),
                crystal: "HKL_base".to_string(),
                dataset: "HKL_base".to_string(),
                wavelength: 0.0,
            }],
            columns: Vec::new(),
            data: Vec::new(),
            history: Vec::new(),
            symops: Vec::new(),
        }
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn nreflections(&self) -> usize {
        if self.columns.is_empty() {
            0
        } else {
            self.data.len() / self.columns.len()
        }
    }

    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.label == label)
    }

    pub fn require_column(&self, label: &str) -> Result<usize> {
        self.column_index(label)
            .ok_or_else(|| HklError::MissingColumn {
                label: label.to_string(),
                source_name: self.source_path.clone(),
            })
    }

    /// 没有 M/ISYM 列即视为合并数据
    pub fn is_merged(&self) -> bool {
        self.column_index("M/ISYM").is_none()
    }

    pub fn row(&self, n: usize) -> &[f64] {
        let ncols = self.ncols();
        &self.data[n * ncols..(n + 1) * ncols]
    }

    /// 按数据偏移读取 hkl（前三列为 H K L）
    pub fn get_hkl(&self, offset: usize) -> Miller {
        [
            self.data[offset] as i32,
            self.data[offset + 1] as i32,
            self.data[offset + 2] as i32,
        ]
    }

    /// 第一个有效的数据集波长
    pub fn wavelength(&self) -> f64 {
        self.datasets
            .iter()
            .map(|d| d.wavelength)
            .find(|&w| w > 0.0)
            .unwrap_or(0.0)
    }

    pub fn add_column(&mut self, label: &str, kind: char, dataset_id: usize) {
        self.columns.push(MtzColumn {
            label: label.to_string(),
            kind,
            dataset_id,
        });
    }

    pub fn push_row(&mut self, row: &[f64]) {
        debug_assert_eq!(row.len(), self.ncols());
        self.data.extend_from_slice(row);
    }
}

/// 根据常见标签推断列类型
pub fn column_kind_for_label(label: &str) -> char {
    match label.to_uppercase().as_str() {
        "H" | "K" | "L" => 'H',
        "M/ISYM" => 'Y',
        "BATCH" => 'B',
        "I(+)" | "I(-)" => 'K',
        "SIGI(+)" | "SIGI(-)" => 'M',
        "F(+)" | "F(-)" => 'G',
        "SIGF(+)" | "SIGF(-)" => 'L',
        "NOBS" | "N(+)" | "N(-)" | "FREER_FLAG" | "FREE" => 'I',
        "F" | "FP" | "FC" => 'F',
        "PHIC" | "PHWT" => 'P',
        l if l.starts_with("SIG") => 'Q',
        l if l.starts_with('I') => 'J',
        _ => 'R',
    }
}

/// 读取 MTZ 表格的 CSV 文件
pub fn read_mtz_csv(path: &Path) -> Result<MtzTable> {
    let content = fs::read_to_string(path).map_err(|e| HklError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_mtz_csv(&content, &path.display().to_string())
}

/// 从字符串内容解析 MTZ 表格
pub fn parse_mtz_csv(content: &str, source_path: &str) -> Result<MtzTable> {
    let parse_error = |reason: String| HklError::ParseError {
        format: "MTZ (CSV)".to_string(),
        path: source_path.to_string(),
        reason,
    };

    let (metadata, body) = split_metadata(content);
    let mut table = MtzTable::new(source_path);

    table.title = metadata.get("title").unwrap_or_default().to_string();
    table.spacegroup = metadata.get("spacegroup").map(|s| s.to_string());
    if let Some(cell) = metadata.get("cell") {
        table.cell = UnitCell::parse(cell)?;
    }
    let wavelength = match metadata.get("wavelength") {
        Some(w) => parse_number(w).ok_or_else(|| parse_error(format!("bad wavelength '{}'", w)))?,
        None => 0.0,
    };
    table.datasets.push(MtzDataset {
        id: 1,
        project: metadata.get("project").unwrap_or("project").to_string(),
        crystal: metadata.get("crystal").unwrap_or("crystal").to_string(),
        dataset: metadata.get("dataset").unwrap_or("dataset").to_string(),
        wavelength,
    });
    table.history = metadata.get_all("history");
    table.symops = metadata
        .get_all("symop")
        .iter()
        .map(|s| Op::from_triplet(s))
        .collect::<Result<Vec<_>>>()?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.clone();
    for label in headers.iter() {
        let kind = column_kind_for_label(label);
        let dataset_id = if kind == 'H' { 0 } else { 1 };
        table.add_column(label, kind, dataset_id);
    }

    let hkl_ok = table.columns.len() >= 3
        && ["H", "K", "L"]
            .iter()
            .zip(&table.columns)
            .all(|(expected, col)| col.label.eq_ignore_ascii_case(expected));
    if !hkl_ok {
        return Err(parse_error(
            "the first three columns must be H, K, L".to_string(),
        ));
    }

    for (n, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() != table.ncols() {
            return Err(parse_error(format!(
                "row {} has {} fields, expected {}",
                n + 1,
                record.len(),
                table.ncols()
            )));
        }
        for (col, cell) in record.iter().enumerate() {
            let value = if is_missing(cell) {
                f64::NAN
            } else {
                cell.parse::<f64>().map_err(|_| {
                    parse_error(format!("row {}: cannot parse '{}' in column {}", n + 1, cell, col + 1))
                })?
            };
            if col < 3 && value.is_nan() {
                return Err(parse_error(format!("row {}: missing Miller index", n + 1)));
            }
            table.data.push(value);
        }
    }

    Ok(table)
}

/// 将 MTZ 表格写为 CSV
pub fn write_mtz_csv(table: &MtzTable, output_path: &Path) -> Result<()> {
    let mut content = String::new();
    if !table.title.is_empty() {
        content.push_str(&format!("# title: {}\n", table.title));
    }
    if let Some(sg) = &table.spacegroup {
        content.push_str(&format!("# spacegroup: {}\n", sg));
    }
    if table.cell.is_crystal() {
        let p = table.cell.parameters();
        content.push_str(&format!(
            "# cell: {} {} {} {} {} {}\n",
            p[0], p[1], p[2], p[3], p[4], p[5]
        ));
    }
    if table.wavelength() > 0.0 {
        content.push_str(&format!("# wavelength: {}\n", table.wavelength()));
    }
    for line in &table.history {
        content.push_str(&format!("# history: {}\n", line));
    }
    for op in &table.symops {
        content.push_str(&format!("# symop: {}\n", op.triplet()));
    }

    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(table.columns.iter().map(|c| c.label.as_str()))?;
    for n in 0..table.nreflections() {
        let row = table.row(n);
        let fields: Vec<String> = row
            .iter()
            .zip(&table.columns)
            .map(|(v, col)| format_cell(*v, col.kind))
            .collect();
        wtr.write_record(&fields)?;
    }
    let bytes = wtr.into_inner().map_err(|e| HklError::Other(e.to_string()))?;
    content.push_str(&String::from_utf8_lossy(&bytes));

    fs::write(output_path, content).map_err(|e| HklError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })
}

fn format_cell(value: f64, kind: char) -> String {
    if value.is_nan() {
        "?".to_string()
    } else if matches!(kind, 'H' | 'Y' | 'B' | 'I') {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNMERGED: &str = "\
# spacegroup: P 21 21 21
# cell: 50 60 70 90 90 90
# wavelength: 0.9795
# history: From XDS VERSION Feb 5, 2021
H,K,L,M/ISYM,I,SIGI
1,2,3,1,10.0,1.0
1,2,3,3,12.0,1.0
2,2,3,2,?,1.0
";

    #[test]
    fn test_parse_unmerged_table() {
        let table = parse_mtz_csv(UNMERGED, "test.csv").unwrap();
        assert_eq!(table.nreflections(), 3);
        assert_eq!(table.ncols(), 6);
        assert!(!table.is_merged());
        assert_eq!(table.spacegroup.as_deref(), Some("P 21 21 21"));
        assert!((table.wavelength() - 0.9795).abs() < 1e-12);
        assert_eq!(table.columns[3].kind, 'Y');
        assert_eq!(table.columns[4].kind, 'J');
        assert_eq!(table.columns[5].kind, 'Q');
        assert_eq!(table.get_hkl(table.ncols()), [1, 2, 3]);
        assert!(table.row(2)[4].is_nan());
        assert_eq!(table.history.len(), 1);
    }

    #[test]
    fn test_missing_hkl_columns() {
        let err = parse_mtz_csv("A,B,C\n1,2,3\n", "bad.csv");
        assert!(err.is_err());
    }

    #[test]
    fn test_write_then_read_keeps_missing_values() {
        let table = parse_mtz_csv(UNMERGED, "test.csv").unwrap();
        let path = std::env::temp_dir().join("hklmerge_mtz_write_test.csv");
        write_mtz_csv(&table, &path).unwrap();
        let back = read_mtz_csv(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(back.nreflections(), 3);
        assert!(back.row(2)[4].is_nan());
        assert_eq!(back.row(1)[3], 3.0);
        assert_eq!(back.cell.parameters(), table.cell.parameters());
    }
}
