//! # 解析器模块
//!
//! 衍射数据来源的表格模型与文本读取器。
//!
//! 三种来源统一为 `ReflectionSource` 枚举，由 `intensities::Intensities::read_source`
//! 按请求读入。
//!
//! ## 依赖关系
//! - 被 `commands/`, `intensities/`, `conversion.rs` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: metadata, mtz, mmcif, xds

pub mod metadata;
pub mod mmcif;
pub mod mtz;
pub mod xds;

pub use mmcif::ReflnTable;
pub use mtz::MtzTable;
pub use xds::XdsAscii;

use crate::error::{HklError, Result};
use std::fs;
use std::path::Path;

/// 衍射数据来源
#[derive(Debug, Clone)]
pub enum ReflectionSource {
    Mtz(MtzTable),
    Mmcif(ReflnTable),
    Xds(XdsAscii),
}

impl ReflectionSource {
    pub fn format_name(&self) -> &'static str {
        match self {
            ReflectionSource::Mtz(_) => "MTZ",
            ReflectionSource::Mmcif(_) => "mmCIF",
            ReflectionSource::Xds(_) => "XDS_ASCII",
        }
    }

    /// 来源中的行数（未合并 MTZ 为观测数）
    pub fn len(&self) -> usize {
        match self {
            ReflectionSource::Mtz(mtz) => mtz.nreflections(),
            ReflectionSource::Mmcif(rb) => rb.len(),
            ReflectionSource::Xds(xds) => xds.len(),
        }
    }

    /// 来源是否为未合并数据
    pub fn is_unmerged(&self) -> bool {
        match self {
            ReflectionSource::Mtz(mtz) => !mtz.is_merged(),
            ReflectionSource::Mmcif(rb) => rb.is_unmerged(),
            ReflectionSource::Xds(xds) => !xds.merged,
        }
    }
}

/// 从文件路径推断格式并读取
///
/// - `XDS_ASCII*` 或 `.hkl`：XDS_ASCII
/// - `.csv`：表头含 `index_h` 的按 mmCIF 数据块读取，否则按 MTZ 表格读取
pub fn read_source_file(path: &Path) -> Result<ReflectionSource> {
    if !path.exists() {
        return Err(HklError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    if name.starts_with("XDS_ASCII") || ext == "hkl" {
        return xds::read_xds_ascii(path).map(ReflectionSource::Xds);
    }

    match ext.as_str() {
        "csv" => {
            if looks_like_refln_block(path)? {
                mmcif::read_refln_csv(path).map(ReflectionSource::Mmcif)
            } else {
                mtz::read_mtz_csv(path).map(ReflectionSource::Mtz)
            }
        }
        _ => Err(HklError::UnsupportedFormat(format!(
            "Cannot determine format for: {}",
            path.display()
        ))),
    }
}

/// 第一行非元数据行是否为 mmCIF 标签
fn looks_like_refln_block(path: &Path) -> Result<bool> {
    let content = fs::read_to_string(path).map_err(|e| HklError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    let header = content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .unwrap_or_default();
    Ok(header.contains("index_h"))
}
