//! # 统一错误处理模块
//!
//! 定义 hklmerge 的所有错误类型，使用 `thiserror` 派生。
//!
//! 数据层面的三类错误：
//! - 完整性错误：严格模式下 Friedel 对缺失
//! - 前置条件错误：在错误状态的数据上调用合并/导出/相关性
//! - 输入错误：文件、列、空间群无法解析
//!
//! NaN 强度或非正 sigma 的观测在读入时被静默丢弃，不属于错误。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// hklmerge 统一错误类型
#[derive(Error, Debug)]
pub enum HklError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Column '{label}' not found in {source_name}")]
    MissingColumn { label: String, source_name: String },

    #[error("Unknown space group: {0}")]
    UnknownSpaceGroup(String),

    #[error("Invalid symmetry operation '{0}'")]
    InvalidSymop(String),

    // ─────────────────────────────────────────────────────────────
    // 数据完整性
    // ─────────────────────────────────────────────────────────────
    #[error("Friedel mate missing for acentric reflection {hkl:?} in {source_name}")]
    IncompleteFriedelPair { hkl: [i32; 3], source_name: String },

    // ─────────────────────────────────────────────────────────────
    // 前置条件
    // ─────────────────────────────────────────────────────────────
    #[error("No space group set (required for {0})")]
    MissingSpaceGroup(String),

    #[error("{operation} requires unmerged data, but data type is {found}")]
    NotUnmerged { operation: String, found: String },

    #[error("{operation} requires merged data, but data type is {found}")]
    NotMerged { operation: String, found: String },

    #[error("{operation} requires data sorted by (hkl, sign); call sort() first")]
    NotSorted { operation: String },

    #[error("Invalid data request: {0}")]
    InvalidRequest(String),

    #[error("Invalid ISYM {isym} for reflection {hkl:?}: only {nops} operations known")]
    InvalidIsym { isym: i8, hkl: [i32; 3], nops: usize },

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // CSV 错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("No matching files found with pattern: {pattern}")]
    NoFilesFound { pattern: String },

    #[error("{0}")]
    Other(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, HklError>;
