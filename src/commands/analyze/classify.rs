//! # classify 子命令实现
//!
//! 在空间群对称下推断表格中的数据类型，不依赖列标签。
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的 ClassifyArgs
//! - 使用 `intensities/classify.rs` 的推断算法
//! - 使用 `tabled` 输出结果表

use crate::cli::analyze::ClassifyArgs;
use crate::commands::load::apply_overrides;
use crate::error::{HklError, Result};
use crate::intensities::{
    check_data_type_under_symmetry, lookup_mtz_spacegroup, lookup_spacegroup,
};
use crate::models::DataType;
use crate::parsers::{self, ReflectionSource};
use crate::symmetry::{SpaceGroup, SpaceGroupRegistry};
use crate::utils::output;

use std::borrow::Cow;
use std::path::Path;
use tabled::{Table, Tabled};

/// 推断结果行
#[derive(Debug, Clone, Tabled)]
struct ClassifyRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Format")]
    format: String,
    #[tabled(rename = "Rows")]
    rows: usize,
    #[tabled(rename = "Space group")]
    spacegroup: String,
    #[tabled(rename = "Declared")]
    declared: String,
    #[tabled(rename = "Inferred")]
    inferred: String,
    #[tabled(rename = "Unique")]
    unique: usize,
}

/// 来源中声明的空间群
pub fn source_spacegroup<'r>(
    registry: &'r SpaceGroupRegistry,
    source: &ReflectionSource,
) -> Result<Option<Cow<'r, SpaceGroup>>> {
    let found = match source {
        ReflectionSource::Mtz(mtz) => return lookup_mtz_spacegroup(registry, mtz),
        ReflectionSource::Mmcif(rb) => lookup_spacegroup(registry, rb.spacegroup.as_deref())?,
        ReflectionSource::Xds(xds) => match xds.spacegroup_number {
            0 => None,
            number => Some(
                registry
                    .get_by_number(number)
                    .ok_or_else(|| HklError::UnknownSpaceGroup(number.to_string()))?,
            ),
        },
    };
    Ok(found.map(Cow::Borrowed))
}

/// 对已读取的来源执行推断
pub fn classify_source(
    registry: &SpaceGroupRegistry,
    source: &ReflectionSource,
) -> Result<(DataType, usize)> {
    let spacegroup = source_spacegroup(registry, source)?;
    let spacegroup = spacegroup.as_deref();
    Ok(match source {
        ReflectionSource::Mtz(mtz) => check_data_type_under_symmetry(mtz, spacegroup),
        ReflectionSource::Mmcif(rb) => check_data_type_under_symmetry(rb, spacegroup),
        ReflectionSource::Xds(xds) => check_data_type_under_symmetry(xds, spacegroup),
    })
}

fn classify_file(
    registry: &SpaceGroupRegistry,
    path: &Path,
    args: &ClassifyArgs,
) -> Result<ClassifyRow> {
    let mut source = parsers::read_source_file(path)?;
    apply_overrides(registry, &mut source, &args.input_options)?;
    let spacegroup = source_spacegroup(registry, &source)?;
    let (data_type, unique) = classify_source(registry, &source)?;
    Ok(ClassifyRow {
        file: path.display().to_string(),
        format: source.format_name().to_string(),
        rows: source.len(),
        spacegroup: spacegroup.map_or_else(|| "none".to_string(), |sg| sg.xhm.clone()),
        declared: if source.is_unmerged() { "unmerged" } else { "merged" }.to_string(),
        inferred: data_type.to_string(),
        unique,
    })
}

/// 执行 classify 命令
pub fn execute(registry: &SpaceGroupRegistry, args: ClassifyArgs) -> Result<()> {
    output::print_header("Data Type Classification");

    let mut rows = Vec::new();
    let mut failed = 0;
    for path in &args.inputs {
        match classify_file(registry, path, &args) {
            Ok(row) => {
                if row.inferred == DataType::Unknown.to_string() {
                    output::print_warning(&format!(
                        "{}: no space group, type cannot be inferred (use --spacegroup)",
                        row.file
                    ));
                }
                rows.push(row);
            }
            Err(e) => {
                failed += 1;
                output::print_error(&format!("{}: {}", path.display(), e));
            }
        }
    }

    if !rows.is_empty() {
        println!("{}", Table::new(&rows));
    }
    if failed > 0 {
        return Err(HklError::Other(format!("{} file(s) could not be classified", failed)));
    }
    Ok(())
}
