//! # convert 命令实现
//!
//! 把 mmCIF `_refln` 表格转换为 MTZ 风格的 CSV。
//!
//! ## 依赖关系
//! - 使用 `cli/convert.rs` 定义的参数
//! - 使用 `conversion.rs` 的映射表
//! - 使用 `parsers/mmcif.rs`, `parsers/mtz.rs`

use crate::cli::convert::ConvertArgs;
use crate::conversion::{convert_refln_to_mtz, ConversionSpec};
use crate::error::Result;
use crate::parsers::mmcif::read_refln_csv;
use crate::parsers::mtz::write_mtz_csv;
use crate::utils::output;

use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};

/// 映射表显示行
#[derive(Debug, Clone, Tabled)]
struct SpecRow {
    #[tabled(rename = "Tag")]
    tag: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Type")]
    column_type: String,
    #[tabled(rename = "Dataset")]
    dataset_id: usize,
    #[tabled(rename = "Remap")]
    remap: String,
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("reflections");
    input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{}_mtz.csv", stem))
}

/// 执行 convert 命令
pub fn execute(args: ConvertArgs) -> Result<()> {
    output::print_header("Converting mmCIF reflections to MTZ columns");

    let spec = match &args.spec {
        Some(path) => {
            output::print_info(&format!("Using column mapping '{}'", path.display()));
            ConversionSpec::from_file(path)?
        }
        None => ConversionSpec::default(),
    };

    if args.print_spec {
        let rows: Vec<SpecRow> = spec
            .entries
            .iter()
            .map(|e| SpecRow {
                tag: e.tag.clone(),
                label: e.label.clone(),
                column_type: e.column_type.clone(),
                dataset_id: e.dataset_id,
                remap: e.remap.clone().unwrap_or_default(),
            })
            .collect();
        println!("{}", Table::new(&rows));
        return Ok(());
    }

    let output_path = args.output.clone().unwrap_or_else(|| default_output(&args.input));
    if output_path.exists() && !args.overwrite {
        output::print_skip(&format!(
            "{} exists (use --overwrite)",
            output_path.display()
        ));
        return Ok(());
    }

    let rb = read_refln_csv(&args.input)?;
    let mut mtz = convert_refln_to_mtz(&rb, &spec)?;
    mtz.history
        .push(format!("hklmerge: converted from {}", args.input.display()));

    let labels: Vec<&str> = mtz.columns.iter().map(|c| c.label.as_str()).collect();
    output::print_info(&format!(
        "{} reflections, columns: {}",
        mtz.nreflections(),
        labels.join(" ")
    ));
    write_mtz_csv(&mtz, &output_path)?;
    output::print_conversion(
        &args.input.display().to_string(),
        &output_path.display().to_string(),
    );
    Ok(())
}
