//! # merge 命令实现
//!
//! 合并等价观测并导出为 MTZ 风格的 CSV。
//!
//! ## 功能
//! - 支持单文件和批量目录处理
//! - 未合并来源先按未合并读入，再按请求合并
//! - 并行批量处理（rayon）
//!
//! ## 依赖关系
//! - 使用 `cli/merge.rs` 定义的 MergeArgs
//! - 使用 `commands/load.rs` 读入
//! - 使用 `batch/` 模块进行批量处理
//! - 使用 `intensities/export.rs`, `parsers/mtz.rs` 导出

use crate::batch::{BatchRunner, FileCollector, ProcessResult};
use crate::cli::merge::MergeArgs;
use crate::commands::load::{self, LoadOptions, Loaded};
use crate::error::{HklError, Result};
use crate::models::DataRequest;
use crate::parsers::mtz::write_mtz_csv;
use crate::symmetry::SpaceGroupRegistry;
use crate::utils::output;

use std::fs;
use std::path::{Path, PathBuf};

/// 执行 merge 命令
pub fn execute(registry: &SpaceGroupRegistry, args: MergeArgs) -> Result<()> {
    output::print_header("Merging Diffraction Intensities");

    let request = DataRequest::from(args.request);
    if !request.wants_merged() {
        return Err(HklError::InvalidArgument(format!(
            "merge produces merged data; request '{}' is not a merged layout",
            request
        )));
    }

    if args.input.is_file() {
        execute_single_file(registry, &args)
    } else if args.input.is_dir() {
        execute_batch(registry, &args)
    } else {
        Err(HklError::FileNotFound {
            path: args.input.display().to_string(),
        })
    }
}

fn load_options(args: &MergeArgs) -> LoadOptions {
    LoadOptions {
        request: args.request.into(),
        weighting: args.weighting.into(),
        check_complete: args.check_complete,
        keep_absences: args.keep_absences,
        aniso_correct: args.aniso_correct,
    }
}

/// `<stem>_merged.csv`
fn merged_file_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("reflections");
    format!("{}_merged.csv", stem)
}

/// 单文件模式
fn execute_single_file(registry: &SpaceGroupRegistry, args: &MergeArgs) -> Result<()> {
    output::print_info(&format!("Single file mode: '{}'", args.input.display()));

    let output_path = args.output.clone().unwrap_or_else(|| {
        args.input
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(merged_file_name(&args.input))
    });
    if output_path.exists() && !args.overwrite {
        output::print_skip(&format!(
            "{} exists (use --overwrite)",
            output_path.display()
        ));
        return Ok(());
    }

    let loaded = load::load_intensities(registry, &args.input, &args.input_options, load_options(args))?;
    report_load(&loaded);
    write_merged(&loaded, &args.input, &output_path, args.with_nobs)?;
    output::print_conversion(
        &args.input.display().to_string(),
        &output_path.display().to_string(),
    );
    Ok(())
}

/// 打印读入摘要
fn report_load(loaded: &Loaded) {
    let data = &loaded.intensities;
    output::print_info(&format!(
        "{} input, space group {}, {} data",
        loaded.format,
        data.spacegroup_str(),
        data.type_str()
    ));
    if loaded.absences > 0 {
        output::print_info(&format!("Removed {} systematic absences", loaded.absences));
    }
    if loaded.aniso_applied {
        output::print_info("Applied STARANISO anisotropy correction");
    }
    if let Some(stats) = &loaded.merge_stats {
        output::print_info(&format!(
            "Merged {} observations into {} reflections (R-merge {}, R-meas {}, R-pim {})",
            stats.all_refl,
            stats.unique_refl,
            output::format_ratio(stats.r_merge(), 4),
            output::format_ratio(stats.r_meas(), 4),
            output::format_ratio(stats.r_pim(), 4)
        ));
    } else {
        output::print_info(&format!("Read {} merged reflections", data.len()));
    }
}

/// 导出并写文件
fn write_merged(loaded: &Loaded, input: &Path, output_path: &Path, with_nobs: bool) -> Result<()> {
    let mut mtz = loaded.intensities.prepare_merged_mtz(with_nobs)?;
    mtz.history
        .push(format!("hklmerge: merged from {}", input.display()));
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| HklError::FileWriteError {
            path: parent.display().to_string(),
            source: e,
        })?;
    }
    write_mtz_csv(&mtz, output_path)
}

/// 批量处理模式
fn execute_batch(registry: &SpaceGroupRegistry, args: &MergeArgs) -> Result<()> {
    output::print_info(&format!("Batch mode: directory '{}'", args.input.display()));

    let collector = FileCollector::new(args.input.clone())
        .with_pattern(&args.pattern)?
        .recursive(args.recursive);
    let files = collector.collect();

    if files.is_empty() {
        output::print_warning(&format!(
            "No matching files found with pattern '{}'",
            args.pattern
        ));
        return Ok(());
    }
    output::print_info(&format!("Found {} reflection files", files.len()));

    let output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.join("merged"));
    fs::create_dir_all(&output_dir).map_err(|e| HklError::FileWriteError {
        path: output_dir.display().to_string(),
        source: e,
    })?;

    let runner = BatchRunner::new(args.jobs)?;
    let result = runner.run(files, |file| process_batch_file(registry, file, &output_dir, args));

    output::print_separator();
    output::print_success(&format!(
        "Batch complete: {} success, {} skipped, {} failed",
        result.success, result.skipped, result.failed
    ));

    if !result.failures.is_empty() {
        output::print_warning("Failed files:");
        for (path, err) in result.failures.iter().take(10) {
            output::print_error(&format!("  {}: {}", path, err));
        }
        if result.failures.len() > 10 {
            output::print_warning(&format!("  ... and {} more", result.failures.len() - 10));
        }
    }

    Ok(())
}

/// 批量模式下处理单个文件
fn process_batch_file(
    registry: &SpaceGroupRegistry,
    input: &PathBuf,
    output_dir: &Path,
    args: &MergeArgs,
) -> ProcessResult {
    let output_path = output_dir.join(merged_file_name(input));
    if output_path.exists() && !args.overwrite {
        return ProcessResult::Skipped(output_path.display().to_string());
    }

    let result = load::load_intensities(registry, input, &args.input_options, load_options(args))
        .and_then(|loaded| write_merged(&loaded, input, &output_path, args.with_nobs));
    match result {
        Ok(()) => ProcessResult::Success(output_path.display().to_string()),
        Err(e) => ProcessResult::Failed(input.display().to_string(), e.to_string()),
    }
}
