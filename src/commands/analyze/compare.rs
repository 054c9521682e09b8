//! # compare 子命令实现
//!
//! 两个数据集在共同 (hkl, sign) 上的 Pearson 相关性。
//! 未合并的输入先按请求合并。
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的 CompareArgs
//! - 使用 `commands/load.rs` 读入
//! - 使用 `intensities/merge.rs` 的 calculate_correlation

use crate::cli::analyze::CompareArgs;
use crate::commands::load::{self, LoadOptions, Loaded};
use crate::error::{HklError, Result};
use crate::models::DataRequest;
use crate::stats::Correlation;
use crate::symmetry::SpaceGroupRegistry;
use crate::utils::output;

use tabled::{Table, Tabled};

/// 相关性结果行
#[derive(Debug, Clone, Tabled)]
struct CorrelationRow {
    #[tabled(rename = "Common")]
    common: u64,
    #[tabled(rename = "CC")]
    cc: String,
    #[tabled(rename = "Slope")]
    slope: String,
    #[tabled(rename = "Intercept")]
    intercept: String,
    #[tabled(rename = "<I2>/<I1>")]
    mean_ratio: String,
}

impl From<&Correlation> for CorrelationRow {
    fn from(c: &Correlation) -> Self {
        Self {
            common: c.n,
            cc: output::format_ratio(c.coefficient(), 4),
            slope: output::format_ratio(c.slope(), 4),
            intercept: output::format_ratio(c.intercept(), 3),
            mean_ratio: output::format_ratio(c.mean_ratio(), 4),
        }
    }
}

fn describe(label: &str, loaded: &Loaded) {
    let data = &loaded.intensities;
    output::print_info(&format!(
        "{}: {} {} reflections ({}, space group {})",
        label,
        data.len(),
        data.type_str(),
        loaded.format,
        data.spacegroup_str()
    ));
}

/// 执行 compare 命令
pub fn execute(registry: &SpaceGroupRegistry, args: CompareArgs) -> Result<()> {
    output::print_header("Dataset Correlation");

    let request = DataRequest::from(args.request);
    if !request.wants_merged() {
        return Err(HklError::InvalidArgument(format!(
            "comparison needs merged data; request '{}' is not a merged layout",
            request
        )));
    }
    let mut options = LoadOptions::new(request);
    options.weighting = args.weighting.into();

    let first = load::load_intensities(registry, &args.first, &args.input_options, options)?;
    let second = load::load_intensities(registry, &args.second, &args.input_options, options)?;
    describe("first", &first);
    describe("second", &second);

    if first.intensities.data_type != second.intensities.data_type {
        output::print_warning(&format!(
            "data types differ ({} vs {}): only matching (hkl, sign) keys are compared",
            first.intensities.data_type, second.intensities.data_type
        ));
    }

    let corr = first.intensities.calculate_correlation(&second.intensities)?;
    if corr.n == 0 {
        output::print_warning("No reflections in common");
    }
    println!("{}", Table::new([CorrelationRow::from(&corr)]));
    Ok(())
}
