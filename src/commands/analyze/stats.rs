//! # stats 子命令实现
//!
//! 对未合并数据按分辨率壳层计算 R-merge、R-meas、R-pim，数据本身不被修改。
//!
//! ## 功能
//! - 终端表格输出（tabled）
//! - 可选导出 CSV（csv）
//! - 可选绘制 R 因子曲线（plotters）
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的 StatsArgs
//! - 使用 `commands/load.rs` 读入
//! - 使用 `stats/` 的 Binner、MergingR 和绘图

use crate::cli::analyze::StatsArgs;
use crate::commands::load::{self, LoadOptions};
use crate::error::{HklError, Result};
use crate::intensities::MergingStats;
use crate::models::DataRequest;
use crate::stats::plot::{generate_merging_plot, shell_points};
use crate::stats::{Binner, MergingR};
use crate::symmetry::SpaceGroupRegistry;
use crate::utils::{output, progress};

use std::path::Path;
use tabled::{Table, Tabled};

/// 一个壳层的统计（CSV 行）
#[derive(Debug, Clone)]
pub struct ShellRow {
    pub shell: String,
    pub d_max: f64,
    pub d_min: f64,
    pub n_obs: u64,
    pub n_unique: u64,
    pub multiplicity: f64,
    pub r_merge: f64,
    pub r_meas: f64,
    pub r_pim: f64,
}

impl ShellRow {
    fn new(shell: String, d_max: f64, d_min: f64, stats: &MergingR) -> Self {
        Self {
            shell,
            d_max,
            d_min,
            n_obs: stats.all_refl,
            n_unique: stats.unique_refl,
            multiplicity: stats.multiplicity(),
            r_merge: stats.r_merge(),
            r_meas: stats.r_meas(),
            r_pim: stats.r_pim(),
        }
    }
}

/// 终端表格行
#[derive(Debug, Clone, Tabled)]
struct DisplayRow {
    #[tabled(rename = "Shell")]
    shell: String,
    #[tabled(rename = "d_max (Å)")]
    d_max: String,
    #[tabled(rename = "d_min (Å)")]
    d_min: String,
    #[tabled(rename = "N obs")]
    n_obs: u64,
    #[tabled(rename = "N unique")]
    n_unique: u64,
    #[tabled(rename = "Mult")]
    multiplicity: String,
    #[tabled(rename = "R-merge")]
    r_merge: String,
    #[tabled(rename = "R-meas")]
    r_meas: String,
    #[tabled(rename = "R-pim")]
    r_pim: String,
}

impl From<&ShellRow> for DisplayRow {
    fn from(row: &ShellRow) -> Self {
        Self {
            shell: row.shell.clone(),
            d_max: output::format_ratio(row.d_max, 2),
            d_min: output::format_ratio(row.d_min, 2),
            n_obs: row.n_obs,
            n_unique: row.n_unique,
            multiplicity: output::format_ratio(row.multiplicity, 2),
            r_merge: output::format_ratio(row.r_merge, 4),
            r_meas: output::format_ratio(row.r_meas, 4),
            r_pim: output::format_ratio(row.r_pim, 4),
        }
    }
}

/// 由合并统计构建表格行，最后一行为总体
pub fn build_rows(binner: Option<&Binner>, stats: &MergingStats, resolution: (f64, f64)) -> Vec<ShellRow> {
    let mut rows = Vec::with_capacity(stats.shells.len() + 1);
    if let Some(binner) = binner {
        for (i, shell) in stats.shells.iter().enumerate() {
            rows.push(ShellRow::new(
                (i + 1).to_string(),
                binner.dmax_of_bin(i),
                binner.dmin_of_bin(i),
                shell,
            ));
        }
    }
    rows.push(ShellRow::new(
        "overall".to_string(),
        resolution.0,
        resolution.1,
        &stats.overall,
    ));
    rows
}

fn write_csv(rows: &[ShellRow], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "shell",
        "d_max",
        "d_min",
        "n_obs",
        "n_unique",
        "multiplicity",
        "r_merge",
        "r_meas",
        "r_pim",
    ])?;
    for row in rows {
        wtr.write_record(&[
            row.shell.clone(),
            format!("{:.4}", row.d_max),
            format!("{:.4}", row.d_min),
            row.n_obs.to_string(),
            row.n_unique.to_string(),
            format!("{:.4}", row.multiplicity),
            format!("{:.6}", row.r_merge),
            format!("{:.6}", row.r_meas),
            format!("{:.6}", row.r_pim),
        ])?;
    }
    wtr.flush().map_err(|e| HklError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

/// 执行 stats 命令
pub fn execute(registry: &SpaceGroupRegistry, args: StatsArgs) -> Result<()> {
    output::print_header("Merging Statistics");

    let request = DataRequest::from(args.request);
    if !matches!(request, DataRequest::Mean | DataRequest::Anomalous | DataRequest::MergedMA | DataRequest::MergedAM) {
        return Err(HklError::InvalidArgument(format!(
            "statistics need a merge target (mean or anomalous), got '{}'",
            request
        )));
    }
    if args.bins == 0 {
        return Err(HklError::InvalidArgument("--bins must be at least 1".to_string()));
    }

    let spinner = progress::create_spinner(&format!("Reading {}", args.input.display()));
    let mut options = LoadOptions::new(DataRequest::Unmerged);
    options.keep_absences = args.keep_absences;
    let loaded = load::load_intensities(registry, &args.input, &args.input_options, options);
    spinner.finish_and_clear();
    let loaded = loaded?;
    let data = &loaded.intensities;

    output::print_info(&format!(
        "{} input: {} observations, space group {}",
        loaded.format,
        data.len(),
        data.spacegroup_str()
    ));
    if loaded.absences > 0 {
        output::print_info(&format!("Removed {} systematic absences", loaded.absences));
    }

    let binner = if data.unit_cell.is_crystal() {
        Some(Binner::from_intensities(args.bins, args.method.into(), data)?)
    } else {
        output::print_warning("No unit cell: reporting overall statistics only (use --cell)");
        None
    };
    let resolution = data.resolution_range().unwrap_or((f64::NAN, f64::NAN));

    let stats = data.calculate_merging_rs(binner.as_ref(), request, args.weighting.into())?;
    let rows = build_rows(binner.as_ref(), &stats, resolution);

    let display: Vec<DisplayRow> = rows.iter().map(DisplayRow::from).collect();
    println!("{}", Table::new(&display));

    if let Some(csv_path) = &args.csv {
        write_csv(&rows, csv_path)?;
        output::print_success(&format!("Shell table written to '{}'", csv_path.display()));
    }

    if let Some(plot_path) = &args.plot {
        let Some(binner) = &binner else {
            return Err(HklError::InvalidArgument(
                "plotting needs resolution shells (use --cell)".to_string(),
            ));
        };
        let use_svg = plot_path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("svg"));
        let title = args
            .input
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("merging statistics");
        let points = shell_points(binner, &stats.shells);
        generate_merging_plot(&points, plot_path, title, args.width, args.height, use_svg)?;
        output::print_success(&format!("Plot written to '{}'", plot_path.display()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intensities::{Intensities, MergeWeighting};
    use crate::models::{DataType, FriedelSign, UnitCell};
    use crate::stats::BinMethod;
    use std::borrow::Cow;

    #[test]
    fn test_rows_and_csv() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let mut data = Intensities::new();
        data.spacegroup = registry.find("P 1").map(Cow::Borrowed);
        data.unit_cell = UnitCell::new(20.0, 20.0, 20.0, 90.0, 90.0, 90.0);
        data.data_type = DataType::Unmerged;
        for value in [10.0, 12.0, 11.0] {
            data.add_if_valid([1, 0, 0], FriedelSign::None, 0, value, 1.0);
        }
        for value in [4.0, 6.0] {
            data.add_if_valid([4, 4, 4], FriedelSign::None, 0, value, 1.0);
        }
        data.sort();

        let binner = Binner::from_intensities(2, BinMethod::Dstar2, &data).unwrap();
        let stats = data
            .calculate_merging_rs(Some(&binner), DataRequest::Mean, MergeWeighting::Unweighted)
            .unwrap();
        let rows = build_rows(Some(&binner), &stats, data.resolution_range().unwrap());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].shell, "overall");
        assert_eq!(rows[2].n_obs, 5);
        assert_eq!(rows[2].n_unique, 2);
        assert_eq!(rows[0].n_obs, 3);
        assert!((rows[0].r_merge - 2.0 / 33.0).abs() < 1e-12);
        assert!((rows[1].r_merge - 0.2).abs() < 1e-12);

        let path = std::env::temp_dir().join("hklmerge_stats_rows.csv");
        write_csv(&rows, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("shell,d_max,d_min,n_obs,n_unique,multiplicity,r_merge,r_meas,r_pim"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_overall_only_without_binner() {
        let stats = MergingStats::default();
        let rows = build_rows(None, &stats, (f64::NAN, f64::NAN));
        assert_eq!(rows.len(), 1);
        assert!(rows[0].r_merge.is_nan());
    }
}
