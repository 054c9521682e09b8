//! # 壳层统计图
//!
//! 使用 `plotters` 绘制 R-merge / R-meas / R-pim 随分辨率变化的曲线。
//! 横轴为壳层中点的 1/d²，支持 PNG 和 SVG 输出。
//!
//! ## 依赖关系
//! - 被 `commands/analyze/stats.rs` 调用
//! - 使用 `stats/binner.rs`, `stats/merging_r.rs`
//! - 使用 `plotters` 渲染图表

use crate::error::{HklError, Result};
use crate::stats::{Binner, MergingR};

use plotters::prelude::*;
use std::path::Path;

/// 一个壳层在图上的点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShellPoint {
    /// 壳层中点的 1/d²
    pub inv_d2: f64,
    pub r_merge: f64,
    pub r_meas: f64,
    pub r_pim: f64,
}

/// 由分壳器与壳层统计生成绘图点，跳过没有数据的壳层
pub fn shell_points(binner: &Binner, shells: &[MergingR]) -> Vec<ShellPoint> {
    shells
        .iter()
        .enumerate()
        .filter(|(_, s)| s.intensity_sum > 0.0)
        .map(|(i, s)| {
            let lo = if i == 0 { binner.min_1_d2 } else { binner.limits[i - 1] };
            ShellPoint {
                inv_d2: 0.5 * (lo + binner.limits[i]),
                r_merge: s.r_merge(),
                r_meas: s.r_meas(),
                r_pim: s.r_pim(),
            }
        })
        .collect()
}

/// 生成 R 因子曲线图
pub fn generate_merging_plot(
    points: &[ShellPoint],
    output_path: &Path,
    title: &str,
    width: u32,
    height: u32,
    use_svg: bool,
) -> Result<()> {
    if points.is_empty() {
        return Err(HklError::InvalidArgument("no shells to plot".to_string()));
    }
    if use_svg {
        let root = SVGBackend::new(output_path, (width, height)).into_drawing_area();
        draw_merging_chart(&root, points, title)?;
        root.present()
            .map_err(|e| HklError::Other(e.to_string()))?;
    } else {
        let root = BitMapBackend::new(output_path, (width, height)).into_drawing_area();
        draw_merging_chart(&root, points, title)?;
        root.present()
            .map_err(|e| HklError::Other(e.to_string()))?;
    }
    Ok(())
}

/// 绘制图表的核心逻辑
fn draw_merging_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    points: &[ShellPoint],
    title: &str,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)
        .map_err(|e| HklError::Other(format!("{:?}", e)))?;

    let x_min = points.iter().map(|p| p.inv_d2).fold(f64::INFINITY, f64::min);
    let mut x_max = points.iter().map(|p| p.inv_d2).fold(f64::NEG_INFINITY, f64::max);
    if x_max <= x_min {
        x_max = x_min + 0.01;
    }
    let y_max = points
        .iter()
        .flat_map(|p| [p.r_merge, p.r_meas, p.r_pim])
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max);
    let y_max = if y_max > 0.0 { y_max * 1.1 } else { 1.0 };

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 28).into_font())
        .margin(30)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, 0.0..y_max)
        .map_err(|e| HklError::Other(format!("{:?}", e)))?;

    chart
        .configure_mesh()
        .x_desc("1/d² (Å⁻²)")
        .y_desc("R")
        .x_label_style(("sans-serif", 16))
        .y_label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(|e| HklError::Other(format!("{:?}", e)))?;

    let series: [(&str, RGBColor, fn(&ShellPoint) -> f64); 3] = [
        ("R-merge", RGBColor(0, 102, 204), |p| p.r_merge),
        ("R-meas", RGBColor(204, 51, 0), |p| p.r_meas),
        ("R-pim", RGBColor(0, 153, 76), |p| p.r_pim),
    ];
    for (label, color, value) in series {
        chart
            .draw_series(LineSeries::new(
                points
                    .iter()
                    .filter(|p| value(p).is_finite())
                    .map(|p| (p.inv_d2, value(p))),
                color.stroke_width(2),
            ))
            .map_err(|e| HklError::Other(format!("{:?}", e)))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .position(SeriesLabelPosition::UpperLeft)
        .draw()
        .map_err(|e| HklError::Other(format!("{:?}", e)))?;

    Ok(())
}
