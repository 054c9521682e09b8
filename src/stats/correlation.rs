//! # 相关系数
//!
//! 流式 Pearson 相关累加器：逐点更新均值、方差与协方差，数值稳定。
//!
//! ## 依赖关系
//! - 被 `intensities/merge.rs`, `commands/analyze/compare.rs` 使用
//! - 无外部模块依赖

use serde::Serialize;

/// Pearson 相关累加器
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Correlation {
    pub n: u64,
    pub sum_xx: f64,
    pub sum_yy: f64,
    pub sum_xy: f64,
    pub mean_x: f64,
    pub mean_y: f64,
}

impl Correlation {
    pub fn add_point(&mut self, x: f64, y: f64) {
        self.n += 1;
        let n = self.n as f64;
        let weight = (n - 1.0) / n;
        let dx = x - self.mean_x;
        let dy = y - self.mean_y;
        self.sum_xx += weight * dx * dx;
        self.sum_yy += weight * dy * dy;
        self.sum_xy += weight * dx * dy;
        self.mean_x += dx / n;
        self.mean_y += dy / n;
    }

    pub fn coefficient(&self) -> f64 {
        self.covariance() / (self.x_variance() * self.y_variance()).sqrt()
    }

    /// 最小二乘 y = slope * x + intercept
    pub fn slope(&self) -> f64 {
        self.covariance() / self.x_variance()
    }

    pub fn intercept(&self) -> f64 {
        self.mean_y - self.slope() * self.mean_x
    }

    pub fn mean_ratio(&self) -> f64 {
        self.mean_y / self.mean_x
    }

    pub fn x_variance(&self) -> f64 {
        self.sum_xx / self.n as f64
    }

    pub fn y_variance(&self) -> f64 {
        self.sum_yy / self.n as f64
    }

    pub fn covariance(&self) -> f64 {
        self.sum_xy / self.n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_correlation() {
        let mut c = Correlation::default();
        for x in [1.0, 5.0, 2.0, 8.0, 3.5] {
            c.add_point(x, x);
        }
        assert!((c.coefficient() - 1.0).abs() < 1e-12);
        assert!((c.slope() - 1.0).abs() < 1e-12);
        assert!(c.intercept().abs() < 1e-12);
        assert!((c.mean_ratio() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_linear_relation() {
        let mut c = Correlation::default();
        for x in [0.0, 1.0, 2.0, 3.0] {
            c.add_point(x, 3.0 - 2.0 * x);
        }
        assert!((c.coefficient() + 1.0).abs() < 1e-12);
        assert!((c.slope() + 2.0).abs() < 1e-12);
        assert!((c.intercept() - 3.0).abs() < 1e-12);
        // x = 0,1,2,3: 方差 1.25
        assert!((c.x_variance() - 1.25).abs() < 1e-12);
        assert!((c.covariance() + 2.5).abs() < 1e-12);
        assert!((c.y_variance() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_is_nan() {
        let c = Correlation::default();
        assert!(c.coefficient().is_nan());
        assert_eq!(c.n, 0);
    }
}
