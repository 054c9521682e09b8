//! # 晶胞数据模型
//!
//! 晶胞参数、正空间/倒空间基矢以及 d 间距计算。
//!
//! 基矢矩阵按行存放 a, b, c（a 沿 x 轴，b 在 xy 平面内），
//! 倒空间基矢不含 2π 因子，因此 |s|² = 1/d²。
//!
//! ## 依赖关系
//! - 被 `intensities/`, `parsers/`, `stats/binner.rs` 使用
//! - 使用 `models/tensor.rs` 的向量运算

use crate::error::{HklError, Result};
use crate::models::reflection::Miller;
use crate::models::tensor::{cross, dot};

use serde::{Deserialize, Serialize};

/// 晶胞
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UnitCell {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    /// 正空间基矢（行向量 a, b, c）
    pub orth: [[f64; 3]; 3],
    /// 倒空间基矢（行向量 a*, b*, c*）
    pub reciprocal: [[f64; 3]; 3],
}

impl UnitCell {
    /// 从晶胞参数 (a, b, c, alpha, beta, gamma) 创建，角度单位：度
    pub fn new(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let cos_alpha = alpha.to_radians().cos();
        let cos_beta = beta.to_radians().cos();
        let cos_gamma = gamma.to_radians().cos();
        let sin_gamma = gamma.to_radians().sin();

        let a_vec = [a, 0.0, 0.0];
        let b_vec = [b * cos_gamma, b * sin_gamma, 0.0];

        let c1 = c * cos_beta;
        let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (c * c - c1 * c1 - c2 * c2).sqrt();
        let c_vec = [c1, c2, c3];

        let mut cell = UnitCell {
            a,
            b,
            c,
            alpha,
            beta,
            gamma,
            orth: [a_vec, b_vec, c_vec],
            reciprocal: [[0.0; 3]; 3],
        };
        cell.reciprocal = cell.reciprocal_basis();
        cell
    }

    /// 从字符串 "a b c alpha beta gamma"（空格或逗号分隔）解析
    pub fn parse(text: &str) -> Result<Self> {
        let params: Vec<f64> = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| HklError::InvalidArgument(format!("Invalid unit cell '{}'", text)))?;

        if params.len() != 6 {
            return Err(HklError::InvalidArgument(format!(
                "Unit cell needs 6 parameters (a b c alpha beta gamma), got '{}'",
                text
            )));
        }

        Ok(UnitCell::new(
            params[0], params[1], params[2], params[3], params[4], params[5],
        ))
    }

    /// 晶胞参数是否有效
    pub fn is_crystal(&self) -> bool {
        self.a > 0.0 && self.b > 0.0 && self.c > 0.0 && self.volume() > 1e-10
    }

    pub fn parameters(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.alpha, self.beta, self.gamma]
    }

    /// 晶胞体积 V = a · (b × c)
    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.orth;
        dot(&a, &cross(&b, &c))
    }

    /// 倒空间基矢：a* = (b×c)/V, b* = (c×a)/V, c* = (a×b)/V
    fn reciprocal_basis(&self) -> [[f64; 3]; 3] {
        let [a, b, c] = self.orth;
        let volume = self.volume();
        if volume.abs() < 1e-10 || volume.is_nan() {
            return [[0.0; 3]; 3];
        }
        let scale = |v: [f64; 3]| [v[0] / volume, v[1] / volume, v[2] / volume];
        [scale(cross(&b, &c)), scale(cross(&c, &a)), scale(cross(&a, &b))]
    }

    /// 倒易矢量 s = h a* + k b* + l c*（笛卡尔坐标）
    pub fn reciprocal_vector(&self, hkl: &Miller) -> [f64; 3] {
        let r = &self.reciprocal;
        let [h, k, l] = [hkl[0] as f64, hkl[1] as f64, hkl[2] as f64];
        [
            h * r[0][0] + k * r[1][0] + l * r[2][0],
            h * r[0][1] + k * r[1][1] + l * r[2][1],
            h * r[0][2] + k * r[1][2] + l * r[2][2],
        ]
    }

    /// 1/d²
    pub fn calculate_1_d2(&self, hkl: &Miller) -> f64 {
        let s = self.reciprocal_vector(hkl);
        dot(&s, &s)
    }

    /// d 间距（Å）
    pub fn calculate_d(&self, hkl: &Miller) -> f64 {
        1.0 / self.calculate_1_d2(hkl).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cubic_d_spacing() {
        let cell = UnitCell::new(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        assert!((cell.calculate_d(&[1, 0, 0]) - 5.0).abs() < 1e-9);
        assert!((cell.calculate_d(&[1, 1, 0]) - 5.0 / 2f64.sqrt()).abs() < 1e-9);
        assert!((cell.volume() - 125.0).abs() < 1e-9);
    }

    #[test]
    fn test_hexagonal_d_spacing() {
        // d(100) = a * sqrt(3) / 2
        let cell = UnitCell::new(3.0, 3.0, 5.0, 90.0, 90.0, 120.0);
        let expected = 3.0 * 3f64.sqrt() / 2.0;
        assert!((cell.calculate_d(&[1, 0, 0]) - expected).abs() < 1e-9);
        assert!((cell.calculate_d(&[0, 0, 1]) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_cell() {
        let cell = UnitCell::parse("10, 20, 30, 90, 90, 90").unwrap();
        assert_eq!(cell.parameters(), [10.0, 20.0, 30.0, 90.0, 90.0, 90.0]);
        assert!(cell.is_crystal());
        assert!(UnitCell::parse("10 20").is_err());
        assert!(!UnitCell::default().is_crystal());
    }
}
