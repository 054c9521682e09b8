//! # 向量与对称张量
//!
//! 3 维向量运算与 6 分量对称矩阵（各向异性 B 张量）。
//!
//! ## 依赖关系
//! - 被 `models/cell.rs`, `intensities/aniso.rs` 使用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};

/// 向量叉积
pub fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// 向量点积
pub fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// 对称 3x3 矩阵，存储 (u11, u22, u33, u12, u13, u23)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SMat33 {
    pub u11: f64,
    pub u22: f64,
    pub u33: f64,
    pub u12: f64,
    pub u13: f64,
    pub u23: f64,
}

impl SMat33 {
    pub fn new(u11: f64, u22: f64, u33: f64, u12: f64, u13: f64, u23: f64) -> Self {
        SMat33 {
            u11,
            u22,
            u33,
            u12,
            u13,
            u23,
        }
    }

    /// 从特征值与特征向量重建：Σ λᵢ vᵢ vᵢᵀ
    pub fn from_eigen(values: [f64; 3], vectors: [[f64; 3]; 3]) -> Self {
        let mut m = SMat33::default();
        for (lambda, v) in values.iter().zip(vectors.iter()) {
            m.u11 += lambda * v[0] * v[0];
            m.u22 += lambda * v[1] * v[1];
            m.u33 += lambda * v[2] * v[2];
            m.u12 += lambda * v[0] * v[1];
            m.u13 += lambda * v[0] * v[2];
            m.u23 += lambda * v[1] * v[2];
        }
        m
    }

    pub fn all_zero(&self) -> bool {
        self.as_array().iter().all(|&x| x == 0.0)
    }

    pub fn as_array(&self) -> [f64; 6] {
        [self.u11, self.u22, self.u33, self.u12, self.u13, self.u23]
    }

    /// 二次型 rᵀ U r
    pub fn r_u_r(&self, r: &[f64; 3]) -> f64 {
        self.u11 * r[0] * r[0]
            + self.u22 * r[1] * r[1]
            + self.u33 * r[2] * r[2]
            + 2.0 * (self.u12 * r[0] * r[1] + self.u13 * r[0] * r[2] + self.u23 * r[1] * r[2])
    }
}
