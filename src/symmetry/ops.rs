//! # 对称操作
//!
//! 整数表示的对称操作 (R, t)，平移以 1/24 为单位。
//!
//! ## 三元式格式
//! ```text
//! -x,y+1/2,-z+1/2
//! ```
//!
//! ## 依赖关系
//! - 被 `symmetry/groups.rs`, `symmetry/asu.rs`, `parsers/mtz.rs` 使用
//! - 使用 `models/reflection.rs` 的 Miller

use crate::error::{HklError, Result};
use crate::models::Miller;

use std::fmt;

/// 平移分母
pub const DEN: i32 = 24;

pub type Rot = [[i32; 3]; 3];

/// 对称操作 x' = R x + t/DEN
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Op {
    pub rot: Rot,
    pub tran: [i32; 3],
}

impl Op {
    pub fn identity() -> Self {
        Op {
            rot: [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
            tran: [0, 0, 0],
        }
    }

    /// 解析三元式，如 "-x,y+1/2,-z"
    pub fn from_triplet(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.split(',').map(|s| s.trim()).collect();
        if parts.len() != 3 {
            return Err(HklError::InvalidSymop(text.to_string()));
        }

        let mut op = Op {
            rot: [[0; 3]; 3],
            tran: [0; 3],
        };
        for (row, expr) in parts.iter().enumerate() {
            let (rot_row, tran) =
                parse_expression(expr).ok_or_else(|| HklError::InvalidSymop(text.to_string()))?;
            op.rot[row] = rot_row;
            op.tran[row] = tran.rem_euclid(DEN);
        }

        if op.det().abs() != 1 {
            return Err(HklError::InvalidSymop(text.to_string()));
        }
        Ok(op)
    }

    pub fn det(&self) -> i32 {
        let r = &self.rot;
        r[0][0] * (r[1][1] * r[2][2] - r[1][2] * r[2][1])
            - r[0][1] * (r[1][0] * r[2][2] - r[1][2] * r[2][0])
            + r[0][2] * (r[1][0] * r[2][1] - r[1][1] * r[2][0])
    }

    /// 组合操作：self * other，即先作用 other 再作用 self
    pub fn combine(&self, other: &Op) -> Op {
        let mut rot = [[0; 3]; 3];
        let mut tran = [0; 3];
        for i in 0..3 {
            for j in 0..3 {
                rot[i][j] = (0..3).map(|k| self.rot[i][k] * other.rot[k][j]).sum();
            }
            let rt: i32 = (0..3).map(|k| self.rot[i][k] * other.tran[k]).sum();
            tran[i] = (rt + self.tran[i]).rem_euclid(DEN);
        }
        Op { rot, tran }
    }

    /// 逆操作（R 为整数幺模矩阵，逆矩阵即伴随矩阵除以行列式）
    pub fn inverse(&self) -> Op {
        let r = &self.rot;
        let det = self.det();
        let cof = |a: usize, b: usize, c: usize, d: usize| r[a][b] * r[c][d];
        let adj = [
            [
                cof(1, 1, 2, 2) - cof(1, 2, 2, 1),
                cof(0, 2, 2, 1) - cof(0, 1, 2, 2),
                cof(0, 1, 1, 2) - cof(0, 2, 1, 1),
            ],
            [
                cof(1, 2, 2, 0) - cof(1, 0, 2, 2),
                cof(0, 0, 2, 2) - cof(0, 2, 2, 0),
                cof(0, 2, 1, 0) - cof(0, 0, 1, 2),
            ],
            [
                cof(1, 0, 2, 1) - cof(1, 1, 2, 0),
                cof(0, 1, 2, 0) - cof(0, 0, 2, 1),
                cof(0, 0, 1, 1) - cof(0, 1, 1, 0),
            ],
        ];
        let mut rot = [[0; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                rot[i][j] = adj[i][j] / det;
            }
        }
        let mut tran = [0; 3];
        for (i, t) in tran.iter_mut().enumerate() {
            let rt: i32 = (0..3).map(|k| rot[i][k] * self.tran[k]).sum();
            *t = (-rt).rem_euclid(DEN);
        }
        Op { rot, tran }
    }

    /// Miller 指数变换：h' = h R（行向量乘旋转矩阵）
    pub fn apply_to_hkl(&self, hkl: &Miller) -> Miller {
        let mut out = [0; 3];
        for (j, o) in out.iter_mut().enumerate() {
            *o = (0..3).map(|i| hkl[i] * self.rot[i][j]).sum();
        }
        out
    }

    /// 相位移动 h·t，单位 2π/DEN
    pub fn phase_shift(&self, hkl: &Miller) -> i32 {
        (0..3).map(|i| hkl[i] * self.tran[i]).sum()
    }

    pub fn is_inversion(&self) -> bool {
        self.rot == [[-1, 0, 0], [0, -1, 0], [0, 0, -1]]
    }

    /// 三元式表示
    pub fn triplet(&self) -> String {
        (0..3)
            .map(|row| format_expression(&self.rot[row], self.tran[row]))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.triplet())
    }
}

/// 取反 Miller 指数
pub fn negate(hkl: &Miller) -> Miller {
    [-hkl[0], -hkl[1], -hkl[2]]
}

/// 解析单个表达式，返回 (旋转矩阵行, 平移 * DEN)
fn parse_expression(expr: &str) -> Option<([i32; 3], i32)> {
    let mut row = [0; 3];
    let mut tran = 0;
    let chars: Vec<char> = expr.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.is_empty() {
        return None;
    }

    let mut i = 0;
    while i < chars.len() {
        let mut sign = 1;
        if chars[i] == '+' || chars[i] == '-' {
            if chars[i] == '-' {
                sign = -1;
            }
            i += 1;
        }
        if i >= chars.len() {
            return None;
        }

        match chars[i].to_ascii_lowercase() {
            'x' => {
                row[0] += sign;
                i += 1;
            }
            'y' => {
                row[1] += sign;
                i += 1;
            }
            'z' => {
                row[2] += sign;
                i += 1;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '/') {
                    i += 1;
                }
                let term: String = chars[start..i].iter().collect();
                let (num, den) = match term.split_once('/') {
                    Some((n, d)) => (n.parse::<i32>().ok()?, d.parse::<i32>().ok()?),
                    None => (term.parse::<i32>().ok()?, 1),
                };
                if den == 0 || (num * DEN) % den != 0 {
                    return None;
                }
                tran += sign * num * DEN / den;
            }
            _ => return None,
        }
    }
    Some((row, tran))
}

fn format_expression(row: &[i32; 3], tran: i32) -> String {
    let mut out = String::new();
    for (coef, axis) in row.iter().zip(["x", "y", "z"]) {
        match *coef {
            0 => {}
            1 => {
                if !out.is_empty() {
                    out.push('+');
                }
                out.push_str(axis);
            }
            -1 => {
                out.push('-');
                out.push_str(axis);
            }
            c => {
                if c > 0 && !out.is_empty() {
                    out.push('+');
                }
                out.push_str(&format!("{}{}", c, axis));
            }
        }
    }
    if tran != 0 {
        let g = gcd(tran, DEN);
        out.push_str(&format!("+{}/{}", tran / g, DEN / g));
    }
    out
}

fn gcd(a: i32, b: i32) -> i32 {
    if b == 0 {
        a.abs()
    } else {
        gcd(b, a % b)
    }
}
