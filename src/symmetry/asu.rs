//! # 倒空间不对称单元
//!
//! 把任意 Miller 指数约化到不对称单元代表，并给出 Friedel 取向。
//!
//! 代表点取所有等价点 {±hR} 中字典序最大者；并列时取正取向、
//! 序号最小的操作。返回的 ISYM 编码与 MTZ 的 M/ISYM 约定一致：
//! 奇数 `2i+1` 表示 asu = +hRᵢ（I+），偶数 `2i+2` 表示 asu = -hRᵢ（I-）。
//!
//! ## 依赖关系
//! - 被 `intensities/`（分类、读入、合并）使用
//! - 使用 `symmetry/groups.rs`, `symmetry/ops.rs`

use crate::models::Miller;
use crate::symmetry::groups::GroupOps;
use crate::symmetry::ops::negate;

/// 不对称单元约化器
pub struct ReciprocalAsu<'g> {
    gops: &'g GroupOps,
}

impl<'g> ReciprocalAsu<'g> {
    pub fn new(gops: &'g GroupOps) -> Self {
        Self { gops }
    }

    /// 返回 (asu 代表, ISYM 编码)
    pub fn to_asu_isym(&self, hkl: &Miller) -> (Miller, i8) {
        let mut best = *hkl;
        let mut best_isym: i8 = 1;
        let mut best_positive = true;

        for (i, op) in self.gops.ops.iter().enumerate() {
            let plus = op.apply_to_hkl(hkl);
            let minus = negate(&plus);
            for (candidate, positive) in [(plus, true), (minus, false)] {
                let better = candidate > best || (candidate == best && positive && !best_positive);
                if better {
                    best = candidate;
                    best_positive = positive;
                    best_isym = (2 * i + if positive { 1 } else { 2 }) as i8;
                }
            }
        }
        (best, best_isym)
    }

    /// 返回 (asu 代表, 是否为正取向)
    pub fn to_asu_sign(&self, hkl: &Miller) -> (Miller, bool) {
        let (asu, isym) = self.to_asu_isym(hkl);
        (asu, isym % 2 == 1)
    }
}
