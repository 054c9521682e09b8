//! # 各向异性校正
//!
//! STARANISO 给出的各向异性 B 张量，以及每个衍射点的校正因子
//! `exp(0.5 · sᵀ B s)`，s 为笛卡尔倒易矢量。
//!
//! 校正约定：校正后强度 = 观测强度 × scale。数据集从不隐式应用校正，
//! 只有调用 `apply_aniso_correction` 时才修改强度。
//!
//! ## 依赖关系
//! - 被 `intensities/store.rs`, `intensities/ingest.rs`, `commands/` 使用
//! - 使用 `models/tensor.rs`, `models/cell.rs`
//! - 使用 `regex` 解析 MTZ 历史记录

use crate::error::{HklError, Result};
use crate::intensities::store::Intensities;
use crate::models::{Miller, SMat33, UnitCell};
use crate::parsers::{MtzTable, ReflnTable};

use regex::Regex;
use serde::Serialize;

/// 各向异性 B 张量，全零表示没有
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AnisoScaling {
    pub b: SMat33,
}

impl AnisoScaling {
    pub fn ok(&self) -> bool {
        !self.b.all_zero()
    }

    pub fn scale(&self, hkl: &Miller, cell: &UnitCell) -> f64 {
        let s = cell.reciprocal_vector(hkl);
        (0.5 * self.b.r_u_r(&s)).exp()
    }
}

/// 从 MTZ 历史记录读取 STARANISO 张量
///
/// 历史记录形如：
/// ```text
/// From STARANISO version: 2.3.74 (24-Apr-2021) on 2021-05-11 ...
/// B=(  -5.2160,  -5.2160,  10.4320,   0.0000,   0.0000,   0.0000)
/// ```
/// 返回 (版本号, 张量)；没有 STARANISO 记录时返回 None。
pub fn staraniso_b_from_history(history: &[String]) -> Result<Option<(String, SMat33)>> {
    let version_re = Regex::new(r"From STARANISO version:\s*(\S+)")
        .map_err(|e| HklError::Other(e.to_string()))?;
    let b_re = Regex::new(r"B=\(\s*([^)]*)\)").map_err(|e| HklError::Other(e.to_string()))?;

    let mut lines = history.iter();
    while let Some(line) = lines.next() {
        let caps = match version_re.captures(line) {
            Some(caps) => caps,
            None => continue,
        };
        let version = caps[1].to_string();
        // B=( ... ) 出现在同一行或之后的行
        for candidate in std::iter::once(line).chain(lines.by_ref()) {
            if let Some(b) = b_re.captures(candidate) {
                let values: Vec<f64> = b[1]
                    .split(',')
                    .map(|s| s.trim().parse::<f64>())
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|_| {
                        HklError::Other(format!("Cannot parse STARANISO tensor: {}", candidate))
                    })?;
                if values.len() != 6 {
                    return Err(HklError::Other(format!(
                        "STARANISO tensor needs 6 components: {}",
                        candidate
                    )));
                }
                let tensor = SMat33::new(values[0], values[1], values[2], values[3], values[4], values[5]);
                return Ok(Some((version, tensor)));
            }
        }
        return Ok(None);
    }
    Ok(None)
}

impl<'a> Intensities<'a> {
    /// 从 MTZ 历史记录取出 STARANISO 张量，返回版本号（没有时为空串）
    pub fn take_staraniso_b_from_mtz(&mut self, mtz: &MtzTable) -> Result<String> {
        match staraniso_b_from_history(&mtz.history)? {
            Some((version, b)) => {
                self.staraniso_b.b = b;
                Ok(version)
            }
            None => Ok(String::new()),
        }
    }

    /// 从 mmCIF 的 `_reflns.pdbx_aniso_B_tensor_*` 条目重建张量
    pub fn take_staraniso_b_from_mmcif(&mut self, rb: &ReflnTable) -> bool {
        let prefix = "_reflns.pdbx_aniso_B_tensor_eigen";
        let mut values = [0.0; 3];
        let mut vectors = [[0.0; 3]; 3];
        for i in 0..3 {
            match rb.item_value(&format!("{}value_{}", prefix, i + 1)) {
                Some(v) => values[i] = v,
                None => return false,
            }
            for j in 0..3 {
                match rb.item_value(&format!("{}vector_{}_ortho[{}]", prefix, i + 1, j + 1)) {
                    Some(v) => vectors[i][j] = v,
                    None => return false,
                }
            }
        }
        self.staraniso_b.b = SMat33::from_eigen(values, vectors);
        true
    }

    /// 把各向异性校正乘到每个强度和 sigma 上，需要有效晶胞
    pub fn apply_aniso_correction(&mut self) -> Result<()> {
        if !self.staraniso_b.ok() {
            return Ok(());
        }
        if !self.unit_cell.is_crystal() {
            return Err(HklError::InvalidArgument(
                "anisotropic correction needs a unit cell".to_string(),
            ));
        }
        let aniso = self.staraniso_b;
        let cell = self.unit_cell;
        for refl in &mut self.data {
            let scale = aniso.scale(&refl.hkl, &cell);
            refl.value *= scale;
            refl.sigma *= scale;
        }
        Ok(())
    }
}
