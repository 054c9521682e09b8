//! # 数据类型推断
//!
//! 当来源没有说明数据的物理状态时，按对称等价的重复情况推断：
//! - 同一不对称单元代表、同一取向出现两次：未合并
//! - 只有相反取向重复：反常数据
//! - 没有重复：平均强度
//!
//! 单次正向扫描，一旦判定为未合并即停止。
//!
//! ## 依赖关系
//! - 被 `intensities/ingest.rs`, `commands/analyze/classify.rs` 使用
//! - 使用 `symmetry/`

use crate::intensities::store::Intensities;
use crate::models::{DataType, FriedelSign, Miller};
use crate::parsers::{MtzTable, ReflnTable, XdsAscii};
use crate::symmetry::ops::negate;
use crate::symmetry::{ReciprocalAsu, SpaceGroup};

use std::collections::HashMap;

/// 按偏移读取 Miller 指数的数据视图
pub trait DataProxy {
    /// 每个衍射点占用的步长
    fn stride(&self) -> usize;
    /// 总长度（衍射点数 × 步长）
    fn size(&self) -> usize;
    fn get_hkl(&self, offset: usize) -> Miller;
}

impl DataProxy for MtzTable {
    fn stride(&self) -> usize {
        self.ncols()
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn get_hkl(&self, offset: usize) -> Miller {
        MtzTable::get_hkl(self, offset)
    }
}

impl DataProxy for ReflnTable {
    fn stride(&self) -> usize {
        1
    }

    fn size(&self) -> usize {
        self.hkl.len()
    }

    fn get_hkl(&self, offset: usize) -> Miller {
        self.hkl[offset]
    }
}

impl DataProxy for XdsAscii {
    fn stride(&self) -> usize {
        1
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn get_hkl(&self, offset: usize) -> Miller {
        self.data[offset].hkl
    }
}

/// I(-) 记录按 -hkl 参与推断，因此反常数据重新推断仍得到反常
impl DataProxy for Intensities<'_> {
    fn stride(&self) -> usize {
        1
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn get_hkl(&self, offset: usize) -> Miller {
        let refl = &self.data[offset];
        match refl.sign {
            FriedelSign::Minus => negate(&refl.hkl),
            _ => refl.hkl,
        }
    }
}

/// 推断数据类型，返回 (类型, 不同不对称单元代表的数目)
///
/// 没有空间群时返回 `(Unknown, 0)`。
pub fn check_data_type_under_symmetry<P: DataProxy + ?Sized>(
    proxy: &P,
    spacegroup: Option<&SpaceGroup>,
) -> (DataType, usize) {
    let sg = match spacegroup {
        Some(sg) => sg,
        None => return (DataType::Unknown, 0),
    };
    let gops = sg.operations();
    let centric = gops.is_centrosymmetric();
    let asu = ReciprocalAsu::new(&gops);
    let stride = proxy.stride().max(1);

    // 2 = 正取向，1 = 负取向
    let mut seen: HashMap<Miller, u8> = HashMap::new();
    let mut data_type = DataType::Mean;
    let mut offset = 0;
    while offset < proxy.size() {
        let (hkl, positive) = asu.to_asu_sign(&proxy.get_hkl(offset));
        let bit = if positive { 2 } else { 1 };
        match seen.get_mut(&hkl) {
            None => {
                seen.insert(hkl, bit);
            }
            Some(mask) => {
                if centric || *mask & bit != 0 {
                    data_type = DataType::Unmerged;
                    break;
                }
                *mask |= bit;
                data_type = DataType::Anomalous;
            }
        }
        offset += stride;
    }
    (data_type, seen.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetry::SpaceGroupRegistry;
    use std::borrow::Cow;

    fn store_with<'a>(sg: Option<&'a SpaceGroup>, rows: &[(Miller, FriedelSign)]) -> Intensities<'a> {
        let mut intensities = Intensities::new();
        intensities.spacegroup = sg.map(Cow::Borrowed);
        for &(hkl, sign) in rows {
            intensities.add_if_valid(hkl, sign, 0, 1.0, 1.0);
        }
        intensities
    }

    #[test]
    fn test_without_spacegroup_is_unknown() {
        let data = store_with(None, &[([1, 2, 3], FriedelSign::None)]);
        assert_eq!(check_data_type_under_symmetry(&data, None), (DataType::Unknown, 0));
    }

    #[test]
    fn test_mean_anomalous_unmerged() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let sg = registry.find("P 21 21 21");

        let mean = store_with(sg, &[([1, 2, 3], FriedelSign::None), ([2, 2, 3], FriedelSign::None)]);
        assert_eq!(check_data_type_under_symmetry(&mean, sg), (DataType::Mean, 2));

        // (1,2,3) 与 (-1,-2,-3) 是 Friedel 对
        let anom = store_with(sg, &[([1, 2, 3], FriedelSign::None), ([-1, -2, -3], FriedelSign::None)]);
        assert_eq!(check_data_type_under_symmetry(&anom, sg), (DataType::Anomalous, 1));

        // (-1,-2,3) 与 (1,2,3) 对称等价且同一取向
        let unmerged = store_with(sg, &[([1, 2, 3], FriedelSign::None), ([-1, -2, 3], FriedelSign::None)]);
        assert_eq!(check_data_type_under_symmetry(&unmerged, sg).0, DataType::Unmerged);
    }

    #[test]
    fn test_centrosymmetric_repeat_is_unmerged() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let sg = registry.find("P -1");
        let data = store_with(sg, &[([1, 2, 3], FriedelSign::None), ([-1, -2, -3], FriedelSign::None)]);
        assert_eq!(check_data_type_under_symmetry(&data, sg).0, DataType::Unmerged);
    }

    #[test]
    fn test_unmerged_is_final() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let sg = registry.find("P 1");
        let data = store_with(
            sg,
            &[
                ([1, 2, 3], FriedelSign::None),
                ([1, 2, 3], FriedelSign::None),
                ([-1, -2, -3], FriedelSign::None),
            ],
        );
        assert_eq!(check_data_type_under_symmetry(&data, sg).0, DataType::Unmerged);
    }

    #[test]
    fn test_reclassify_anomalous_store() {
        let registry = SpaceGroupRegistry::standard().unwrap();
        let sg = registry.find("P 21 21 21");
        let data = store_with(sg, &[([1, 2, 3], FriedelSign::Minus), ([1, 2, 3], FriedelSign::Plus)]);
        assert_eq!(check_data_type_under_symmetry(&data, sg), (DataType::Anomalous, 1));
    }

    #[test]
    fn test_mtz_stride() {
        let mut mtz = MtzTable::new("t.csv");
        for label in ["H", "K", "L", "I", "SIGI"] {
            mtz.add_column(label, 'R', 0);
        }
        mtz.push_row(&[1.0, 2.0, 3.0, 10.0, 1.0]);
        mtz.push_row(&[-1.0, -2.0, -3.0, 11.0, 1.0]);
        let registry = SpaceGroupRegistry::standard().unwrap();
        let sg = registry.find("P 1");
        assert_eq!(check_data_type_under_symmetry(&mtz, sg), (DataType::Anomalous, 1));
    }
}
