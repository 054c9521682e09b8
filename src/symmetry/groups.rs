//! # 空间群注册表
//!
//! 只读的空间群表，由调用方显式构建后以引用方式传递。
//! 每个空间群用生成元（三元式）描述，完整操作集由生成元闭包得到。
//!
//! ## 依赖关系
//! - 被 `intensities/`, `parsers/`, `commands/` 使用
//! - 使用 `symmetry/ops.rs`

use crate::error::{HklError, Result};
use crate::models::Miller;
use crate::symmetry::ops::{negate, Op, DEN};

use std::borrow::Cow;
use std::collections::HashSet;

/// 空间群描述
#[derive(Debug, Clone)]
pub struct SpaceGroup {
    /// 国际表序号
    pub number: u32,
    /// 简短 H-M 符号，如 "C 2"
    pub hm: String,
    /// 扩展 H-M 符号，如 "C 1 2 1"
    pub xhm: String,
    /// 生成元
    pub generators: Vec<Op>,
}

impl SpaceGroup {
    /// 由表格给出的对称操作构建，序号未知记为 0
    pub fn from_symops(name: &str, symops: &[Op]) -> Self {
        SpaceGroup {
            number: 0,
            hm: name.to_string(),
            xhm: name.to_string(),
            generators: symops.to_vec(),
        }
    }

    /// 生成完整的对称操作集
    pub fn operations(&self) -> GroupOps {
        let mut ops = vec![Op::identity()];
        let mut i = 0;
        for gen in &self.generators {
            if !ops.contains(gen) {
                ops.push(*gen);
            }
        }
        // 闭包：不断组合直到不再产生新操作
        while i < ops.len() {
            let a = ops[i];
            let mut j = 0;
            while j < ops.len() {
                let c = a.combine(&ops[j]);
                if !ops.contains(&c) {
                    ops.push(c);
                }
                j += 1;
            }
            i += 1;
        }
        GroupOps { ops }
    }
}

/// 空间群的完整操作集
#[derive(Debug, Clone)]
pub struct GroupOps {
    pub ops: Vec<Op>,
}

impl GroupOps {
    pub fn order(&self) -> usize {
        self.ops.len()
    }

    /// 是否含对称中心
    pub fn is_centrosymmetric(&self) -> bool {
        self.ops.iter().any(|op| op.is_inversion())
    }

    /// 系统消光：存在操作使 hR = h 且 h·t 非整数
    pub fn is_systematically_absent(&self, hkl: &Miller) -> bool {
        self.ops
            .iter()
            .any(|op| op.apply_to_hkl(hkl) == *hkl && op.phase_shift(hkl).rem_euclid(DEN) != 0)
    }

    /// 中心衍射点：存在操作使 hR = -h
    pub fn is_reflection_centric(&self, hkl: &Miller) -> bool {
        let minus = negate(hkl);
        self.ops.iter().any(|op| op.apply_to_hkl(hkl) == minus)
    }
}

/// 空间群注册表
pub struct SpaceGroupRegistry {
    groups: Vec<SpaceGroup>,
}

/// (序号, 简短符号, 扩展符号, 生成元)
///
/// 同一序号有多个设置时，排在前面的是按序号查找时的默认设置。
const GROUP_TABLE: &[(u32, &str, &str, &[&str])] = &[
    (1, "P 1", "P 1", &[]),
    (2, "P -1", "P -1", &["-x,-y,-z"]),
    (3, "P 2", "P 1 2 1", &["-x,y,-z"]),
    (4, "P 21", "P 1 21 1", &["-x,y+1/2,-z"]),
    (5, "C 2", "C 1 2 1", &["-x,y,-z", "x+1/2,y+1/2,z"]),
    (5, "I 2", "I 1 2 1", &["-x,y,-z", "x+1/2,y+1/2,z+1/2"]),
    (14, "P 21/c", "P 1 21/c 1", &["-x,y+1/2,-z+1/2", "-x,-y,-z"]),
    (16, "P 2 2 2", "P 2 2 2", &["-x,-y,z", "-x,y,-z"]),
    (17, "P 2 2 21", "P 2 2 21", &["-x,-y,z+1/2", "-x,y,-z+1/2"]),
    (18, "P 21 21 2", "P 21 21 2", &["-x,-y,z", "-x+1/2,y+1/2,-z"]),
    (19, "P 21 21 21", "P 21 21 21", &["-x+1/2,-y,z+1/2", "-x,y+1/2,-z+1/2"]),
    (20, "C 2 2 21", "C 2 2 21", &["-x,-y,z+1/2", "-x,y,-z+1/2", "x+1/2,y+1/2,z"]),
    (21, "C 2 2 2", "C 2 2 2", &["-x,-y,z", "-x,y,-z", "x+1/2,y+1/2,z"]),
    (22, "F 2 2 2", "F 2 2 2", &["-x,-y,z", "-x,y,-z", "x,y+1/2,z+1/2", "x+1/2,y,z+1/2"]),
    (23, "I 2 2 2", "I 2 2 2", &["-x,-y,z", "-x,y,-z", "x+1/2,y+1/2,z+1/2"]),
    (24, "I 21 21 21", "I 21 21 21", &["-x+1/2,-y,z+1/2", "-x,y+1/2,-z+1/2", "x+1/2,y+1/2,z+1/2"]),
    (75, "P 4", "P 4", &["-y,x,z"]),
    (76, "P 41", "P 41", &["-y,x,z+1/4"]),
    (77, "P 42", "P 42", &["-y,x,z+1/2"]),
    (78, "P 43", "P 43", &["-y,x,z+3/4"]),
    (79, "I 4", "I 4", &["-y,x,z", "x+1/2,y+1/2,z+1/2"]),
    (80, "I 41", "I 41", &["-y,x+1/2,z+1/4", "x+1/2,y+1/2,z+1/2"]),
    (89, "P 4 2 2", "P 4 2 2", &["-y,x,z", "-x,y,-z"]),
    (90, "P 4 21 2", "P 4 21 2", &["-y+1/2,x+1/2,z", "-x+1/2,y+1/2,-z"]),
    (91, "P 41 2 2", "P 41 2 2", &["-y,x,z+1/4", "-x,y,-z"]),
    (92, "P 41 21 2", "P 41 21 2", &["-y+1/2,x+1/2,z+1/4", "-x+1/2,y+1/2,-z+3/4"]),
    (93, "P 42 2 2", "P 42 2 2", &["-y,x,z+1/2", "-x,y,-z"]),
    (94, "P 42 21 2", "P 42 21 2", &["-y+1/2,x+1/2,z+1/2", "-x+1/2,y+1/2,-z+1/2"]),
    (95, "P 43 2 2", "P 43 2 2", &["-y,x,z+3/4", "-x,y,-z"]),
    (96, "P 43 21 2", "P 43 21 2", &["-y+1/2,x+1/2,z+3/4", "-x+1/2,y+1/2,-z+1/4"]),
    (97, "I 4 2 2", "I 4 2 2", &["-y,x,z", "-x,y,-z", "x+1/2,y+1/2,z+1/2"]),
    (98, "I 41 2 2", "I 41 2 2", &["-y,x+1/2,z+1/4", "-x+1/2,y,-z+3/4", "x+1/2,y+1/2,z+1/2"]),
    (143, "P 3", "P 3", &["-y,x-y,z"]),
    (144, "P 31", "P 31", &["-y,x-y,z+1/3"]),
    (145, "P 32", "P 32", &["-y,x-y,z+2/3"]),
    (146, "H 3", "R 3 :H", &["-y,x-y,z", "x+2/3,y+1/3,z+1/3"]),
    (149, "P 3 1 2", "P 3 1 2", &["-y,x-y,z", "-y,-x,-z"]),
    (150, "P 3 2 1", "P 3 2 1", &["-y,x-y,z", "y,x,-z"]),
    (151, "P 31 1 2", "P 31 1 2", &["-y,x-y,z+1/3", "-y,-x,-z+2/3"]),
    (152, "P 31 2 1", "P 31 2 1", &["-y,x-y,z+1/3", "y,x,-z"]),
    (153, "P 32 1 2", "P 32 1 2", &["-y,x-y,z+2/3", "-y,-x,-z+1/3"]),
    (154, "P 32 2 1", "P 32 2 1", &["-y,x-y,z+2/3", "y,x,-z"]),
    (155, "H 3 2", "R 3 2 :H", &["-y,x-y,z", "y,x,-z", "x+2/3,y+1/3,z+1/3"]),
    (146, "R 3 :R", "R 3 :R", &["z,x,y"]),
    (155, "R 3 2 :R", "R 3 2 :R", &["z,x,y", "-y,-x,-z"]),
    (168, "P 6", "P 6", &["x-y,x,z"]),
    (169, "P 61", "P 61", &["x-y,x,z+1/6"]),
    (170, "P 65", "P 65", &["x-y,x,z+5/6"]),
    (171, "P 62", "P 62", &["x-y,x,z+1/3"]),
    (172, "P 64", "P 64", &["x-y,x,z+2/3"]),
    (173, "P 63", "P 63", &["x-y,x,z+1/2"]),
    (177, "P 6 2 2", "P 6 2 2", &["x-y,x,z", "y,x,-z"]),
    (178, "P 61 2 2", "P 61 2 2", &["x-y,x,z+1/6", "y,x,-z+1/3"]),
    (179, "P 65 2 2", "P 65 2 2", &["x-y,x,z+5/6", "y,x,-z+2/3"]),
    (180, "P 62 2 2", "P 62 2 2", &["x-y,x,z+1/3", "y,x,-z+2/3"]),
    (181, "P 64 2 2", "P 64 2 2", &["x-y,x,z+2/3", "y,x,-z+1/3"]),
    (182, "P 63 2 2", "P 63 2 2", &["x-y,x,z+1/2", "y,x,-z"]),
    (195, "P 2 3", "P 2 3", &["-x,-y,z", "-x,y,-z", "z,x,y"]),
    (196, "F 2 3", "F 2 3", &["-x,-y,z", "-x,y,-z", "z,x,y", "x,y+1/2,z+1/2", "x+1/2,y,z+1/2"]),
    (197, "I 2 3", "I 2 3", &["-x,-y,z", "-x,y,-z", "z,x,y", "x+1/2,y+1/2,z+1/2"]),
    (198, "P 21 3", "P 21 3", &["-x+1/2,-y,z+1/2", "-x,y+1/2,-z+1/2", "z,x,y"]),
    (
        199,
        "I 21 3",
        "I 21 3",
        &[
            "-x+1/2,-y,z+1/2",
            "-x,y+1/2,-z+1/2",
            "z,x,y",
            "x+1/2,y+1/2,z+1/2",
        ],
    ),
    (207, "P 4 3 2", "P 4 3 2", &["-y,x,z", "z,x,y", "y,x,-z"]),
    (208, "P 42 3 2", "P 42 3 2", &["-y+1/2,x+1/2,z+1/2", "z,x,y"]),
    (209, "F 4 3 2", "F 4 3 2", &["-y,x,z", "z,x,y", "x,y+1/2,z+1/2", "x+1/2,y,z+1/2"]),
    (
        210,
        "F 41 3 2",
        "F 41 3 2",
        &[
            "-y+1/4,x+3/4,z+1/4",
            "z,x,y",
            "x,y+1/2,z+1/2",
            "x+1/2,y,z+1/2",
        ],
    ),
    (211, "I 4 3 2", "I 4 3 2", &["-y,x,z", "z,x,y", "x+1/2,y+1/2,z+1/2"]),
    (212, "P 43 3 2", "P 43 3 2", &["-y+3/4,x+1/4,z+3/4", "z,x,y"]),
    (213, "P 41 3 2", "P 41 3 2", &["-y+1/4,x+3/4,z+1/4", "z,x,y"]),
    (214, "I 41 3 2", "I 41 3 2", &["-y+1/4,x+3/4,z+1/4", "z,x,y", "x+1/2,y+1/2,z+1/2"]),
    (221, "P m -3 m", "P 4/m -3 2/m", &["-y,x,z", "z,x,y", "y,x,-z", "-x,-y,-z"]),
];

impl SpaceGroupRegistry {
    /// 构建内置空间群表
    pub fn standard() -> Result<Self> {
        let mut groups = Vec::with_capacity(GROUP_TABLE.len());
        for (number, hm, xhm, generators) in GROUP_TABLE {
            let generators = generators
                .iter()
                .map(|g| Op::from_triplet(g))
                .collect::<Result<Vec<_>>>()?;
            groups.push(SpaceGroup {
                number: *number,
                hm: hm.to_string(),
                xhm: xhm.to_string(),
                generators,
            });
        }
        Ok(SpaceGroupRegistry { groups })
    }

    pub fn get_by_number(&self, number: u32) -> Option<&SpaceGroup> {
        self.groups.iter().find(|g| g.number == number)
    }

    /// 按符号或序号查找（忽略大小写与空格）
    pub fn find(&self, name: &str) -> Option<&SpaceGroup> {
        let name = name.trim();
        if let Ok(number) = name.parse::<u32>() {
            return self.get_by_number(number);
        }
        let key = normalize_symbol(name);
        self.groups.iter().find(|g| {
            let xhm = normalize_symbol(&g.xhm);
            // 不带设置后缀的 "R 3" 指六方设置
            normalize_symbol(&g.hm) == key
                || xhm == key
                || xhm.strip_suffix(":H") == Some(key.as_str())
        })
    }

    /// 按完整操作集查找
    pub fn find_by_ops(&self, ops: &[Op]) -> Option<&SpaceGroup> {
        let target: HashSet<Op> = SpaceGroup::from_symops("", ops)
            .operations()
            .ops
            .into_iter()
            .collect();
        self.groups.iter().find(|g| {
            let gops = g.operations();
            gops.order() == target.len() && gops.ops.iter().all(|op| target.contains(op))
        })
    }

    /// 解析表格中的空间群名称与对称操作
    ///
    /// 名称不在表中但表格给出了对称操作时，先按操作集匹配表中的空间群，
    /// 仍找不到则直接由这些操作构建空间群。
    pub fn resolve(
        &self,
        name: Option<&str>,
        symops: &[Op],
    ) -> Result<Option<Cow<'_, SpaceGroup>>> {
        let name = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => return Ok(None),
        };
        if let Some(sg) = self.find(name) {
            return Ok(Some(Cow::Borrowed(sg)));
        }
        if symops.is_empty() {
            return Err(HklError::UnknownSpaceGroup(name.to_string()));
        }
        Ok(Some(match self.find_by_ops(symops) {
            Some(sg) => Cow::Borrowed(sg),
            None => Cow::Owned(SpaceGroup::from_symops(name, symops)),
        }))
    }

    /// 查找，找不到时报错
    pub fn require(&self, name: &str) -> Result<&SpaceGroup> {
        self.find(name)
            .ok_or_else(|| HklError::UnknownSpaceGroup(name.to_string()))
    }
}

fn normalize_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
