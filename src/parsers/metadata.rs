//! # 表头元数据
//!
//! CSV 表格文件开头的 `# key: value` 行，记录空间群、晶胞、波长等。
//!
//! ```text
//! # spacegroup: P 21 21 21
//! # cell: 50.1 60.2 70.3 90 90 90
//! # wavelength: 0.9795
//! # history: From STARANISO version: 2.3.80 ...
//! H,K,L,IMEAN,SIGIMEAN
//! ...
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mtz.rs`, `parsers/mmcif.rs` 使用

/// 有序的元数据条目（同一键可出现多次，如 history）
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub entries: Vec<(String, String)>,
}

impl Metadata {
    /// 第一个匹配键的值（键忽略大小写）
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// 所有匹配键的值
    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.clone())
            .collect()
    }
}

/// 拆分开头的元数据行和其后的表格正文
pub fn split_metadata(content: &str) -> (Metadata, String) {
    let mut metadata = Metadata::default();
    let mut body = String::new();
    let mut in_header = true;

    for line in content.lines() {
        let trimmed = line.trim();
        if in_header {
            if trimmed.is_empty() {
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix('#') {
                if let Some((key, value)) = rest.split_once(':') {
                    metadata
                        .entries
                        .push((key.trim().to_string(), value.trim().to_string()));
                }
                continue;
            }
            in_header = false;
        }
        body.push_str(line);
        body.push('\n');
    }

    (metadata, body)
}

/// 缺失值：`?`、`.`、空串、`nan`
pub fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || cell == "?" || cell == "." || cell.eq_ignore_ascii_case("nan")
}

/// 解析数值单元格，缺失或无法解析时返回 None
pub fn parse_number(cell: &str) -> Option<f64> {
    if is_missing(cell) {
        return None;
    }
    cell.trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_metadata() {
        let text = "# spacegroup: P 21 21 21\n# history: line one\n# history: B=(1, 2)\nH,K,L\n1,2,3\n";
        let (meta, body) = split_metadata(text);
        assert_eq!(meta.get("SpaceGroup"), Some("P 21 21 21"));
        assert_eq!(meta.get_all("history"), vec!["line one", "B=(1, 2)"]);
        assert_eq!(body, "H,K,L\n1,2,3\n");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" 1.5 "), Some(1.5));
        assert_eq!(parse_number("?"), None);
        assert_eq!(parse_number("."), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("abc"), None);
    }
}
