//! 字段引用与字段类型
//!
//! 一个字段（token）通过以下三种方式之一引用正则捕获：
//! - 单个捕获组（序号或名称）
//! - 有序的“字面量 / 捕获组”片段列表，按序拼接
//! - 日期描述：按日期分量（年、月、日……）分别指向捕获组
use indexmap::IndexMap;
use regex::{Captures, Regex};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// 捕获组引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupRef {
    Index(usize),
    Name(String),
}

impl GroupRef {
    /// 取捕获值；组不存在或未参与匹配时为空串
    pub(crate) fn value<'t>(&self, caps: &Captures<'t>) -> &'t str {
        let m = match self {
            GroupRef::Index(i) => caps.get(*i),
            GroupRef::Name(n) => caps.name(n),
        };
        m.map(|m| m.as_str()).unwrap_or("")
    }
}

/// 组合字段的片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Literal(String),
    Group(usize),
}

/// 日期分量（键名沿用日期格式字母：Y m M d H i s z U r c）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateComponent {
    Year,
    Month,
    MonthName,
    Day,
    Hour,
    Minute,
    Second,
    Offset,
    Unix,
    Rfc2822,
    Iso8601,
}

impl DateComponent {
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "Y" => Self::Year,
            "m" => Self::Month,
            "M" => Self::MonthName,
            "d" => Self::Day,
            "H" => Self::Hour,
            "i" => Self::Minute,
            "s" => Self::Second,
            "z" => Self::Offset,
            "U" => Self::Unix,
            "r" => Self::Rfc2822,
            "c" => Self::Iso8601,
            _ => return None,
        })
    }
}

/// 字段引用（三选一）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef {
    Group(GroupRef),
    Parts(Vec<Part>),
    Date(Vec<(DateComponent, GroupRef)>),
}

/// 字段类型：普通文本，或带可选输出格式的日期
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldType {
    #[default]
    Text,
    Date { format: Option<String> },
}

impl FieldType {
    /// 解析类型描述：`date`、`date:FORMAT` 为日期，其余均为文本。
    /// 末尾的 `/N`（纯数字）是展示宽度，去掉。
    pub fn parse(desc: &str) -> Self {
        let desc = match desc.rsplit_once('/') {
            Some((head, width)) if !width.is_empty() && width.bytes().all(|b| b.is_ascii_digit()) => head,
            _ => desc,
        };
        if desc == "date" {
            return FieldType::Date { format: None };
        }
        match desc.strip_prefix("date:") {
            Some(fmt) if !fmt.trim().is_empty() => FieldType::Date { format: Some(fmt.trim().to_string()) },
            Some(_) => FieldType::Date { format: None },
            None => FieldType::Text,
        }
    }
}

/// 一种日志格式：记录正则 + 有序字段表 + 字段类型
#[derive(Debug, Clone)]
pub struct LineFormat {
    pub pattern: Regex,
    pub fields: IndexMap<String, FieldRef>,
    pub types: HashMap<String, FieldType>,
}

impl LineFormat {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern, fields: IndexMap::new(), types: HashMap::new() }
    }

    /// 追加一个字段（保持声明顺序）
    pub fn field(mut self, token: impl Into<String>, reference: FieldRef) -> Self {
        self.fields.insert(token.into(), reference);
        self
    }

    /// 设置字段类型
    pub fn typed(mut self, token: impl Into<String>, kind: FieldType) -> Self {
        self.types.insert(token.into(), kind);
        self
    }

    pub(crate) fn kind_of(&self, token: &str) -> &FieldType {
        static TEXT: FieldType = FieldType::Text;
        self.types.get(token).unwrap_or(&TEXT)
    }

    /// 校验字段引用的捕获组序号都在正则的组数范围内
    pub fn validate(&self) -> Result<()> {
        let groups = self.pattern.captures_len();
        for (token, reference) in &self.fields {
            let mut indexes: Vec<usize> = Vec::new();
            match reference {
                FieldRef::Group(GroupRef::Index(i)) => indexes.push(*i),
                FieldRef::Parts(parts) => indexes.extend(parts.iter().filter_map(|p| match p {
                    Part::Group(i) => Some(*i),
                    Part::Literal(_) => None,
                })),
                FieldRef::Date(parts) => indexes.extend(parts.iter().filter_map(|(_, g)| match g {
                    GroupRef::Index(i) => Some(*i),
                    GroupRef::Name(_) => None,
                })),
                FieldRef::Group(GroupRef::Name(_)) => {}
            }
            if let Some(bad) = indexes.into_iter().find(|i| *i >= groups) {
                return Err(Error::Profile(format!(
                    "field {token:?} references group {bad} but the pattern has {} groups",
                    groups - 1
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_type_parsing() {
        assert_eq!(FieldType::parse("txt"), FieldType::Text);
        assert_eq!(FieldType::parse("badge:severity"), FieldType::Text);
        assert_eq!(FieldType::parse("date"), FieldType::Date { format: None });
        assert_eq!(FieldType::parse("date:H:i:s/100"), FieldType::Date { format: Some("H:i:s".into()) });
        assert_eq!(FieldType::parse("date:Y/m/d"), FieldType::Date { format: Some("Y/m/d".into()) });
    }

    #[test]
    fn validate_rejects_out_of_range_group() {
        let fmt = LineFormat::new(Regex::new(r"^(\w+) (\w+)$").unwrap())
            .field("a", FieldRef::Group(GroupRef::Index(2)))
            .field("b", FieldRef::Parts(vec![Part::Group(3)]));
        assert!(fmt.validate().is_err());
    }
}
