//! 字段提取：对一条逻辑记录应用格式正则，生成字段表
use chrono_tz::Tz;
use indexmap::IndexMap;
use regex::Captures;

use crate::dates::{coerce, source_from_components, DateSource};
use crate::fields::{DateComponent, FieldRef, FieldType, LineFormat, Part};
use crate::types::Record;

/// 字段提取器：借用格式定义，按目标时区做日期转换
pub struct FieldExtractor<'a> {
    format: &'a LineFormat,
    tz: Option<Tz>,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(format: &'a LineFormat, tz: Option<Tz>) -> Self {
        Self { format, tz }
    }

    /// 解析一条记录；正则一次都没匹配上时返回 None。
    /// 匹配成功时每个声明的字段都会有值（日期失败时为错误提示）。
    pub fn parse(&self, text: &str) -> Option<Record> {
        let caps = self.format.pattern.captures(text)?;
        let mut fields = IndexMap::with_capacity(self.format.fields.len());
        let mut timestamp = 0i64;

        for (token, reference) in &self.format.fields {
            let value = match self.format.kind_of(token) {
                FieldType::Date { format } => {
                    let (shown, ts) = coerce(resolve(reference, &caps), self.tz, format.as_deref());
                    timestamp = ts;
                    shown
                }
                FieldType::Text => match resolve(reference, &caps) {
                    DateSource::Epoch(n) => n.to_string(),
                    DateSource::Text(s) => s,
                },
            };
            fields.insert(token.clone(), value);
        }

        Some(Record {
            fields,
            raw: text.to_string(),
            offset: 0,
            timestamp: (timestamp > 0).then_some(timestamp),
        })
    }
}

/// 组合引用：字面量与捕获组按序拼接
fn join_parts(parts: &[Part], caps: &Captures<'_>) -> String {
    let mut out = String::new();
    for p in parts {
        match p {
            Part::Literal(s) => out.push_str(s),
            Part::Group(i) => out.push_str(caps.get(*i).map(|m| m.as_str()).unwrap_or("")),
        }
    }
    out
}

/// 按引用类型取值；日期描述在文本字段中展示为规范中间串
fn resolve(reference: &FieldRef, caps: &Captures<'_>) -> DateSource {
    match reference {
        FieldRef::Group(g) => DateSource::Text(g.value(caps).to_string()),
        FieldRef::Parts(parts) => DateSource::Text(join_parts(parts, caps)),
        FieldRef::Date(parts) => {
            let resolved: Vec<(DateComponent, &str)> = parts.iter().map(|(c, g)| (*c, g.value(caps))).collect();
            source_from_components(&resolved)
        }
    }
}
