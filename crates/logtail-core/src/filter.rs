//! 记录过滤：字段排除规则 + 全局搜索表达式
use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashMap;

use crate::patterns::{compile_lenient, search_regex};
use crate::types::Record;

/// 搜索模式：每次调用解析一次并回报给调用方
#[derive(Debug, Clone, Default)]
pub enum SearchMode {
    #[default]
    None,
    /// 区分大小写的子串包含
    Substring(String),
    Regex(Regex),
}

impl SearchMode {
    /// 空串为 None；合法的定界正则为 Regex；其余按子串处理
    pub fn resolve(expr: &str) -> Self {
        if expr.is_empty() {
            return SearchMode::None;
        }
        match search_regex(expr) {
            Some(rx) => SearchMode::Regex(rx),
            None => SearchMode::Substring(expr.to_string()),
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, SearchMode::Regex(_))
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            SearchMode::None => true,
            SearchMode::Substring(needle) => text.contains(needle.as_str()),
            SearchMode::Regex(rx) => rx.is_match(text),
        }
    }
}

/// 记录过滤器（每次扫描构建一次）
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    exclusions: HashMap<String, Vec<Regex>>,
    search: SearchMode,
}

impl RecordFilter {
    /// 编译排除规则；非法规则被丢弃（等价于永不命中）
    pub fn new(exclude: &IndexMap<String, Vec<String>>, search: &str) -> Self {
        let exclusions = exclude
            .iter()
            .map(|(token, pats)| (token.clone(), pats.iter().filter_map(|p| compile_lenient(p)).collect::<Vec<_>>()))
            .filter(|(_, rxs)| !rxs.is_empty())
            .collect();
        Self { exclusions, search: SearchMode::resolve(search) }
    }

    pub fn search_mode(&self) -> &SearchMode {
        &self.search
    }

    /// 任一字段命中任一排除规则即拒绝（短路）
    pub fn is_excluded(&self, record: &Record) -> bool {
        record.fields.iter().any(|(token, value)| {
            self.exclusions
                .get(token)
                .is_some_and(|rxs| rxs.iter().any(|rx| rx.is_match(value)))
        })
    }

    /// 先排除、后搜索；`text` 为原始文本（含多行续行）
    pub fn pass(&self, record: &Record, text: &str) -> bool {
        !self.is_excluded(record) && self.search.matches(text)
    }
}
