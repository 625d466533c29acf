//! 扫描请求与游标（模块）
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::fields::LineFormat;
use crate::types::ScanResult;

/// 默认期望记录数
pub const DEFAULT_COUNT: usize = 10;
/// 默认最长扫描时间
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(3);

/// 偏移基准，对应标准 seek 的三种起点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetOrigin {
    Start,
    /// 新打开的句柄位于 0，因此与 Start 等价
    Current,
    #[default]
    End,
}

impl OffsetOrigin {
    /// 把 (基准, 偏移) 换算成绝对位置，并夹在 `[0, size]` 内
    pub(crate) fn resolve(self, offset: i64, size: u64) -> u64 {
        let base: i128 = match self {
            OffsetOrigin::Start | OffsetOrigin::Current => 0,
            OffsetOrigin::End => size as i128,
        };
        (base + offset as i128).clamp(0, size as i128) as u64
    }
}

/// 调用方在两次轮询之间保存的全部状态
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// 上次返回的 `lpo`
    pub offset: u64,
    /// 上次返回的 `lastline`
    pub last_line: String,
    /// 上次扫描时的文件大小，用来计算本次的字节预算
    pub file_size: u64,
}

impl Cursor {
    /// 用一次扫描的结果推进游标。
    /// - 加载更多只移动 `offset`，末行指纹与文件大小仍属于增量轮询；
    /// - 增量轮询只更新指纹与大小，`offset` 保持在已加载历史的最旧处；
    /// - 首次加载、全量或轮转后的结果同时重置 `offset`。
    pub fn advance(&mut self, res: &ScanResult, load_more: bool) {
        if load_more {
            self.offset = res.last_parsed_offset;
            return;
        }
        let fresh = self.last_line.is_empty() && self.file_size == 0;
        if res.full || fresh {
            self.offset = res.last_parsed_offset;
        }
        // 块模式下没有新块时不产出指纹，沿用上一次的
        if !res.last_line.is_empty() || res.full {
            self.last_line = res.last_line.clone();
        }
        self.file_size = res.file_size;
    }
}

/// 一次扫描请求（值对象，由调用方持有）
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub path: PathBuf,
    /// 记录正则、字段表与字段类型
    pub format: LineFormat,
    pub timezone: Option<Tz>,
    /// 期望返回的记录数
    pub count: usize,
    /// token -> 排除正则列表（任一命中即丢弃）
    pub exclude: IndexMap<String, Vec<String>>,
    pub start_offset: i64,
    pub origin: OffsetOrigin,
    /// 加载更旧记录：从已知偏移继续，不做轮转检测
    pub load_more: bool,
    /// 上一次的末行指纹；为空表示没有历史游标
    pub previous_fingerprint: String,
    /// 续行追加到的字段；None 表示不启用多行
    pub multiline: Option<String>,
    /// 搜索表达式：空、子串或 `/regex/flags`
    pub search: String,
    /// 增量读取的字节预算（通常为两次文件大小之差）
    pub byte_budget: u64,
    pub full: bool,
    pub max_duration: Duration,
    /// 块起始标记；非空即切换到块模式
    pub block_start: Option<String>,
}

impl ScanRequest {
    pub fn new(path: impl Into<PathBuf>, format: LineFormat) -> Self {
        Self {
            path: path.into(),
            format,
            timezone: None,
            count: DEFAULT_COUNT,
            exclude: IndexMap::new(),
            start_offset: 0,
            origin: OffsetOrigin::End,
            load_more: false,
            previous_fingerprint: String::new(),
            multiline: None,
            search: String::new(),
            byte_budget: 0,
            full: false,
            max_duration: DEFAULT_MAX_DURATION,
            block_start: None,
        }
    }

    /// 增量轮询：带上次的末行指纹，字节预算为文件增长量
    pub fn follow(mut self, cursor: &Cursor, current_size: u64) -> Self {
        self.previous_fingerprint = cursor.last_line.clone();
        self.byte_budget = current_size.saturating_sub(cursor.file_size);
        self.origin = OffsetOrigin::End;
        self.start_offset = 0;
        self.load_more = false;
        self
    }

    /// 加载更旧的记录：从上次的 `lpo` 继续
    pub fn load_more(mut self, cursor: &Cursor) -> Self {
        self.origin = OffsetOrigin::Start;
        self.start_offset = cursor.offset as i64;
        self.load_more = true;
        self
    }

    /// 是否为块模式
    pub fn is_block_mode(&self) -> bool {
        self.block_start.as_deref().is_some_and(|m| !m.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_resolution_is_clamped() {
        assert_eq!(OffsetOrigin::End.resolve(0, 100), 100);
        assert_eq!(OffsetOrigin::End.resolve(-30, 100), 70);
        assert_eq!(OffsetOrigin::End.resolve(-300, 100), 0);
        assert_eq!(OffsetOrigin::Start.resolve(40, 100), 40);
        assert_eq!(OffsetOrigin::Current.resolve(400, 100), 100);
    }

    #[test]
    fn follow_computes_budget_from_growth() {
        let fmt = LineFormat::new(regex::Regex::new("(.*)").unwrap());
        let cursor = Cursor { offset: 5, last_line: "abc".into(), file_size: 100 };
        let req = ScanRequest::new("/tmp/x.log", fmt.clone()).follow(&cursor, 160);
        assert_eq!(req.byte_budget, 60);
        assert_eq!(req.previous_fingerprint, "abc");
        let older = ScanRequest::new("/tmp/x.log", fmt).load_more(&cursor);
        assert!(older.load_more);
        assert_eq!(older.origin, OffsetOrigin::Start);
        assert_eq!(older.start_offset, 5);
    }

    fn result(lpo: u64, last_line: &str, size: u64, full: bool) -> ScanResult {
        ScanResult { last_parsed_offset: lpo, last_line: last_line.into(), file_size: size, full, ..ScanResult::default() }
    }

    #[test]
    fn advance_keeps_follow_and_history_apart() {
        let mut cursor = Cursor::default();
        cursor.advance(&result(300, "newest", 400, true), false);
        assert_eq!(cursor, Cursor { offset: 300, last_line: "newest".into(), file_size: 400 });

        // 加载更多不动指纹
        cursor.advance(&result(120, "middle", 400, false), true);
        assert_eq!(cursor, Cursor { offset: 120, last_line: "newest".into(), file_size: 400 });

        // 增量轮询不动历史位置
        cursor.advance(&result(390, "appended", 450, false), false);
        assert_eq!(cursor, Cursor { offset: 120, last_line: "appended".into(), file_size: 450 });

        // 轮转后的全量结果重置全部
        cursor.advance(&result(0, "fresh", 50, true), false);
        assert_eq!(cursor, Cursor { offset: 0, last_line: "fresh".into(), file_size: 50 });
    }
}
