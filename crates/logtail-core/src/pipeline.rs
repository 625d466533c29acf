//! 单条候选记录的处理流水线：提取 → 续行合并 → 过滤 → 计数
use crate::budget::TimeBudget;
use crate::extract::FieldExtractor;
use crate::filter::RecordFilter;
use crate::options::ScanRequest;
use crate::types::Record;

/// 两种读取模式共享的累计状态
#[derive(Debug, Default)]
pub(crate) struct Tally {
    pub(crate) records: Vec<Record>,
    pub(crate) skipped: usize,
    pub(crate) errors: usize,
    pub(crate) bytes: u64,
    pub(crate) aborted: bool,
    pub(crate) rotated: bool,
    pub(crate) full: bool,
    pub(crate) last_line: String,
    pub(crate) last_parsed_offset: u64,
}

/// 候选记录的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Kept,
    Skipped,
    /// 正则未匹配；由调用方决定算作续行还是错误行
    Unmatched,
}

pub(crate) struct Pipeline<'a> {
    extractor: FieldExtractor<'a>,
    filter: RecordFilter,
    multiline: Option<&'a str>,
    pub(crate) budget: TimeBudget,
}

impl<'a> Pipeline<'a> {
    pub(crate) fn new(req: &'a ScanRequest, budget: TimeBudget) -> Self {
        Self {
            extractor: FieldExtractor::new(&req.format, req.timezone),
            filter: RecordFilter::new(&req.exclude, &req.search),
            multiline: req.multiline.as_deref().filter(|m| !m.is_empty()),
            budget,
        }
    }

    pub(crate) fn multiline_enabled(&self) -> bool {
        self.multiline.is_some()
    }

    pub(crate) fn regex_search(&self) -> bool {
        self.filter.search_mode().is_regex()
    }

    /// 处理一条候选记录。`orphans` 为缓冲的续行（最新在前），
    /// 匹配成功时按原始顺序追加到多行目标字段与原始文本之后。
    pub(crate) fn admit(&self, text: &str, offset: u64, orphans: &[String], tally: &mut Tally) -> Admission {
        let Some(mut record) = self.extractor.parse(text) else {
            return Admission::Unmatched;
        };
        record.offset = offset;

        if !orphans.is_empty() {
            let tail = orphans.iter().rev().map(String::as_str).collect::<Vec<_>>().join("\n");
            if let Some(value) = self.multiline.and_then(|target| record.fields.get_mut(target)) {
                value.push('\n');
                value.push_str(&tail);
            }
            record.raw.push('\n');
            record.raw.push_str(&tail);
        }

        if self.filter.pass(&record, &record.raw) {
            tally.records.push(record);
            Admission::Kept
        } else {
            tally.skipped += 1;
            Admission::Skipped
        }
    }
}
