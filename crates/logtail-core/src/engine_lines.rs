//! 行模式读取器：从游标位置反向扫描，找出上次之后新增的逻辑行
//!
//! 扫描顺序是“最新在前”。未匹配的行在启用多行时先缓存为续行，
//! 等遇到其上方第一条匹配行时再合并进去。
use std::fs::File;
use tracing::{debug, warn};

use crate::error::Result;
use crate::fingerprint::line_fingerprint;
use crate::options::ScanRequest;
use crate::pipeline::{Admission, Pipeline, Tally};
use crate::reverse::ReverseLineReader;
use crate::text::{decode_line, is_blank, trim_cr};

/// 行模式扫描
pub(crate) fn scan_lines(file: File, size: u64, req: &ScanRequest, pipe: &Pipeline<'_>) -> Result<Tally> {
    let end = req.origin.resolve(req.start_offset, size);
    let mut reader = ReverseLineReader::new(file, end);
    let mut tally = Tally { full: req.full, ..Tally::default() };

    // 加载更旧记录、或没有历史指纹时，不做轮转检测
    let check_rotation = !req.load_more && !req.previous_fingerprint.is_empty();
    // 续行缓存（最新在前）
    let mut orphans: Vec<String> = Vec::new();

    while let Some(raw) = reader.next_line()? {
        let text = decode_line(trim_cr(&raw.bytes));
        if !is_blank(&text) {
            tally.bytes += raw.bytes.len() as u64;

            // 第一条非空行即文件最后一条逻辑行
            if tally.last_line.is_empty() {
                tally.last_line = line_fingerprint(&text);
            }

            // 超出字节预算后，这一行应当就是上次的最后一行
            if check_rotation && !tally.rotated && end - raw.start > req.byte_budget {
                if line_fingerprint(&text) == req.previous_fingerprint {
                    debug!(path = %req.path.display(), offset = raw.start, "reached last known line");
                    break;
                }
                warn!(path = %req.path.display(), budget = req.byte_budget, "last known line not found; file rotated or truncated");
                tally.rotated = true;
                tally.full = true;
            }

            match pipe.admit(&text, raw.start, &orphans, &mut tally) {
                Admission::Unmatched if pipe.multiline_enabled() => orphans.push(text.into_owned()),
                Admission::Unmatched => tally.errors += 1,
                Admission::Kept | Admission::Skipped => orphans.clear(),
            }

            if tally.records.len() >= req.count {
                break;
            }
        }

        if pipe.budget.expired() {
            debug!(path = %req.path.display(), records = tally.records.len(), "scan deadline reached");
            tally.aborted = true;
            break;
        }
    }

    tally.last_parsed_offset = reader.position();
    // 增量扫描保持“最新在前”，其余情况返回“最旧在前”
    if req.load_more || tally.full {
        tally.records.reverse();
    }
    Ok(tally)
}
