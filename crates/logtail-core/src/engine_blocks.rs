//! 块模式读取器：按块起始标记把连续的原始行归并为一条记录
//!
//! 与行模式不同，块模式正向读取：先定位到一个完整块的开头，
//! 再逐行前进；遇到起始标记即关闭上一块并开启新块。
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use tracing::debug;

use crate::error::Result;
use crate::fingerprint::line_fingerprint;
use crate::options::{OffsetOrigin, ScanRequest};
use crate::pipeline::{Admission, Pipeline, Tally};
use crate::text::{decode_line, trim_eol};

/// 非全量扫描时至少回退的字节数，用来找到上一个块的开头
pub(crate) const BLOCK_LOOKBACK: u64 = 64 * 1024;

/// 正在累积的块
struct OpenBlock {
    start: u64,
    text: String,
}

impl OpenBlock {
    fn last_line(&self) -> &str {
        self.text.rsplit('\n').next().unwrap_or("")
    }
}

/// 块模式扫描
pub(crate) fn scan_blocks(
    file: File,
    size: u64,
    req: &ScanRequest,
    marker: Option<&Regex>,
    pipe: &Pipeline<'_>,
) -> Result<Tally> {
    let mut reader = BufReader::new(file);
    let mut tally = Tally { full: req.full, ..Tally::default() };
    let mut pos = seek_first_block(&mut reader, size, req, marker, &mut tally)?;
    debug!(path = %req.path.display(), offset = pos, "block scan positioned");

    let mut block: Option<OpenBlock> = None;
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            break;
        }
        let line_start = pos;
        pos += n as u64;
        tally.bytes += n as u64;
        let text = decode_line(trim_eol(&line));

        if is_marker(marker, &text) {
            if let Some(done) = block.take() {
                close_block(done, pipe, &mut tally);
                if tally.records.len() >= req.count {
                    // 触发关闭的起始行尚未处理，游标停在它的开头
                    pos = line_start;
                    tally.bytes -= n as u64;
                    break;
                }
            }
            block = Some(OpenBlock { start: line_start, text: text.into_owned() });
        } else if let Some(open) = block.as_mut() {
            open.text.push('\n');
            open.text.push_str(&text);
        }

        if pipe.budget.expired() {
            debug!(path = %req.path.display(), records = tally.records.len(), "scan deadline reached");
            tally.aborted = true;
            break;
        }
    }

    // 冲刷最后一个未关闭的块
    if let Some(open) = block.take() {
        close_block(open, pipe, &mut tally);
    }

    tally.last_parsed_offset = pos;
    if !req.load_more && !req.full {
        tally.records.reverse();
    }
    Ok(tally)
}

fn is_marker(marker: Option<&Regex>, text: &str) -> bool {
    marker.is_some_and(|rx| rx.is_match(text))
}

fn close_block(block: OpenBlock, pipe: &Pipeline<'_>, tally: &mut Tally) {
    match pipe.admit(&block.text, block.start, &[], tally) {
        Admission::Kept => tally.last_line = line_fingerprint(block.last_line()),
        Admission::Skipped => {}
        Admission::Unmatched => tally.errors += 1,
    }
}

/// 定位起点：加载更多时从给定偏移继续；全量时从 0 开始；
/// 否则从末尾回退 `max(预算, 64KB)`，再前进到第一个块起始行的开头
fn seek_first_block(
    reader: &mut BufReader<File>,
    size: u64,
    req: &ScanRequest,
    marker: Option<&Regex>,
    tally: &mut Tally,
) -> Result<u64> {
    if req.load_more && req.origin == OffsetOrigin::Start {
        let at = req.origin.resolve(req.start_offset, size);
        reader.seek(SeekFrom::Start(at))?;
        return Ok(at);
    }
    if req.full {
        reader.seek(SeekFrom::Start(0))?;
        return Ok(0);
    }

    let from = size.saturating_sub(req.byte_budget.max(BLOCK_LOOKBACK));
    reader.seek(SeekFrom::Start(from))?;
    let mut pos = from;
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            return Ok(pos);
        }
        if is_marker(marker, &decode_line(trim_eol(&line))) {
            // 回到这一行的开头
            reader.seek(SeekFrom::Start(pos))?;
            return Ok(pos);
        }
        // 属于已交付过的块，丢弃
        pos += n as u64;
        tally.bytes += n as u64;
    }
}
