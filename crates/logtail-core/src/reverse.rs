//! 反向读行器：从给定位置向文件开头逐块回读，按“最新在前”产出逻辑行
//!
//! 约定：
//! - 扫描范围是 `[0, end)`，从 `end` 向前推进；
//! - 读到文件开头视为一个隐式换行，把最顶部（最旧）的一行冲刷出来；
//! - `position()` 之后（含）的字节均已消费，可原样作为下一次的 `end`。
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Error, Result};
use crate::text::{decode_line, is_blank, trim_cr};

/// 回读块大小
pub(crate) const REVERSE_CHUNK: u64 = 8 * 1024;

/// 一条原始行及其起始偏移
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawLine {
    pub(crate) bytes: Vec<u8>,
    pub(crate) start: u64,
}

pub(crate) struct ReverseLineReader<R> {
    inner: R,
    /// 当前缓存块，覆盖 `[chunk_start, chunk_start + chunk.len())`
    chunk: Vec<u8>,
    chunk_start: u64,
    pos: u64,
    finished: bool,
}

impl<R: Read + Seek> ReverseLineReader<R> {
    pub(crate) fn new(inner: R, end: u64) -> Self {
        Self { inner, chunk: Vec::new(), chunk_start: end, pos: end, finished: false }
    }

    pub(crate) fn position(&self) -> u64 {
        self.pos
    }

    /// 载入 `pos` 之前的一块
    fn load_previous(&mut self) -> io::Result<()> {
        let start = self.pos.saturating_sub(REVERSE_CHUNK);
        let len = (self.pos - start) as usize;
        self.inner.seek(SeekFrom::Start(start))?;
        self.chunk.resize(len, 0);
        self.inner.read_exact(&mut self.chunk)?;
        self.chunk_start = start;
        Ok(())
    }

    /// 下一条（更旧的）行；已到文件开头且冲刷完毕后返回 None
    pub(crate) fn next_line(&mut self) -> io::Result<Option<RawLine>> {
        if self.finished {
            return Ok(None);
        }
        // 片段按从后往前的顺序收集，最后反转拼接
        let mut pieces: Vec<Vec<u8>> = Vec::new();
        loop {
            if self.pos == 0 {
                self.finished = true;
                return Ok(Some(RawLine { bytes: join_reversed(pieces), start: 0 }));
            }
            if self.pos <= self.chunk_start {
                self.load_previous()?;
            }
            let upto = (self.pos - self.chunk_start) as usize;
            let window = &self.chunk[..upto];
            match window.iter().rposition(|&b| b == b'\n') {
                Some(nl) => {
                    pieces.push(window[nl + 1..].to_vec());
                    self.pos = self.chunk_start + nl as u64;
                    return Ok(Some(RawLine { bytes: join_reversed(pieces), start: self.pos + 1 }));
                }
                None => {
                    pieces.push(window.to_vec());
                    self.pos = self.chunk_start;
                }
            }
        }
    }
}

fn join_reversed(mut pieces: Vec<Vec<u8>>) -> Vec<u8> {
    if pieces.len() == 1 {
        return pieces.pop().unwrap_or_default();
    }
    pieces.into_iter().rev().flatten().collect()
}

/// 读取文件末尾的 `count` 条非空行（最新在前）
pub fn lines_from_bottom(path: &Path, count: usize) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|source| Error::Open { path: path.to_path_buf(), source })?;
    let end = file.metadata()?.len();
    let mut reader = ReverseLineReader::new(file, end);
    let want = count.max(1);
    let mut lines = Vec::with_capacity(want);
    while let Some(raw) = reader.next_line()? {
        let text = decode_line(trim_cr(&raw.bytes));
        if is_blank(&text) {
            continue;
        }
        lines.push(text.into_owned());
        if lines.len() == want {
            break;
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor as IoCursor;

    fn collect(data: &[u8], end: u64) -> Vec<(String, u64)> {
        let mut r = ReverseLineReader::new(IoCursor::new(data.to_vec()), end);
        let mut out = Vec::new();
        while let Some(l) = r.next_line().unwrap() {
            out.push((String::from_utf8(l.bytes).unwrap(), l.start));
        }
        out
    }

    #[test]
    fn yields_newest_first_with_offsets() {
        let data = b"aa\nbbb\ncc\n";
        let lines = collect(data, data.len() as u64);
        assert_eq!(
            lines,
            vec![("".into(), 10), ("cc".into(), 7), ("bbb".into(), 3), ("aa".into(), 0)]
        );
    }

    #[test]
    fn bof_flushes_unterminated_top_line() {
        let data = b"first\nsecond";
        let lines = collect(data, data.len() as u64);
        assert_eq!(lines, vec![("second".into(), 6), ("first".into(), 0)]);
    }

    #[test]
    fn lines_spanning_chunks() {
        let long = "x".repeat(REVERSE_CHUNK as usize * 2 + 17);
        let data = format!("head\n{long}\ntail");
        let lines = collect(data.as_bytes(), data.len() as u64);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].0, long);
        assert_eq!(lines[1].1, 5);
        assert_eq!(lines[2].0, "head");
    }

    #[test]
    fn position_resumes_without_duplicates() {
        let data = b"one\ntwo\nthree\n";
        let mut r = ReverseLineReader::new(IoCursor::new(data.to_vec()), data.len() as u64);
        r.next_line().unwrap(); // trailing empty line
        assert_eq!(r.next_line().unwrap().unwrap().bytes, b"three");
        let resume = r.position();
        let rest = collect(data, resume);
        let texts: Vec<_> = rest.into_iter().map(|(t, _)| t).collect();
        assert_eq!(texts, vec!["two", "one"]);
    }

    #[test]
    fn empty_range_yields_single_empty_line() {
        assert_eq!(collect(b"abc", 0), vec![("".into(), 0)]);
    }
}
