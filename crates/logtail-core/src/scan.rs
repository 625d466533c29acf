//! 扫描主流程（门面）与多文件并行轮询
use anyhow::{anyhow, Result as AnyResult};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::fs::{File, Metadata};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::budget::TimeBudget;
use crate::dates::format_instant;
use crate::engine_blocks::scan_blocks;
use crate::engine_lines::scan_lines;
use crate::error::{Error, Result};
use crate::fingerprint::records_fingerprint;
use crate::options::{Cursor, ScanRequest};
use crate::patterns::block_marker;
use crate::pipeline::Pipeline;
use crate::types::{PollItem, ScanResult};

/// 执行一次扫描：按是否配置块起始标记选择行模式或块模式，并组装结果信封。
/// 只有打开文件失败（以及之后的读取失败）会返回错误。
pub fn scan(req: &ScanRequest) -> Result<ScanResult> {
    let budget = TimeBudget::start(req.max_duration);
    let file = File::open(&req.path).map_err(|source| Error::Open { path: req.path.clone(), source })?;
    let meta = file.metadata()?;
    let size = meta.len();
    let (file_modified, file_modified_epoch) = modified_time(&meta, req.timezone);

    let pipe = Pipeline::new(req, budget);
    let tally = match req.block_start.as_deref().filter(|m| !m.is_empty()) {
        Some(marker) => {
            // 非法标记不让本次调用失败：没有任何行能开启新块
            let marker = match block_marker(marker) {
                Ok(rx) => Some(rx),
                Err(err) => {
                    warn!(path = %req.path.display(), %err, "invalid block marker; no block will start");
                    None
                }
            };
            debug!(path = %req.path.display(), marker = ?marker, "scanning in block mode");
            scan_blocks(file, size, req, marker.as_ref(), &pipe)?
        }
        None => {
            debug!(path = %req.path.display(), size, "scanning in line mode");
            scan_lines(file, size, req, &pipe)?
        }
    };

    Ok(ScanResult {
        fingerprint: records_fingerprint(&tally.records),
        count: tally.records.len(),
        found: !tally.records.is_empty(),
        records: tally.records,
        aborted: tally.aborted,
        rotated: tally.rotated,
        regex_search: pipe.regex_search(),
        search: req.search.clone(),
        full: tally.full,
        last_parsed_offset: tally.last_parsed_offset,
        bytes: tally.bytes,
        skipped: tally.skipped,
        errors: tally.errors,
        last_line: tally.last_line,
        duration_ms: budget.elapsed_ms(),
        file_size: size,
        file_modified,
        file_modified_epoch,
    })
}

/// 文件修改时间：格式化值（按请求时区）与时间戳
fn modified_time(meta: &Metadata, tz: Option<Tz>) -> (String, i64) {
    match meta.modified() {
        Ok(mtime) => {
            let dt: DateTime<Utc> = mtime.into();
            (format_instant(dt, tz, None), dt.timestamp())
        }
        Err(_) => (String::new(), 0),
    }
}

/// 一个轮询目标：一个文件对应一个独立的扫描请求，
/// 以及构造该请求时用到的游标（没有则为首次加载）
#[derive(Debug, Clone)]
pub struct PollTarget {
    pub id: String,
    pub request: ScanRequest,
    pub cursor: Option<Cursor>,
}

impl PollTarget {
    pub fn new(id: impl Into<String>, request: ScanRequest) -> Self {
        Self { id: id.into(), request, cursor: None }
    }

    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// 把扫描结果并入原游标，得到下一次应保存的游标
    pub fn next_cursor(&self, res: &ScanResult) -> Cursor {
        let mut cursor = self.cursor.clone().unwrap_or_default();
        cursor.advance(res, self.request.load_more);
        cursor
    }
}

/// 轮询统计信息（便于 CLI 打印）
#[derive(Debug, Default, Clone)]
pub struct PollStats {
    pub files_polled: usize,
    pub files_failed: usize,
    pub records_written: usize,
}

/// 轮询报告：统计 + 按输入顺序排列的新游标（失败为 None，调用方保留旧游标）
#[derive(Debug, Default, Clone)]
pub struct PollReport {
    pub stats: PollStats,
    pub cursors: Vec<Option<Cursor>>,
}

/// 把路径展开为文件列表：目录只取第一层文件，并按文件名排序
pub fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for p in paths {
        if !p.is_dir() {
            out.push(p.clone());
            continue;
        }
        let mut files: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(p).min_depth(1).max_depth(1) {
            let entry = match entry { Ok(e) => e, Err(_) => continue };
            if entry.file_type().is_file() { files.push(entry.into_path()); }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        out.extend(files);
    }
    out
}

/// 轮询所有目标，并将结果以 JSON 数组流式写入 `out`（顺序与输入一致）
/// - threads 为 None 时等于 CPU 核数；只有 1 个线程或 1 个目标时走串行
pub fn poll_and_write(targets: &[PollTarget], out: &mut dyn Write, threads: Option<usize>) -> AnyResult<PollReport> {
    let threads = threads.unwrap_or_else(num_cpus::get).max(1);
    let mut report = PollReport { stats: PollStats::default(), cursors: Vec::with_capacity(targets.len()) };

    if threads == 1 || targets.len() <= 1 {
        write!(out, "[")?;
        let mut first = true;
        for t in targets {
            let outcome = scan(&t.request).map_err(|e| e.to_string());
            emit(out, &mut first, t, outcome, &mut report)?;
        }
        write!(out, "]")?;
        return Ok(report);
    }

    poll_parallel(targets, out, threads, &mut report)?;
    Ok(report)
}

/// 写出单个目标的结果并累计统计
fn emit(
    out: &mut dyn Write,
    first: &mut bool,
    target: &PollTarget,
    outcome: std::result::Result<ScanResult, String>,
    report: &mut PollReport,
) -> AnyResult<()> {
    let path = target.request.path.display().to_string();
    let item = match &outcome {
        Ok(res) => {
            report.stats.files_polled += 1;
            report.stats.records_written += res.count;
            PollItem { id: &target.id, path: &path, result: Some(res), error: None }
        }
        Err(msg) => {
            report.stats.files_failed += 1;
            PollItem { id: &target.id, path: &path, result: None, error: Some(msg.as_str()) }
        }
    };
    if !*first { write!(out, ",")?; } else { *first = false; }
    serde_json::to_writer(&mut *out, &item)?;
    report.cursors.push(outcome.ok().map(|r| target.next_cursor(&r)));
    Ok(())
}

/// 并行调度：
/// - 后台线程内用 Rayon 线程池并行扫描
/// - 当前线程作为 Writer，按 idx 重排后流式写 JSON，保证稳定顺序
fn poll_parallel(targets: &[PollTarget], out: &mut dyn Write, threads: usize, report: &mut PollReport) -> AnyResult<()> {
    use crossbeam_channel as channel;
    use rayon::prelude::*;
    use std::collections::BTreeMap;

    type Msg = (usize /*idx*/, std::result::Result<ScanResult, String>);
    let (tx, rx) = channel::bounded::<Msg>(256);

    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
    let shared: Arc<Vec<PollTarget>> = Arc::new(targets.to_vec());
    let worker_targets = Arc::clone(&shared);

    let scan_thread = std::thread::spawn(move || {
        pool.install(|| {
            worker_targets.par_iter().enumerate().for_each(|(idx, t)| {
                let _ = tx.send((idx, scan(&t.request).map_err(|e| e.to_string())));
            });
        });
        // 结束后 Sender 被丢弃，Receiver 收到关闭信号
    });

    write!(out, "[")?;
    let mut first = true;
    let mut next_idx: usize = 0;
    let mut buffer: BTreeMap<usize, std::result::Result<ScanResult, String>> = BTreeMap::new();

    while let Ok((idx, outcome)) = rx.recv() {
        buffer.insert(idx, outcome);
        while let Some(outcome) = buffer.remove(&next_idx) {
            emit(out, &mut first, &shared[next_idx], outcome, report)?;
            next_idx += 1;
        }
    }
    join_worker(scan_thread)?;
    write!(out, "]")?;
    Ok(())
}

/// 等待扫描线程结束；线程 panic 时报错，避免写出被截断的结果
fn join_worker(handle: JoinHandle<()>) -> AnyResult<()> {
    handle.join().map_err(|_| anyhow!("scan worker panicked; poll output is incomplete"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_panic_is_reported() {
        let handle = std::thread::spawn(|| panic!("boom"));
        assert!(join_worker(handle).is_err());
        assert!(join_worker(std::thread::spawn(|| {})).is_ok());
    }
}
