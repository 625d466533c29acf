use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use logtail_core::{expand_paths, lines_from_bottom, load_profiles, poll_and_write, Cursor, PollTarget};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(name = "logtail", version, about = "增量日志尾随工具")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 按配置轮询日志文件，输出新增记录（JSON 数组）
    Scan {
        /// 日志格式配置文件（TOML）
        #[arg(long)]
        profile: PathBuf,

        /// 只轮询指定 id 的日志（可重复）
        #[arg(long)]
        id: Vec<String>,

        /// 覆盖配置中的路径（文件或目录）
        #[arg(long)]
        path: Option<PathBuf>,

        /// 每个文件期望返回的记录数
        #[arg(long, default_value_t = logtail_core::DEFAULT_COUNT)]
        count: usize,

        /// 搜索表达式：子串，或 /regex/flags
        #[arg(long, default_value = "")]
        search: String,

        /// 忽略游标，从文件开头全量读取
        #[arg(long)]
        full: bool,

        /// 从游标位置继续加载更旧的记录
        #[arg(long)]
        older: bool,

        /// 游标状态文件（JSON：路径 -> 游标），扫描后更新
        #[arg(long)]
        state: Option<PathBuf>,

        /// 输出文件；缺省写到标准输出
        #[arg(long)]
        output: Option<PathBuf>,

        /// 线程数（"auto"=CPU 核心数）
        #[arg(long, default_value = "auto")]
        threads: String,

        /// 每个文件的最长扫描时间（秒）
        #[arg(long, default_value_t = 3.0)]
        max_time: f64,
    },
    /// 打印文件末尾的若干非空行
    Tail {
        #[arg(long)]
        path: PathBuf,

        #[arg(long, default_value_t = 10)]
        lines: usize,
    },
}

fn main() -> Result<()> {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、debug）
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { profile, id, path, count, search, full, older, state, output, threads, max_time } => {
            info!(?profile, ?state, "starting poll");

            let mut profiles = load_profiles(&profile).context("load profiles")?;
            if !id.is_empty() {
                profiles.retain(|p| id.contains(&p.id));
            }
            if profiles.is_empty() {
                bail!("no log profile selected");
            }
            if !max_time.is_finite() || max_time < 0.0 {
                bail!("--max-time must be a non-negative number of seconds");
            }

            let mut cursors = match &state {
                Some(p) => load_state(p)?,
                None => BTreeMap::new(),
            };

            let mut targets = Vec::new();
            for prof in &profiles {
                let paths = match &path {
                    Some(p) => expand_paths(std::slice::from_ref(p)),
                    None => expand_paths(&prof.paths),
                };
                for file in paths {
                    let key = file.display().to_string();
                    let mut req = prof.request(&file);
                    req.count = count;
                    req.search = search.clone();
                    req.max_duration = Duration::from_secs_f64(max_time);
                    // 没有游标的文件做一次全量首载
                    req = match cursors.get(&key) {
                        Some(c) if !full && older => req.load_more(c),
                        Some(c) if !full => {
                            let size = fs::metadata(&file).map(|m| m.len()).unwrap_or(0);
                            req.follow(c, size)
                        }
                        _ => {
                            req.full = true;
                            req
                        }
                    };
                    // 旧游标随目标一起带上，扫描后只推进本次模式负责的部分
                    let target = PollTarget::new(prof.id.clone(), req);
                    targets.push(match cursors.get(&key) {
                        Some(c) => target.with_cursor(c.clone()),
                        None => target,
                    });
                }
            }
            if targets.is_empty() {
                warn!("profiles matched no files");
            }

            // 以缓冲方式打开输出，按 JSON 数组流式写入
            let sink: Box<dyn Write> = match &output {
                Some(p) => Box::new(File::create(p).context("create output file")?),
                None => Box::new(io::stdout().lock()),
            };
            let mut out = BufWriter::new(sink);
            let report = poll_and_write(&targets, &mut out, parse_threads(&threads)).context("poll and write failed")?;
            writeln!(out)?;
            out.flush().ok();

            if let Some(p) = &state {
                for (t, cursor) in targets.iter().zip(report.cursors) {
                    if let Some(cursor) = cursor {
                        cursors.insert(t.request.path.display().to_string(), cursor);
                    }
                }
                save_state(p, &cursors)?;
            }

            info!(
                files_polled = report.stats.files_polled,
                files_failed = report.stats.files_failed,
                records_written = report.stats.records_written,
                "poll finished"
            );
        }
        Commands::Tail { path, lines } => {
            let mut found = lines_from_bottom(&path, lines)?;
            found.reverse();
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            for line in found {
                writeln!(out, "{line}")?;
            }
            out.flush().ok();
        }
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    // 日志写到 stderr，stdout 留给 JSON 输出
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(env_filter).with_writer(io::stderr).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 解析线程参数
fn parse_threads(s: &str) -> Option<usize> {
    if s.eq_ignore_ascii_case("auto") { return None; }
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Some(n),
        _ => None,
    }
}

/// 读取游标状态；文件不存在视为空
fn load_state(path: &Path) -> Result<BTreeMap<String, Cursor>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let txt = fs::read_to_string(path).with_context(|| format!("read state {}", path.display()))?;
    if txt.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(&txt).with_context(|| format!("parse state {}", path.display()))
}

fn save_state(path: &Path, cursors: &BTreeMap<String, Cursor>) -> Result<()> {
    let txt = serde_json::to_string_pretty(cursors)?;
    fs::write(path, txt).with_context(|| format!("write state {}", path.display()))
}
