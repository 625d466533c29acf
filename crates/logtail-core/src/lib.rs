//! logtail-core：增量日志尾随引擎
//!
//! - 从文件末尾反向读取，按正则把行（或多行块）解析为字段记录
//! - 通过末行指纹与字节预算实现增量轮询，并检测日志轮转
//! - 支持排除规则、搜索、多行续接、时区与日期格式转换
//! - 多文件时用 Rayon 并行扫描，结果按输入顺序写出 JSON

pub mod budget;
mod dates;
mod engine_blocks;
mod engine_lines;
pub mod error;
pub mod extract;
pub mod fields;
pub mod filter;
pub mod fingerprint;
pub mod options;
pub mod patterns;
mod pipeline;
pub mod reverse;
pub mod rules;
pub mod scan;
mod text;
pub mod types;

pub use budget::TimeBudget;
pub use error::{Error, Result};
pub use extract::FieldExtractor;
pub use fields::{DateComponent, FieldRef, FieldType, GroupRef, LineFormat, Part};
pub use filter::{RecordFilter, SearchMode};
pub use fingerprint::line_fingerprint;
pub use options::{Cursor, OffsetOrigin, ScanRequest, DEFAULT_COUNT, DEFAULT_MAX_DURATION};
pub use patterns::{block_marker, compile_pattern};
pub use reverse::lines_from_bottom;
pub use rules::{load_profiles, parse_profiles, LogProfile};
pub use scan::{expand_paths, poll_and_write, scan, PollReport, PollStats, PollTarget};
pub use types::{PollItem, Record, ScanResult};
