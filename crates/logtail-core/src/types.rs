//! 公共类型（对外暴露）
use indexmap::IndexMap;
use serde::Serialize;

use crate::options::Cursor;

/// 一条逻辑记录（多行/块重建并完成字段提取之后）
///
/// 序列化时字段按声明顺序输出，再附加引擎字段：
/// `pml` 原始文本、`pmlo` 记录起始字节偏移、`pmld` 时间戳（仅在日期有效时）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    #[serde(flatten)]
    pub fields: IndexMap<String, String>,
    #[serde(rename = "pml")]
    pub raw: String,
    #[serde(rename = "pmlo")]
    pub offset: u64,
    #[serde(rename = "pmld", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Record {
    pub fn get(&self, token: &str) -> Option<&str> {
        self.fields.get(token).map(String::as_str)
    }
}

/// 一次扫描的结果信封
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanResult {
    #[serde(rename = "logs")]
    pub records: Vec<Record>,
    /// 至少一条记录通过了过滤
    pub found: bool,
    /// 触发了时间预算，结果不完整
    #[serde(rename = "abort")]
    pub aborted: bool,
    /// 检测到文件轮转/截断
    #[serde(rename = "notice")]
    pub rotated: bool,
    /// 搜索表达式按正则处理
    #[serde(rename = "regsearch")]
    pub regex_search: bool,
    pub search: String,
    /// 实际生效的全量扫描标志（轮转时会被强制置真）
    pub full: bool,
    /// 下一次调用使用的游标位置
    #[serde(rename = "lpo")]
    pub last_parsed_offset: u64,
    pub count: usize,
    pub bytes: u64,
    #[serde(rename = "skiplines")]
    pub skipped: usize,
    #[serde(rename = "errorlines")]
    pub errors: usize,
    /// 记录序列的内容指纹（仅用于判断刷新是否无变化）
    pub fingerprint: String,
    /// 文件最后一条逻辑行的指纹（下一次调用的 previous fingerprint）
    #[serde(rename = "lastline")]
    pub last_line: String,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    #[serde(rename = "filesize")]
    pub file_size: u64,
    #[serde(rename = "filemodif")]
    pub file_modified: String,
    #[serde(rename = "filemodifu")]
    pub file_modified_epoch: i64,
}

impl ScanResult {
    /// 供调用方保存的游标
    pub fn cursor(&self) -> Cursor {
        Cursor {
            offset: self.last_parsed_offset,
            last_line: self.last_line.clone(),
            file_size: self.file_size,
        }
    }
}

/// 多文件轮询输出项（对应输出 JSON 数组的单个元素）
#[derive(Debug, Clone, Serialize)]
pub struct PollItem<'a> {
    pub id: &'a str,
    pub path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<&'a ScanResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}
