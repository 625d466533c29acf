//! 日志格式配置加载（TOML）
use anyhow::{Context, Result};
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::Error;
use crate::fields::{DateComponent, FieldRef, FieldType, GroupRef, LineFormat, Part};
use crate::options::ScanRequest;
use crate::patterns::{block_marker, compile_pattern};

/// 捕获组写法：整数为序号，字符串为组名
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum GroupEntry {
    Index(usize),
    Name(String),
}

/// 组合片段写法：整数为捕获组，字符串为字面量
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PartEntry {
    Group(usize),
    Literal(String),
}

/// 字段引用写法（整数 / 字符串 / 列表 / 日期分量表）
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FieldEntry {
    Index(usize),
    Name(String),
    Parts(Vec<PartEntry>),
    Date(IndexMap<String, GroupEntry>),
}

/// 单个日志的配置（支持 pattern 或 regex 字段）
#[derive(Debug, Clone, Deserialize)]
struct ProfileEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub regex: Option<String>,
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    #[serde(default, alias = "match")]
    pub fields: IndexMap<String, FieldEntry>,
    #[serde(default)]
    pub types: IndexMap<String, String>,
    #[serde(default)]
    pub exclude: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub multiline: Option<String>,
    #[serde(default)]
    pub block_start: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// 顶层配置文件结构
#[derive(Debug, Clone, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    pub logs: Vec<ProfileEntry>,
}

/// 归一化并编译后的日志配置
#[derive(Debug, Clone)]
pub struct LogProfile {
    pub id: String,
    pub name: Option<String>,
    pub paths: Vec<PathBuf>,
    pub format: LineFormat,
    pub exclude: IndexMap<String, Vec<String>>,
    pub multiline: Option<String>,
    pub block_start: Option<String>,
    pub timezone: Option<Tz>,
}

impl LogProfile {
    /// 以本配置为模板，为某个文件生成扫描请求
    pub fn request(&self, path: impl Into<PathBuf>) -> ScanRequest {
        let mut req = ScanRequest::new(path, self.format.clone());
        req.timezone = self.timezone;
        req.exclude = self.exclude.clone();
        req.multiline = self.multiline.clone();
        req.block_start = self.block_start.clone();
        req
    }
}

/// 从 TOML 配置文件加载并归一化为 LogProfile 列表
pub fn load_profiles(path: &Path) -> Result<Vec<LogProfile>> {
    let txt = std::fs::read_to_string(path).with_context(|| format!("read profile {}", path.display()))?;
    parse_profiles(&txt)
}

/// 解析配置文本
pub fn parse_profiles(txt: &str) -> Result<Vec<LogProfile>> {
    let parsed: ProfileFile = toml::from_str(txt)?;
    let mut out = Vec::new();

    for e in parsed.logs {
        // 兼容两种字段名：pattern 或 regex
        let pat = match (&e.pattern, &e.regex) {
            (Some(p), _) => p.clone(),
            (None, Some(r)) => r.clone(),
            _ => {
                warn!(id = %e.id, "log entry has no pattern; skipped");
                continue;
            }
        };
        let id = e.id.clone();
        out.push(build_profile(e, &pat).with_context(|| format!("log entry {id:?}"))?);
    }

    Ok(out)
}

fn build_profile(e: ProfileEntry, pat: &str) -> crate::error::Result<LogProfile> {
    let mut format = LineFormat::new(compile_pattern(pat)?);
    for (token, entry) in e.fields {
        format.fields.insert(token, field_ref(entry)?);
    }
    for (token, desc) in &e.types {
        format.types.insert(token.clone(), FieldType::parse(desc));
    }
    format.validate()?;

    let block_start = e.block_start.filter(|b| !b.is_empty());
    if let Some(marker) = &block_start {
        block_marker(marker)?;
    }
    let timezone = match e.timezone.as_deref().filter(|t| !t.is_empty()) {
        Some(name) => Some(name.parse::<Tz>().map_err(|_| Error::Timezone(name.to_string()))?),
        None => None,
    };

    Ok(LogProfile {
        id: e.id,
        name: e.name,
        paths: e.paths,
        format,
        exclude: e.exclude,
        multiline: e.multiline.filter(|m| !m.is_empty()),
        block_start,
        timezone,
    })
}

fn group_ref(g: GroupEntry) -> GroupRef {
    match g {
        GroupEntry::Index(i) => GroupRef::Index(i),
        GroupEntry::Name(n) => GroupRef::Name(n),
    }
}

fn field_ref(entry: FieldEntry) -> crate::error::Result<FieldRef> {
    Ok(match entry {
        FieldEntry::Index(i) => FieldRef::Group(GroupRef::Index(i)),
        FieldEntry::Name(n) => FieldRef::Group(GroupRef::Name(n)),
        FieldEntry::Parts(parts) => FieldRef::Parts(
            parts
                .into_iter()
                .map(|p| match p {
                    PartEntry::Group(i) => Part::Group(i),
                    PartEntry::Literal(s) => Part::Literal(s),
                })
                .collect(),
        ),
        FieldEntry::Date(map) => {
            let mut parts = Vec::with_capacity(map.len());
            for (key, g) in map {
                let comp = DateComponent::from_key(&key)
                    .ok_or_else(|| Error::Profile(format!("unknown date component {key:?}")))?;
                parts.push((comp, group_ref(g)));
            }
            FieldRef::Date(parts)
        }
    })
}
