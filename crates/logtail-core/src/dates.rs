//! 日期归一化
//!
//! 各种来源格式先拼成一个规范的中间字符串，再宽松地解析成绝对时间，
//! 最后按目标时区与输出格式重新格式化。无法识别的格式不会中断扫描，
//! 而是在字段中留下可见的错误提示，并把时间戳记为 0。
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::OnceLock;

use crate::fields::DateComponent;

/// 默认输出格式：YYYY/MM/DD HH:MM:SS
pub(crate) const DEFAULT_OUTPUT_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// 带时区偏移的候选格式
const OFFSET_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%b %d %H:%M:%S %Y %z",
    "%a %b %d %H:%M:%S %Y %z",
    "%d/%b/%Y:%H:%M:%S %z",
    "%d/%b/%Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M:%S %z",
];

/// 无时区信息的候选格式（按 UTC 解释）
const NAIVE_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%b %d %H:%M:%S %Y",
    "%a %b %d %H:%M:%S %Y",
    "%d/%b/%Y:%H:%M:%S",
    "%d/%b/%Y %H:%M:%S",
    "%d-%b-%Y %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %H:%M",
];

/// 只有日期部分的候选格式（取当天零点）
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// 日期分量归并后的中间形式
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DateSource {
    Epoch(i64),
    Text(String),
}

/// 按分量拼接规范字符串。优先级：U > r > c > M（月份名） > m（数字月份）
pub(crate) fn source_from_components(parts: &[(DateComponent, &str)]) -> DateSource {
    let get = |c: DateComponent| parts.iter().find(|(k, _)| *k == c).map(|(_, v)| *v);
    let part = |c: DateComponent| get(c).unwrap_or("");

    if let Some(u) = get(DateComponent::Unix) {
        let secs = u.trim().split(['.', ',']).next().unwrap_or("");
        return match secs.parse::<i64>() {
            Ok(n) => DateSource::Epoch(n),
            Err(_) => DateSource::Text(u.to_string()),
        };
    }
    if let Some(r) = get(DateComponent::Rfc2822) {
        return DateSource::Text(r.to_string());
    }
    if let Some(c) = get(DateComponent::Iso8601) {
        return DateSource::Text(c.to_string());
    }

    use DateComponent::*;
    let text = if get(MonthName).is_some() {
        format!(
            "{} {} {}:{}:{} {} {}",
            part(MonthName), part(Day), part(Hour), part(Minute), part(Second), part(Year), part(Offset)
        )
    } else if get(Month).is_some() {
        format!(
            "{}/{}/{} {}:{}:{} {}",
            part(Year), part(Month), part(Day), part(Hour), part(Minute), part(Second), part(Offset)
        )
    } else {
        String::new()
    };
    DateSource::Text(text.trim().to_string())
}

fn subsecond_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{2}:\d{2}:\d{2})[.,]\d+").expect("valid subsecond pattern"))
}

/// 去掉秒以下精度，并把连续空白压成一个空格
fn normalize(s: &str) -> String {
    let s = subsecond_re().replace(s.trim(), "$1");
    let mut out = s.split_whitespace().collect::<Vec<_>>().join(" ");
    for suffix in [" UTC", " GMT", " Z"] {
        if out.ends_with(suffix) {
            out.truncate(out.len() - suffix.len());
            out.push_str(" +0000");
            break;
        }
    }
    out
}

/// 宽松解析为绝对时间；无法识别时返回 None
pub(crate) fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let s = normalize(raw);
    if s.is_empty() {
        return None;
    }
    if let Some(secs) = s.strip_prefix('@') {
        return secs.parse::<i64>().ok().and_then(|n| Utc.timestamp_opt(n, 0).single());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(&s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&s, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(&s, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    // syslog 风格没有年份，按当前年份补齐
    let with_year = format!("{} {}", Utc::now().year(), s);
    if let Ok(dt) = NaiveDateTime::parse_from_str(&with_year, "%Y %b %d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().ok().and_then(|n| Utc.timestamp_opt(n, 0).single());
    }
    None
}

/// 把 PHP 风格的日期字母翻译成 strftime；已含 `%` 的格式原样返回
pub(crate) fn to_strftime(fmt: &str) -> String {
    if fmt.contains('%') {
        return fmt.to_string();
    }
    let mut out = String::with_capacity(fmt.len() * 2);
    let mut chars = fmt.chars();
    while let Some(ch) = chars.next() {
        let mapped = match ch {
            'Y' => "%Y",
            'y' => "%y",
            'm' => "%m",
            'n' => "%-m",
            'd' => "%d",
            'j' => "%-d",
            'H' => "%H",
            'G' => "%-H",
            'h' => "%I",
            'g' => "%-I",
            'i' => "%M",
            's' => "%S",
            'A' => "%p",
            'a' => "%P",
            'M' => "%b",
            'F' => "%B",
            'D' => "%a",
            'l' => "%A",
            'N' => "%u",
            'w' => "%w",
            'U' => "%s",
            'e' | 'T' => "%Z",
            'O' => "%z",
            'P' => "%:z",
            'u' => "%6f",
            'v' => "%3f",
            'c' => "%Y-%m-%dT%H:%M:%S%:z",
            'r' => "%a, %d %b %Y %H:%M:%S %z",
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
                continue;
            }
            other => {
                out.push(other);
                continue;
            }
        };
        out.push_str(mapped);
    }
    out
}

/// 按目标时区与输出格式格式化；格式非法时退回默认格式
pub(crate) fn format_instant(dt: DateTime<Utc>, tz: Option<Tz>, format: Option<&str>) -> String {
    let wanted = format.map(to_strftime);
    let mut items: Vec<Item<'_>> = match &wanted {
        Some(f) => StrftimeItems::new(f).collect(),
        None => Vec::new(),
    };
    if items.is_empty() || items.iter().any(|i| matches!(i, Item::Error)) {
        items = StrftimeItems::new(DEFAULT_OUTPUT_FORMAT).collect();
    }
    match tz {
        Some(tz) => dt.with_timezone(&tz).format_with_items(items.iter()).to_string(),
        None => dt.format_with_items(items.iter()).to_string(),
    }
}

/// 日期强制转换：返回 (展示值, 时间戳秒)。解析失败时为 (错误提示, 0)
pub(crate) fn coerce(source: DateSource, tz: Option<Tz>, format: Option<&str>) -> (String, i64) {
    let (instant, shown) = match source {
        DateSource::Epoch(n) => (Utc.timestamp_opt(n, 0).single(), n.to_string()),
        DateSource::Text(s) => (parse_instant(&s), s),
    };
    match instant {
        Some(dt) => (format_instant(dt, tz, format), dt.timestamp()),
        None => (format!("ERROR! Unable to convert this string to date: {shown}"), 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch(s: &str) -> i64 {
        parse_instant(s).map(|d| d.timestamp()).unwrap_or(-1)
    }

    #[test]
    fn parses_heterogeneous_formats() {
        let base = 1704103200; // 2024-01-01 10:00:00 UTC
        assert_eq!(epoch("2024-01-01 10:00:00"), base);
        assert_eq!(epoch("2024/01/01 10:00:00"), base);
        assert_eq!(epoch("2024-01-01T10:00:00Z"), base);
        assert_eq!(epoch("2024-01-01T11:00:00+01:00"), base);
        assert_eq!(epoch("01/Jan/2024:11:00:00 +0100"), base);
        assert_eq!(epoch("Mon Jan 01 10:00:00.123456 2024"), base);
        assert_eq!(epoch("Jan  1 10:00:00 2024"), base);
        assert_eq!(epoch("Mon, 01 Jan 2024 10:00:00 +0000"), base);
        assert_eq!(epoch("2024-01-01 10:00:00,250"), base);
        assert_eq!(epoch("@1704103200"), base);
    }

    #[test]
    fn unknown_formats_fail() {
        assert!(parse_instant("").is_none());
        assert!(parse_instant("yesterday-ish").is_none());
        assert!(parse_instant("2024-13-45 99:00:00").is_none());
    }

    #[test]
    fn components_with_month_name() {
        let src = source_from_components(&[
            (DateComponent::MonthName, "Jan"),
            (DateComponent::Day, "1"),
            (DateComponent::Hour, "10"),
            (DateComponent::Minute, "00"),
            (DateComponent::Second, "00"),
            (DateComponent::Year, "2024"),
        ]);
        assert_eq!(src, DateSource::Text("Jan 1 10:00:00 2024".into()));
    }

    #[test]
    fn components_with_numeric_month_and_offset() {
        let src = source_from_components(&[
            (DateComponent::Year, "2024"),
            (DateComponent::Month, "01"),
            (DateComponent::Day, "01"),
            (DateComponent::Hour, "12"),
            (DateComponent::Minute, "00"),
            (DateComponent::Second, "00"),
            (DateComponent::Offset, "+0200"),
        ]);
        let (shown, ts) = coerce(src, None, None);
        assert_eq!(ts, 1704103200);
        assert_eq!(shown, "2024/01/01 10:00:00");
    }

    #[test]
    fn unix_component_is_epoch() {
        let src = source_from_components(&[(DateComponent::Unix, "1704103200.512")]);
        assert_eq!(src, DateSource::Epoch(1704103200));
    }

    #[test]
    fn php_letters_translate() {
        assert_eq!(to_strftime("Y/m/d H:i:s"), DEFAULT_OUTPUT_FORMAT);
        assert_eq!(to_strftime("H\\hi"), "%Hh%M");
        assert_eq!(to_strftime("%d.%m"), "%d.%m");
    }

    #[test]
    fn formats_in_requested_timezone() {
        let dt = Utc.timestamp_opt(1704103200, 0).single().unwrap();
        let tz: Tz = "Europe/Paris".parse().unwrap();
        assert_eq!(format_instant(dt, Some(tz), Some("H:i:s")), "11:00:00");
        assert_eq!(format_instant(dt, None, None), "2024/01/01 10:00:00");
    }

    #[test]
    fn failed_coercion_is_visible() {
        let (shown, ts) = coerce(DateSource::Text("garbage".into()), None, None);
        assert_eq!(ts, 0);
        assert!(shown.starts_with("ERROR!"));
        assert!(shown.contains("garbage"));
    }
}
