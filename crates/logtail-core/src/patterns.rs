//! 正则编译（支持 `/.../flags` 定界写法）
//!
//! 日志格式配置里的正则沿用 PCRE 风格的定界写法：首字符为定界符，
//! 末尾可带修饰符。这里统一翻译成 `regex` crate 的构建参数。
use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::error::{Error, Result};

/// 允许出现在结束定界符之后的修饰符（未识别的直接忽略）
const KNOWN_FLAGS: &str = "imsxuADSUXJn";

/// 拆分定界写法：返回 (模式主体, 修饰符)；不是定界写法时返回 None
pub(crate) fn split_delimited(expr: &str) -> Option<(String, &str)> {
    let open = expr.chars().next()?;
    if open.is_alphanumeric() || open.is_whitespace() || open == '\\' {
        return None;
    }
    let close = match open {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        '<' => '>',
        c => c,
    };
    let rest = &expr[open.len_utf8()..];
    let end = rest.rfind(close)?;
    let body = &rest[..end];
    let flags = &rest[end + close.len_utf8()..];
    if !flags.chars().all(|c| KNOWN_FLAGS.contains(c)) {
        return None;
    }

    // `\/` 这类对定界符的转义在 regex crate 中不一定合法，还原为字面量
    let close_str = close.to_string();
    let body = if regex::escape(&close_str) == close_str {
        body.replace(&format!("\\{close}"), &close_str)
    } else {
        body.to_string()
    };
    Some((body, flags))
}

fn build(body: &str, flags: &str) -> std::result::Result<Regex, regex::Error> {
    RegexBuilder::new(body)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'))
        .swap_greed(flags.contains('U'))
        .build()
}

/// 编译记录正则：定界写法或裸正则均可，失败返回 `Error::Pattern`
pub fn compile_pattern(expr: &str) -> Result<Regex> {
    let res = match split_delimited(expr) {
        Some((body, flags)) => build(&body, flags),
        None => Regex::new(expr),
    };
    res.map_err(|e| Error::Pattern { pattern: expr.to_string(), message: e.to_string() })
}

/// 宽松编译（排除规则）：失败时视为“永不命中”，仅记录调试日志
pub(crate) fn compile_lenient(expr: &str) -> Option<Regex> {
    match compile_pattern(expr) {
        Ok(rx) => Some(rx),
        Err(err) => {
            debug!(%err, "dropping invalid exclusion pattern");
            None
        }
    }
}

/// 搜索表达式：只有合法的定界写法才按正则处理，其余一律按子串处理
pub(crate) fn search_regex(expr: &str) -> Option<Regex> {
    let (body, flags) = split_delimited(expr)?;
    build(&body, flags).ok()
}

/// 块起始标记：`/.../` 写法按正则编译；普通字符串转义后锚定在行首
/// （普通字符串开头的 `^` 视为锚点本身）
pub fn block_marker(marker: &str) -> Result<Regex> {
    if marker.starts_with('/') && split_delimited(marker).is_some() {
        return compile_pattern(marker);
    }
    let literal = marker.strip_prefix('^').unwrap_or(marker);
    let anchored = format!("^{}", regex::escape(literal));
    Regex::new(&anchored).map_err(|e| Error::Pattern { pattern: marker.to_string(), message: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimited_with_flags() {
        let rx = compile_pattern("/^error: (.*)$/i").unwrap();
        assert!(rx.is_match("ERROR: disk full"));
    }

    #[test]
    fn bare_pattern_is_accepted() {
        let rx = compile_pattern(r"^(\d+) (\w+)$").unwrap();
        assert!(rx.is_match("12 abc"));
    }

    #[test]
    fn ungreedy_flag_swaps_greed() {
        let rx = compile_pattern(r"|^\[(.*)\] (.*)$|U").unwrap();
        let caps = rx.captures("[a] [b] c").unwrap();
        assert_eq!(&caps[1], "a");
    }

    #[test]
    fn escaped_delimiter_is_unescaped() {
        let rx = compile_pattern(r"/^\/favicon\.ico/").unwrap();
        assert!(rx.is_match("/favicon.ico"));
    }

    #[test]
    fn plain_words_are_not_search_regexes() {
        assert!(search_regex("boom").is_none());
        assert!(search_regex("/var/log").is_none());
        assert!(search_regex("/bo+m/").is_some());
        assert!(search_regex("/(unclosed/").is_none());
    }

    #[test]
    fn invalid_exclusion_degrades_to_none() {
        assert!(compile_lenient("/(?<=x)y/").is_none());
    }

    #[test]
    fn block_marker_plain_string_is_escaped_and_anchored() {
        let rx = block_marker("BEGIN (tx)").unwrap();
        assert!(rx.is_match("BEGIN (tx) 42"));
        assert!(!rx.is_match("  BEGIN (tx)"));
        let rx = block_marker("/^BEGIN/").unwrap();
        assert!(rx.is_match("BEGIN"));
        let rx = block_marker("^BEGIN").unwrap();
        assert!(rx.is_match("BEGIN tx"));
        let rx = block_marker("[2024").unwrap();
        assert!(rx.is_match("[2024-01-01] start"));
    }
}
