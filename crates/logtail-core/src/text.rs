//! 行文本处理：编码归一化与“空行”判定
use std::borrow::Cow;

/// 先按 UTF-8 解码；非法时按 Latin-1 解释（每个字节映射到同值码点）
pub(crate) fn decode_line(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// 空行（或只含非空白控制字符的行）不进入字段提取；纯空格行照常处理
pub(crate) fn is_blank(line: &str) -> bool {
    line.chars().all(|c| c.is_control() && !c.is_whitespace())
}

/// 去掉行尾的 `\r`（CRLF 文件）
pub(crate) fn trim_cr(bytes: &[u8]) -> &[u8] {
    bytes.strip_suffix(b"\r").unwrap_or(bytes)
}

/// 去掉行尾的 `\n` 与 `\r`（正向读取的行）
pub(crate) fn trim_eol(bytes: &[u8]) -> &[u8] {
    trim_cr(bytes.strip_suffix(b"\n").unwrap_or(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_fallback() {
        assert_eq!(decode_line(b"caf\xe9"), "café");
        assert!(matches!(decode_line("café".as_bytes()), Cow::Borrowed(_)));
    }

    #[test]
    fn line_endings() {
        assert_eq!(trim_eol(b"abc\r\n"), b"abc");
        assert_eq!(trim_eol(b"abc\n"), b"abc");
        assert_eq!(trim_eol(b"abc"), b"abc");
    }

    #[test]
    fn blank_lines() {
        assert!(is_blank(""));
        assert!(is_blank("\u{0}\u{7f}"));
        assert!(!is_blank("   "));
        assert!(!is_blank("\t"));
        assert!(!is_blank(" a "));
    }
}
