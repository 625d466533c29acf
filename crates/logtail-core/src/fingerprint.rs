//! 指纹：最后一行的 SHA-256 与记录序列的内容 MD5
use sha2::{Digest, Sha256};

use crate::types::Record;

/// 单行指纹，用于跨调用判断“尾部是否还是上次那一行”
pub fn line_fingerprint(line: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(line.as_bytes());
    hex::encode(hasher.finalize())
}

/// 记录序列的内容指纹；调用方用来跳过无变化的刷新，不用于安全场景
pub(crate) fn records_fingerprint(records: &[Record]) -> String {
    let encoded = serde_json::to_vec(records).unwrap_or_default();
    format!("{:x}", md5::compute(encoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_fingerprint_is_stable_hex() {
        let a = line_fingerprint("2024-01-01 10:00:01 ERROR boom");
        assert_eq!(a.len(), 64);
        assert_eq!(a, line_fingerprint("2024-01-01 10:00:01 ERROR boom"));
        assert_ne!(a, line_fingerprint("2024-01-01 10:00:01 ERROR boom "));
    }

    #[test]
    fn empty_record_list_has_fixed_fingerprint() {
        assert_eq!(records_fingerprint(&[]), records_fingerprint(&[]));
        assert_eq!(records_fingerprint(&[]).len(), 32);
    }
}
