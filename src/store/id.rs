// ドキュメント・画像IDの生成と検証

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use crate::error::A11yError;

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// 一意なトークン（32文字の小文字16進数）を生成する。
///
/// ハッシュ入力: `nanos || pid || counter || thread id`
/// 同一プロセス内ではカウンタにより重複しない。
pub fn new_token() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut hasher = Sha256::new();
    hasher.update(nanos.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(count.to_le_bytes());
    hasher.update(format!("{:?}", std::thread::current().id()).as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

/// ドキュメントIDを検証する。
///
/// 有効なIDは1〜64文字の`[A-Za-z0-9_-]`。
/// ストレージのパスに埋め込むため、パストラバーサルを防止する。
pub fn validate_document_id(id: &str) -> crate::error::Result<()> {
    let valid = !id.is_empty()
        && id.len() <= 64
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(A11yError::storage(format!(
            "invalid document id: expected 1-64 characters of [A-Za-z0-9_-], got '{}'",
            id
        )))
    }
}
