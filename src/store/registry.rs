// ドキュメントレコードのCRUDストア

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::A11yError;
use crate::pdf::MetadataRecord;
use crate::pipeline::ImageRecord;

/// 処理状態。`Error`はどの状態からも遷移できる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingStatus {
    Uploaded,
    Extracting,
    GeneratingAltText,
    Remediating,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    pub filename: String,
    pub original_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub status: ProcessingStatus,
    pub page_count: u32,
    pub file_size: u64,
    pub images: Vec<ImageRecord>,
    pub metadata: MetadataRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// ドキュメントレコードのストア。
pub trait DocumentRegistry: Send + Sync {
    /// 同じIDのレコードがあればエラー。
    fn insert(&self, record: DocumentRecord) -> crate::error::Result<()>;
    fn get(&self, id: &str) -> Option<DocumentRecord>;
    /// レコードを書き換えて、更新後のレコードを返す。
    fn update(
        &self,
        id: &str,
        f: &mut dyn FnMut(&mut DocumentRecord),
    ) -> crate::error::Result<DocumentRecord>;
    fn delete(&self, id: &str) -> Option<DocumentRecord>;
    /// アップロード日時順。
    fn list(&self) -> Vec<DocumentRecord>;
}

/// 状態を更新するための短縮形。
pub fn set_status(
    registry: &dyn DocumentRegistry,
    id: &str,
    status: ProcessingStatus,
) -> crate::error::Result<DocumentRecord> {
    registry.update(id, &mut |record| {
        record.status = status;
        if status != ProcessingStatus::Error {
            record.error = None;
        }
    })
}

#[derive(Default)]
pub struct InMemoryRegistry {
    records: RwLock<HashMap<String, DocumentRecord>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> A11yError {
    A11yError::storage("registry lock poisoned")
}

impl DocumentRegistry for InMemoryRegistry {
    fn insert(&self, record: DocumentRecord) -> crate::error::Result<()> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        if records.contains_key(&record.id) {
            return Err(A11yError::storage(format!(
                "document {} already registered",
                record.id
            )));
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    fn get(&self, id: &str) -> Option<DocumentRecord> {
        self.records.read().ok()?.get(id).cloned()
    }

    fn update(
        &self,
        id: &str,
        f: &mut dyn FnMut(&mut DocumentRecord),
    ) -> crate::error::Result<DocumentRecord> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let record = records
            .get_mut(id)
            .ok_or_else(|| A11yError::not_found(format!("document {id}")))?;
        f(record);
        Ok(record.clone())
    }

    fn delete(&self, id: &str) -> Option<DocumentRecord> {
        self.records.write().ok()?.remove(id)
    }

    fn list(&self) -> Vec<DocumentRecord> {
        let Ok(records) = self.records.read() else {
            return Vec::new();
        };
        let mut all: Vec<DocumentRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at).then_with(|| a.id.cmp(&b.id)));
        all
    }
}
