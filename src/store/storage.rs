// アップロード原本とリメディエーション結果の永続化
//
// <root>/uploads/<id>.pdf             原本（一度書いたら変更しない）
// <root>/output/<id>_remediated.pdf   出力（再実行時は丸ごと置き換える）

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::A11yError;
use crate::store::id::validate_document_id;

/// ドキュメントIDをキーにしたバイト列ストレージ。
pub trait DocumentStorage: Send + Sync {
    fn read_upload(&self, id: &str) -> crate::error::Result<Vec<u8>>;
    fn write_upload(&self, id: &str, bytes: &[u8]) -> crate::error::Result<()>;
    fn read_output(&self, id: &str) -> crate::error::Result<Vec<u8>>;
    fn write_output(&self, id: &str, bytes: &[u8]) -> crate::error::Result<()>;
    fn has_output(&self, id: &str) -> bool;
}

/// ファイルシステムベースのストレージ。
pub struct FsDocumentStorage {
    root: PathBuf,
}

impl FsDocumentStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn upload_path(&self, id: &str) -> crate::error::Result<PathBuf> {
        validate_document_id(id)?;
        Ok(self.root.join("uploads").join(format!("{id}.pdf")))
    }

    pub fn output_path(&self, id: &str) -> crate::error::Result<PathBuf> {
        validate_document_id(id)?;
        Ok(self
            .root
            .join("output")
            .join(format!("{id}_remediated.pdf")))
    }
}

/// 一時ファイル（`<name>.tmp`）に書き込んでからrenameで最終パスに移動する。
///
/// 失敗しても最終パスの既存ファイルはそのまま残る。
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> crate::error::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| A11yError::storage(format!("no parent directory: {}", path.display())))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| A11yError::storage(format!("no file name: {}", path.display())))?;
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir).map_err(|e| A11yError::storage(e.to_string()))?;
    }

    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    if let Err(e) = fs::write(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(A11yError::storage(e.to_string()));
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(A11yError::storage(e.to_string()));
    }
    debug!(path = %path.display(), size = bytes.len(), "stored");
    Ok(())
}

fn read_existing(path: &Path, id: &str) -> crate::error::Result<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(A11yError::not_found(format!("document {id}")))
        }
        Err(e) => Err(A11yError::storage(e.to_string())),
    }
}

impl DocumentStorage for FsDocumentStorage {
    fn read_upload(&self, id: &str) -> crate::error::Result<Vec<u8>> {
        read_existing(&self.upload_path(id)?, id)
    }

    /// 原本は一度だけ書き込める。
    fn write_upload(&self, id: &str, bytes: &[u8]) -> crate::error::Result<()> {
        let path = self.upload_path(id)?;
        if path.exists() {
            return Err(A11yError::storage(format!("upload {id} already exists")));
        }
        write_atomic(&path, bytes)
    }

    fn read_output(&self, id: &str) -> crate::error::Result<Vec<u8>> {
        read_existing(&self.output_path(id)?, id)
    }

    fn write_output(&self, id: &str, bytes: &[u8]) -> crate::error::Result<()> {
        write_atomic(&self.output_path(id)?, bytes)
    }

    fn has_output(&self, id: &str) -> bool {
        self.output_path(id).is_ok_and(|p| p.is_file())
    }
}
