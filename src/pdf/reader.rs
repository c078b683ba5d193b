// Phase 2: 読み取り専用のオブジェクトグラフアクセサ（ページ走査、参照解決、メタデータ）

use std::collections::HashSet;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::error::A11yError;
use crate::pdf::text::object_text;
use crate::pdf::{MetadataRecord, kind_of};

/// 参照チェーンをたどる最大回数（循環参照対策）。
const MAX_REFERENCE_HOPS: usize = 32;

pub struct PdfReader {
    pub(crate) doc: Document,
}

/// ドキュメント順に並んだ1ページ。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRef {
    /// 1始まりのページ番号
    pub number: u32,
    pub id: ObjectId,
}

/// ページの`/XObject`リソースの1エントリ。
#[derive(Debug)]
pub struct XObjectEntry<'a> {
    pub name: String,
    /// 解決済みのオブジェクト。参照先が存在しない場合は`None`。
    pub object: Option<&'a Object>,
}

impl PdfReader {
    /// バイト列からPdfReaderを作成する（openForRead）。
    ///
    /// ヘッダ・相互参照表・トレーラが解析できない場合は`MalformedDocument`。
    pub fn from_bytes(bytes: &[u8]) -> crate::error::Result<Self> {
        let doc = Document::load_mem(bytes)?;
        Self::from_document(doc)
    }

    /// PDFファイルを開いてPdfReaderを作成する。
    pub fn open(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub(crate) fn from_document(doc: Document) -> crate::error::Result<Self> {
        if doc.catalog().is_err() {
            return Err(A11yError::malformed("document catalog (/Root) not found"));
        }
        Ok(Self { doc })
    }

    /// 内部のlopdf Documentへの参照を返す。
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// ページ数を返す。
    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// ドキュメント順にページを列挙する。
    ///
    /// 呼び出すたびに先頭から列挙し直す。
    pub fn pages(&self) -> impl Iterator<Item = PageRef> + '_ {
        self.doc
            .page_iter()
            .zip(1u32..)
            .map(|(id, number)| PageRef { number, id })
    }

    /// 間接参照をオブジェクトテーブル経由で解決する。
    ///
    /// 参照先が存在しない（dangling）場合はエラーではなく`None`を返す。
    pub fn resolve(&self, id: ObjectId) -> Option<&Object> {
        match self.doc.get_object(id) {
            Ok(obj) => Some(obj),
            Err(_) => {
                debug!(object = ?id, "dangling reference");
                None
            }
        }
    }

    /// オブジェクトが参照なら参照先まで（連鎖も含めて）たどる。
    pub fn deref<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        let mut current = obj;
        for _ in 0..MAX_REFERENCE_HOPS {
            match current {
                Object::Reference(id) => current = self.resolve(*id)?,
                _ => return Some(current),
            }
        }
        debug!("reference chain exceeded {} hops", MAX_REFERENCE_HOPS);
        None
    }

    /// 辞書のキーを引いて参照を解決した値を返す。
    pub fn dict_get<'a>(&'a self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
        dict.get(key).ok().and_then(|obj| self.deref(obj))
    }

    /// 辞書のキーを引いて辞書として返す（インライン・参照の両方に対応）。
    pub fn dict_get_dict<'a>(&'a self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
        match self.dict_get(dict, key)? {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// 指定ページの`/XObject`リソースを辞書の格納順に列挙する。
    ///
    /// ページ自身のResourcesと、ページツリーから継承したResourcesの両方を見る。
    /// 同名のエントリは最初に現れたものを採用する。Resourcesがないページは空。
    pub fn page_xobjects(&self, page: &PageRef) -> Vec<XObjectEntry<'_>> {
        let (resource_dict, resource_ids) = match self.doc.get_page_resources(page.id) {
            Ok(found) => found,
            Err(e) => {
                debug!(page = page.number, error = %e, "page resources not readable");
                return Vec::new();
            }
        };

        let mut dicts: Vec<&Dictionary> = Vec::new();
        if let Some(dict) = resource_dict {
            dicts.push(dict);
        }
        for res_id in resource_ids {
            match self.resolve(res_id) {
                Some(Object::Dictionary(dict)) => dicts.push(dict),
                Some(other) => {
                    debug!(page = page.number, kind = ?kind_of(other), "resources is not a dictionary")
                }
                None => {}
            }
        }

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for dict in dicts {
            let Some(xobjects) = self.dict_get_dict(dict, b"XObject") else {
                continue;
            };
            for (name_bytes, value) in xobjects.iter() {
                let name = String::from_utf8_lossy(name_bytes).into_owned();
                if !seen.insert(name.clone()) {
                    continue;
                }
                entries.push(XObjectEntry {
                    name,
                    object: self.deref(value),
                });
            }
        }
        entries
    }

    /// ドキュメント情報辞書（トレーラの`/Info`）を返す。
    pub fn info_dict(&self) -> Option<&Dictionary> {
        match self.dict_get(&self.doc.trailer, b"Info")? {
            Object::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// 情報辞書とカタログから文書メタデータを読み取る。
    ///
    /// 言語はカタログの`/Lang`を優先し、なければ情報辞書の`/Lang`を使う。
    pub fn read_metadata(&self) -> MetadataRecord {
        let info = self.info_dict();
        let info_text = |key: &[u8]| {
            info.and_then(|d| self.dict_get(d, key))
                .and_then(object_text)
        };

        let catalog = self.doc.catalog().ok();
        let language = catalog
            .and_then(|c| self.dict_get(c, b"Lang"))
            .and_then(object_text)
            .or_else(|| info_text(b"Lang"));

        let is_tagged = catalog
            .and_then(|c| self.dict_get_dict(c, b"MarkInfo"))
            .and_then(|mark_info| self.dict_get(mark_info, b"Marked"))
            .and_then(|marked| marked.as_bool().ok())
            .unwrap_or(false);

        MetadataRecord {
            title: info_text(b"Title"),
            author: info_text(b"Author"),
            subject: info_text(b"Subject"),
            language,
            is_tagged: Some(is_tagged),
        }
    }
}
