// Phase 5: 書き込み用オブジェクトグラフアクセサ（メタデータ、MarkInfo、構造ツリー、保存）

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use tracing::debug;

use crate::error::A11yError;
use crate::pdf::MetadataRecord;
use crate::pdf::reader::PdfReader;
use crate::pdf::struct_tree::{StructElement, StructKind};
use crate::pdf::text::{encode_text_string, pdf_date};

/// 既存PDFを読み込み、アクセシビリティ情報を追記して書き出す。
pub struct PdfEditor {
    reader: PdfReader,
    /// 採番済みだがまだオブジェクトが登録されていないID
    reserved: BTreeSet<ObjectId>,
}

impl PdfEditor {
    /// バイト列から編集用にPDFを開く（openForWrite）。
    pub fn from_bytes(bytes: &[u8]) -> crate::error::Result<Self> {
        Ok(Self {
            reader: PdfReader::from_bytes(bytes)?,
            reserved: BTreeSet::new(),
        })
    }

    /// 内部のlopdf Documentへの参照を返す。
    pub fn document(&self) -> &Document {
        self.reader.document()
    }

    /// 編集中のドキュメントから現在のメタデータを読み取る。
    pub fn read_metadata(&self) -> MetadataRecord {
        self.reader.read_metadata()
    }

    /// オブジェクトIDだけを先に採番する。
    ///
    /// [`assign_object`](Self::assign_object)で登録するまで保存はエラーになる。
    pub fn reserve_object_id(&mut self) -> ObjectId {
        let id = self.reader.doc.new_object_id();
        self.reserved.insert(id);
        id
    }

    /// 採番済みIDにオブジェクトを登録する。
    pub fn assign_object(&mut self, id: ObjectId, object: impl Into<Object>) -> crate::error::Result<()> {
        if !self.reserved.remove(&id) {
            return Err(A11yError::structure(format!(
                "object {:?} was not reserved",
                id
            )));
        }
        self.reader.doc.objects.insert(id, object.into());
        Ok(())
    }

    fn catalog_mut(&mut self) -> crate::error::Result<&mut Dictionary> {
        self.reader.doc
            .catalog_mut()
            .map_err(|e| A11yError::structure(format!("catalog not writable: {}", e)))
    }

    /// ドキュメント情報辞書を返す。なければ作成してトレーラに登録する。
    fn info_dict_mut(&mut self) -> crate::error::Result<&mut Dictionary> {
        let inline = matches!(self.reader.doc.trailer.get(b"Info"), Ok(Object::Dictionary(_)));
        if inline {
            return self
                .reader
                .doc
                .trailer
                .get_mut(b"Info")
                .and_then(Object::as_dict_mut)
                .map_err(|e| A11yError::structure(e.to_string()));
        }

        let existing = match self.reader.doc.trailer.get(b"Info") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };
        let info_id = match existing {
            Some(id) if matches!(self.reader.doc.objects.get(&id), Some(Object::Dictionary(_))) => id,
            _ => {
                debug!("creating document information dictionary");
                let id = self.reader.doc.add_object(Dictionary::new());
                self.reader.doc.trailer.set("Info", id);
                id
            }
        };
        self.reader.doc
            .get_dictionary_mut(info_id)
            .map_err(|e| A11yError::structure(e.to_string()))
    }

    /// 入力に含まれるメタデータ項目だけを情報辞書に書き込む。
    ///
    /// `None`の項目は既存値を残す。戻り値は書き込んだ項目名。
    pub fn write_metadata(&mut self, meta: &MetadataRecord) -> crate::error::Result<Vec<&'static str>> {
        let fields: [(&'static str, &[u8], &Option<String>); 4] = [
            ("title", b"Title", &meta.title),
            ("author", b"Author", &meta.author),
            ("subject", b"Subject", &meta.subject),
            ("language", b"Lang", &meta.language),
        ];

        let info = self.info_dict_mut()?;
        let mut written = Vec::new();
        for (field, key, value) in fields {
            if let Some(value) = value {
                info.set(key.to_vec(), encode_text_string(value));
                written.push(field);
            }
        }
        Ok(written)
    }

    /// Producer/Creator/Keywordsと作成・更新日時を設定する。
    pub fn stamp_producer(
        &mut self,
        producer: &str,
        creator: &str,
        keywords: &[&str],
        now: DateTime<Utc>,
    ) -> crate::error::Result<()> {
        let date = pdf_date(now);
        let info = self.info_dict_mut()?;
        info.set("Producer", encode_text_string(producer));
        info.set("Creator", encode_text_string(creator));
        info.set("Keywords", encode_text_string(&keywords.join(" ")));
        info.set("CreationDate", Object::string_literal(date.clone()));
        info.set("ModDate", Object::string_literal(date));
        Ok(())
    }

    /// カタログに`/MarkInfo << /Marked true /Suspects false >>`を設定する。
    ///
    /// MarkInfoはPDF 1.4以降のため、それより古いヘッダは1.7に上げる。
    pub fn mark_tagged(&mut self) -> crate::error::Result<()> {
        self.catalog_mut()?.set(
            "MarkInfo",
            dictionary! {
                "Marked" => true,
                "Suspects" => false,
            },
        );
        let version: f32 = self.reader.doc.version.parse().unwrap_or(0.0);
        if version < 1.4 {
            debug!(from = %self.reader.doc.version, "raising PDF version to 1.7");
            self.reader.doc.version = "1.7".to_string();
        }
        Ok(())
    }

    /// 構造ツリーを登録し、カタログの`/StructTreeRoot`から参照する。
    ///
    /// 各要素は間接オブジェクトとして登録し、`/P`で親を指す。
    /// `/ParentTree`は空の数値ツリー。失敗した場合は途中で追加した
    /// オブジェクトを取り除き、ドキュメントを呼び出し前の状態に戻す。
    /// 戻り値は登録したFigureの数。
    pub fn attach_structure_tree(&mut self, root: &StructElement) -> crate::error::Result<usize> {
        let max_id_before = self.reader.doc.max_id;
        let result = self.build_structure_tree(root);
        if result.is_err() {
            self.reader.doc.objects.retain(|id, _| id.0 <= max_id_before);
            self.reserved.retain(|id| id.0 <= max_id_before);
            self.reader.doc.max_id = max_id_before;
        }
        result
    }

    fn build_structure_tree(&mut self, root: &StructElement) -> crate::error::Result<usize> {
        if root.kind != StructKind::Document {
            return Err(A11yError::structure(format!(
                "structure root must be Document, got {}",
                root.kind.name()
            )));
        }
        // カタログが書き込めることを先に確認する
        self.catalog_mut()?;

        let tree_root_id = self.reserve_object_id();
        let document_id = self.reserve_object_id();

        let mut kids = Vec::with_capacity(root.children.len());
        for child in &root.children {
            let alt = match (child.kind, child.alt_text.as_deref()) {
                (StructKind::Figure, Some(alt)) if !alt.is_empty() => alt,
                (kind, _) => {
                    return Err(A11yError::structure(format!(
                        "{} element without alternate text",
                        kind.name()
                    )));
                }
            };
            let figure_id = self.reserve_object_id();
            self.assign_object(
                figure_id,
                dictionary! {
                    "Type" => "StructElem",
                    "S" => child.kind.name(),
                    "P" => document_id,
                    "Alt" => encode_text_string(alt),
                },
            )?;
            kids.push(Object::Reference(figure_id));
        }
        let figure_count = kids.len();

        self.assign_object(
            document_id,
            dictionary! {
                "Type" => "StructElem",
                "S" => StructKind::Document.name(),
                "P" => tree_root_id,
                "K" => kids,
            },
        )?;
        self.assign_object(
            tree_root_id,
            dictionary! {
                "Type" => "StructTreeRoot",
                "K" => document_id,
                "ParentTree" => dictionary! {
                    "Nums" => Vec::<Object>::new(),
                },
                "ParentTreeNextKey" => 0,
            },
        )?;

        self.catalog_mut()?.set("StructTreeRoot", tree_root_id);
        Ok(figure_count)
    }

    /// `/ViewerPreferences /DisplayDocTitle true`を設定する（既存の設定は保持）。
    pub fn set_display_doc_title(&mut self) -> crate::error::Result<()> {
        let prefs_ref = match self.catalog_mut()?.get(b"ViewerPreferences") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };
        if let Some(id) = prefs_ref
            && let Ok(prefs) = self.reader.doc.get_dictionary_mut(id)
        {
            prefs.set("DisplayDocTitle", true);
            return Ok(());
        }

        let catalog = self.catalog_mut()?;
        if let Ok(Object::Dictionary(prefs)) = catalog.get_mut(b"ViewerPreferences") {
            prefs.set("DisplayDocTitle", true);
        } else {
            catalog.set(
                "ViewerPreferences",
                dictionary! {
                    "DisplayDocTitle" => true,
                },
            );
        }
        Ok(())
    }

    /// カタログの`/Lang`を設定する。
    pub fn set_catalog_language(&mut self, language: &str) -> crate::error::Result<()> {
        self.catalog_mut()?
            .set("Lang", encode_text_string(language));
        Ok(())
    }

    /// PDFドキュメントをバイト列として出力する。
    ///
    /// 採番したまま登録されていないオブジェクトがある場合は`SerializationError`。
    pub fn save_to_bytes(&mut self) -> crate::error::Result<Vec<u8>> {
        if !self.reserved.is_empty() {
            return Err(A11yError::serialization(format!(
                "{} reserved object(s) never registered: {:?}",
                self.reserved.len(),
                self.reserved
            )));
        }
        let mut buf = Vec::new();
        self.reader.doc
            .save_to(&mut buf)
            .map_err(|e| A11yError::serialization(e.to_string()))?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// テスト用: ページなしの最小PDFバイト列
    fn minimal_pdf(version: &str) -> Vec<u8> {
        let mut doc = Document::with_version(version);
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_unassigned_reservation_fails_save() {
        let mut editor = PdfEditor::from_bytes(&minimal_pdf("1.7")).unwrap();
        let id = editor.reserve_object_id();
        let err = editor.save_to_bytes().unwrap_err();
        assert!(matches!(err, A11yError::SerializationError(_)), "{err}");

        editor.assign_object(id, Object::Null).unwrap();
        assert!(editor.save_to_bytes().is_ok());
    }

    #[test]
    fn test_assign_without_reservation_fails() {
        let mut editor = PdfEditor::from_bytes(&minimal_pdf("1.7")).unwrap();
        assert!(editor.assign_object((999, 0), Object::Null).is_err());
    }

    #[test]
    fn test_invalid_tree_is_rolled_back() {
        let mut editor = PdfEditor::from_bytes(&minimal_pdf("1.7")).unwrap();
        let objects_before = editor.document().objects.len();
        let mut root = StructElement::document_with_figures(["ok"]);
        root.children.push(StructElement {
            kind: StructKind::Figure,
            alt_text: None,
            children: Vec::new(),
        });

        assert!(editor.attach_structure_tree(&root).is_err());
        assert_eq!(editor.document().objects.len(), objects_before);
        assert!(editor.document().catalog().unwrap().get(b"StructTreeRoot").is_err());
        // 巻き戻し後は保存できる
        assert!(editor.save_to_bytes().is_ok());
    }

    #[test]
    fn test_mark_tagged_raises_old_version() {
        let mut editor = PdfEditor::from_bytes(&minimal_pdf("1.3")).unwrap();
        editor.mark_tagged().unwrap();
        let bytes = editor.save_to_bytes().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.7"));

        let reader = PdfReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.read_metadata().is_tagged, Some(true));
    }

    #[test]
    fn test_write_metadata_creates_info() {
        let mut editor = PdfEditor::from_bytes(&minimal_pdf("1.7")).unwrap();
        let written = editor
            .write_metadata(&MetadataRecord {
                title: Some("Quarterly".into()),
                subject: Some(String::new()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(written, vec!["title", "subject"]);

        let bytes = editor.save_to_bytes().unwrap();
        let meta = PdfReader::from_bytes(&bytes).unwrap().read_metadata();
        assert_eq!(meta.title.as_deref(), Some("Quarterly"));
        assert_eq!(meta.subject.as_deref(), Some(""));
        assert_eq!(meta.author, None);
    }
}
