// Phase 4: 論理構造ツリー（Document → Figure）の組み立て

/// 構造要素の種類（/S）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructKind {
    Document,
    Figure,
}

impl StructKind {
    /// /Sに書き込む構造型名
    pub fn name(self) -> &'static str {
        match self {
            StructKind::Document => "Document",
            StructKind::Figure => "Figure",
        }
    }
}

/// 書き込み専用の構造要素ノード。
///
/// リメディエーションのたびに作り直し、PDFに直接シリアライズする。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructElement {
    pub kind: StructKind,
    pub alt_text: Option<String>,
    pub children: Vec<StructElement>,
}

impl StructElement {
    pub fn figure(alt_text: impl Into<String>) -> Self {
        Self {
            kind: StructKind::Figure,
            alt_text: Some(alt_text.into()),
            children: Vec::new(),
        }
    }

    /// 空でない代替テキストごとにFigureを1つ作り、入力順のまま
    /// 単一のDocumentルートの子として並べる。
    pub fn document_with_figures<'a>(alt_texts: impl IntoIterator<Item = &'a str>) -> Self {
        let children = alt_texts
            .into_iter()
            .filter(|alt| !alt.is_empty())
            .map(StructElement::figure)
            .collect();
        Self {
            kind: StructKind::Document,
            alt_text: None,
            children,
        }
    }

    /// 子Figureの代替テキストを順に返す。
    pub fn figure_alt_texts(&self) -> Vec<&str> {
        self.children
            .iter()
            .filter(|c| c.kind == StructKind::Figure)
            .filter_map(|c| c.alt_text.as_deref())
            .collect()
    }
}
