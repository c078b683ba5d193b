// PDFテキスト文字列と日付文字列の変換

use chrono::{DateTime, Utc};
use lopdf::{Object, StringFormat};

/// Rust文字列をPDFテキスト文字列オブジェクトに変換する。
///
/// ASCIIのみならリテラル文字列、それ以外はBOM付きUTF-16BE（16進文字列）。
pub fn encode_text_string(s: &str) -> Object {
    if s.is_ascii() {
        return Object::string_literal(s);
    }
    let mut bytes = Vec::with_capacity(2 + s.len() * 2);
    bytes.extend_from_slice(&[0xFE, 0xFF]);
    for unit in s.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// PDFテキスト文字列のバイト列をRust文字列に変換する。
///
/// UTF-16BE (BOM FE FF)、UTF-8 (BOM EF BB BF)、それ以外はPDFDocEncodingを
/// Latin-1として扱う。
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// 文字列オブジェクトならデコードして返す。
pub fn object_text(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

/// PDF日付文字列 `D:YYYYMMDDHHmmSS+00'00'` を生成する。
pub fn pdf_date(at: DateTime<Utc>) -> String {
    at.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}
