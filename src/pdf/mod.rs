pub mod image_xobject;
pub mod reader;
pub mod struct_tree;
pub mod text;
pub mod writer;

use lopdf::Object;
use serde::{Deserialize, Serialize};

/// Document-level accessibility metadata.
///
/// `None` means "leave unset"; `Some("")` explicitly clears the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_tagged: Option<bool>,
}

/// The closed set of PDF object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Null,
    Boolean,
    Number,
    String,
    Name,
    Array,
    Dictionary,
    Stream,
    Reference,
}

/// Classify a lopdf object into its [`ObjectKind`].
pub fn kind_of(obj: &Object) -> ObjectKind {
    match obj {
        Object::Null => ObjectKind::Null,
        Object::Boolean(_) => ObjectKind::Boolean,
        Object::Integer(_) | Object::Real(_) => ObjectKind::Number,
        Object::String(_, _) => ObjectKind::String,
        Object::Name(_) => ObjectKind::Name,
        Object::Array(_) => ObjectKind::Array,
        Object::Dictionary(_) => ObjectKind::Dictionary,
        Object::Stream(_) => ObjectKind::Stream,
        Object::Reference(_) => ObjectKind::Reference,
    }
}

/// Integer value of a number object, accepting integral reals.
pub(crate) fn object_to_i64(obj: &Object) -> Option<i64> {
    match obj {
        Object::Integer(i) => Some(*i),
        Object::Real(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_of_numbers() {
        assert_eq!(kind_of(&Object::Integer(3)), ObjectKind::Number);
        assert_eq!(kind_of(&Object::Real(3.5)), ObjectKind::Number);
        assert_eq!(kind_of(&Object::Reference((1, 0))), ObjectKind::Reference);
    }

    #[test]
    fn test_object_to_i64() {
        assert_eq!(object_to_i64(&Object::Integer(12)), Some(12));
        assert_eq!(object_to_i64(&Object::Real(12.0)), Some(12));
        assert_eq!(object_to_i64(&Object::Real(12.5)), None);
        assert_eq!(object_to_i64(&Object::Name(b"W".to_vec())), None);
    }

    #[test]
    fn test_metadata_serializes_camel_case() {
        let meta = MetadataRecord {
            title: Some("T".into()),
            is_tagged: Some(false),
            ..Default::default()
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"title":"T","isTagged":false}"#);
    }
}
