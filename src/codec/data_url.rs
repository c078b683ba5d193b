use base64::{Engine as _, engine::general_purpose::STANDARD};

/// Wrap encoded bytes as a `data:` URL.
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Degraded representation for raw samples that could not be packed into a
/// container: the dimensions travel in the URL so a consumer can still
/// interpret the bytes.
pub fn raw_data_url(width: u32, height: u32, bytes: &[u8]) -> String {
    format!(
        "data:image/raw;width={};height={};base64,{}",
        width,
        height,
        STANDARD.encode(bytes)
    )
}

/// Strip a `data:...;base64,` prefix, leaving bare base64.
/// Input without a prefix is returned unchanged.
pub fn base64_payload(data: &str) -> &str {
    match data.find("base64,") {
        Some(pos) => &data[pos + "base64,".len()..],
        None => data,
    }
}
