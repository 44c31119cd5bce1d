use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD};

/// Encodes bytes as `data:<mime>;base64,<payload>`.
pub fn encode(content_type: &str, data: &[u8]) -> String {
    let mime = if content_type.is_empty() {
        "application/octet-stream"
    } else {
        content_type
    };
    format!("data:{};base64,{}", mime, STANDARD.encode(data))
}

/// Splits a base64 data URI into its MIME type and decoded bytes.
pub fn decode(uri: &str) -> Result<(String, Vec<u8>)> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| anyhow!("Not a data URI"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| anyhow!("Data URI has no payload separator"))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| anyhow!("Only base64 data URIs are supported"))?;
    let data = STANDARD.decode(payload)?;
    Ok((mime.to_string(), data))
}
