use crate::config::PortalConfig;
use crate::error::{PortalError, PortalResult};
use std::path::Path;

const MAX_NAME_LEN: usize = 255;

/// Upload limits taken from configuration.
#[derive(Debug, Clone)]
pub struct UploadRules {
    pub max_file_size: usize,
    /// Lowercase extensions without the dot.
    pub allowed_extensions: Vec<String>,
    pub allowed_mime_types: Vec<String>,
}

impl UploadRules {
    pub fn from_config(config: &PortalConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            allowed_extensions: config
                .allowed_file_types
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            allowed_mime_types: config
                .allowed_mime_types
                .iter()
                .map(|m| normalize_mime(m))
                .collect(),
        }
    }
}

/// An upload that passed every check, with its names cleaned and its MIME type settled.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedUpload {
    pub display_name: String,
    pub original_name: String,
    pub content_type: String,
}

/// Runs the upload checks in order: display name, size, extension, MIME type.
pub fn validate_upload(
    rules: &UploadRules,
    display_name: &str,
    original_name: &str,
    declared_type: Option<&str>,
    data: &[u8],
) -> PortalResult<CheckedUpload> {
    let display_name = validate_display_name(display_name)?;
    validate_file_size(data.len(), rules.max_file_size)?;
    let original_name = sanitize_filename(original_name)?;
    validate_extension(&original_name, rules)?;
    let content_type = resolve_content_type(declared_type, &original_name, data);
    validate_mime_type(&content_type, rules)?;

    Ok(CheckedUpload {
        display_name,
        original_name,
        content_type,
    })
}

pub fn validate_display_name(name: &str) -> PortalResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(PortalError::Validation(
            "Display name is required".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(PortalError::Validation(format!(
            "Display name is longer than {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_file_size(size: usize, max_size: usize) -> PortalResult<()> {
    if size == 0 {
        return Err(PortalError::Validation("File is empty".to_string()));
    }
    if size > max_size {
        return Err(PortalError::Validation(format!(
            "File size {} bytes exceeds maximum allowed {} bytes ({} MB)",
            size,
            max_size,
            max_size / 1024 / 1024
        )));
    }
    Ok(())
}

/// Keeps only the final path component and replaces reserved characters.
pub fn sanitize_filename(filename: &str) -> PortalResult<String> {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() {
        return Err(PortalError::Validation(
            "Filename cannot be empty".to_string(),
        ));
    }
    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path components stripped from upload name: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    let sanitized = if sanitized.len() > MAX_NAME_LEN {
        let mut end = MAX_NAME_LEN;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    if sanitized.starts_with('.') {
        return Err(PortalError::Validation(
            "Hidden files (starting with '.') are not allowed".to_string(),
        ));
    }
    Ok(sanitized)
}

pub fn file_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

pub fn validate_extension(name: &str, rules: &UploadRules) -> PortalResult<()> {
    match file_extension(name) {
        Some(ext) if rules.allowed_extensions.contains(&ext) => Ok(()),
        Some(ext) => Err(PortalError::Validation(format!(
            "File type '.{}' is not allowed. Allowed: {}",
            ext,
            rules.allowed_extensions.join(", ")
        ))),
        None => Err(PortalError::Validation(
            "File has no extension".to_string(),
        )),
    }
}

/// The declared type unless it is missing or generic, in which case the bytes
/// are sniffed and then the extension consulted.
pub fn resolve_content_type(declared: Option<&str>, name: &str, data: &[u8]) -> String {
    let declared = declared.map(normalize_mime).unwrap_or_default();
    if !declared.is_empty() && declared != mime::APPLICATION_OCTET_STREAM.essence_str() {
        return declared;
    }
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }
    let by_extension = match file_extension(name).as_deref() {
        Some("txt") => mime::TEXT_PLAIN,
        Some("csv") => mime::TEXT_CSV,
        Some("json") => mime::APPLICATION_JSON,
        Some("pdf") => mime::APPLICATION_PDF,
        Some("jpg" | "jpeg") => mime::IMAGE_JPEG,
        Some("png") => mime::IMAGE_PNG,
        Some("gif") => mime::IMAGE_GIF,
        _ => mime::APPLICATION_OCTET_STREAM,
    };
    by_extension.essence_str().to_string()
}

pub fn validate_mime_type(content_type: &str, rules: &UploadRules) -> PortalResult<()> {
    let normalized = normalize_mime(content_type);
    if rules.allowed_mime_types.iter().any(|m| m == &normalized) {
        return Ok(());
    }
    Err(PortalError::Validation(format!(
        "MIME type '{content_type}' is not allowed"
    )))
}

/// Lowercased essence without parameters; `image/jpg` folds into `image/jpeg`.
fn normalize_mime(content_type: &str) -> String {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    match essence.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => essence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> UploadRules {
        UploadRules::from_config(&PortalConfig::development())
    }

    #[test]
    fn test_accepts_plain_text() {
        let checked =
            validate_upload(&rules(), "  Notes ", "notes.txt", Some("text/plain"), b"hi").unwrap();
        assert_eq!(checked.display_name, "Notes");
        assert_eq!(checked.content_type, "text/plain");
    }

    #[test]
    fn test_rejects_blank_display_name() {
        let err = validate_upload(&rules(), "   ", "notes.txt", None, b"hi").unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
    }

    #[test]
    fn test_rejects_oversized_and_empty() {
        let mut r = rules();
        r.max_file_size = 4;
        assert!(validate_upload(&r, "x", "a.txt", None, b"12345").is_err());
        assert!(validate_upload(&r, "x", "a.txt", None, b"").is_err());
    }

    #[test]
    fn test_rejects_disallowed_extension() {
        let err = validate_upload(&rules(), "x", "run.exe", None, b"MZ").unwrap_err();
        assert!(err.to_string().contains(".exe"));
        assert!(validate_extension("README", &rules()).is_err());
    }

    #[test]
    fn test_sniffs_generic_content_type() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(
            resolve_content_type(Some("application/octet-stream"), "a.png", &png),
            "image/png"
        );
        assert_eq!(resolve_content_type(None, "a.txt", b"plain"), "text/plain");
        assert_eq!(
            resolve_content_type(Some("Image/JPG; q=1"), "a.jpg", b""),
            "image/jpeg"
        );
    }

    #[test]
    fn test_rejects_disallowed_mime() {
        let err =
            validate_upload(&rules(), "x", "a.txt", Some("application/x-sh"), b"#!").unwrap_err();
        assert!(err.to_string().contains("application/x-sh"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/pass:wd.txt").unwrap(), "pass_wd.txt");
        assert!(sanitize_filename(".env").is_err());
        assert!(sanitize_filename("").is_err());
        let long = format!("{}.txt", "é".repeat(200));
        assert!(sanitize_filename(&long).unwrap().len() <= MAX_NAME_LEN);
    }
}
