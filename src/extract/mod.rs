//! Multi-format text extraction for office documents.
//!
//! The loader supplies raw bytes plus a [`DocFormat`]; this module
//! returns plain UTF-8 text. The accepted formats are a closed set of
//! extractor variants — adding a format means adding a variant here,
//! never touching the loader's control flow. Extraction never panics on
//! malformed input; it returns an error and the loader skips the file.

mod legacy;
mod ooxml;

use std::path::Path;

use thiserror::Error;

/// The closed set of supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocFormat {
    /// Legacy Word binary (`.doc`, CFB container).
    Doc,
    /// Word XML (`.docx`, OOXML package).
    Docx,
    /// Excel spreadsheet (`.xlsx`, OOXML package).
    Xlsx,
}

impl DocFormat {
    /// Map a file extension (without dot, any case) onto a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "doc" => Some(DocFormat::Doc),
            "docx" => Some(DocFormat::Docx),
            "xlsx" => Some(DocFormat::Xlsx),
            _ => None,
        }
    }

    /// Map a path onto a format via its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocFormat::Doc => "doc",
            DocFormat::Docx => "docx",
            DocFormat::Xlsx => "xlsx",
        }
    }
}

/// Extraction error. Per-file failures are logged and the file is
/// dropped from the corpus; a bad file never aborts the whole load.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("legacy Word extraction failed: {0}")]
    Legacy(String),
}

/// Extract plain text from document bytes.
pub fn extract_text(bytes: &[u8], format: DocFormat) -> Result<String, ExtractError> {
    match format {
        DocFormat::Doc => legacy::extract_doc(bytes),
        DocFormat::Docx => ooxml::extract_docx(bytes),
        DocFormat::Xlsx => ooxml::extract_xlsx(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_mapping_is_case_insensitive() {
        assert_eq!(DocFormat::from_extension("DOCX"), Some(DocFormat::Docx));
        assert_eq!(DocFormat::from_extension("Doc"), Some(DocFormat::Doc));
        assert_eq!(DocFormat::from_extension("xlsx"), Some(DocFormat::Xlsx));
        assert_eq!(DocFormat::from_extension("pdf"), None);
    }

    #[test]
    fn path_without_extension_maps_to_none() {
        assert_eq!(DocFormat::from_path(Path::new("README")), None);
        assert_eq!(
            DocFormat::from_path(Path::new("thuc-don.xlsx")),
            Some(DocFormat::Xlsx)
        );
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_text(b"not a zip", DocFormat::Docx).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn invalid_header_returns_error_for_doc() {
        let err = extract_text(b"plainly not a compound file", DocFormat::Doc).unwrap_err();
        assert!(matches!(err, ExtractError::Legacy(_)));
    }
}
