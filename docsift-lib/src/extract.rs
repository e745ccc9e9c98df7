//! Text handed over by the extraction collaborator
//!
//! Byte-level extraction of PDF and DOCX files happens outside this crate.
//! Whatever does it reports back an [`Extraction`]; the pipeline only looks
//! at the text, the metadata and whether it succeeded. Plain text is simple
//! enough to decode here.

use serde::{Deserialize, Serialize};

use crate::chunk::Metadata;

/// Result of extracting text from a document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Extraction {
    pub success: bool,
    pub text: String,
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Extraction {
    /// A successful extraction
    pub fn ok(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            success: true,
            text: text.into(),
            metadata,
            error: None,
        }
    }

    /// A failed extraction
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            text: String::new(),
            metadata: Metadata::new(),
            error: Some(error.into()),
        }
    }
}

/// Decode a plain text file.
///
/// Tries UTF-8 first and falls back to Latin-1, which maps every byte to a
/// character and so never fails. Metadata records `lines` and `characters`.
pub fn extract_plain_text(bytes: &[u8]) -> Extraction {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    };

    let mut metadata = Metadata::new();
    metadata.insert("lines".to_string(), text.split('\n').count().into());
    metadata.insert("characters".to_string(), text.chars().count().into());

    Extraction::ok(text, metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::MetadataValue;

    #[test]
    fn test_utf8_text() {
        let extraction = extract_plain_text("héllo\nworld".as_bytes());

        assert!(extraction.success);
        assert_eq!(extraction.text, "héllo\nworld");
        assert_eq!(extraction.metadata["lines"], MetadataValue::Int(2));
        assert_eq!(extraction.metadata["characters"], MetadataValue::Int(11));
    }

    #[test]
    fn test_latin1_fallback() {
        // 0xE9 is 'é' in Latin-1 and invalid as a lone UTF-8 byte
        let extraction = extract_plain_text(&[b'c', b'a', b'f', 0xE9]);

        assert!(extraction.success);
        assert_eq!(extraction.text, "café");
    }

    #[test]
    fn test_failed_extraction() {
        let extraction = Extraction::failed("unsupported file type: .xls");

        assert!(!extraction.success);
        assert!(extraction.text.is_empty());
        assert_eq!(extraction.error.as_deref(), Some("unsupported file type: .xls"));
    }
}
