//! Bindery Parser Library
//!
//! Converts Markdown bodies to HTML and a table of contents.

pub mod markdown;

pub use markdown::{MarkdownConverter, MarkdownError};
use thiserror::Error;

/// Parser errors.
#[derive(Debug, Error)]
pub enum ParserError {
    /// Markdown conversion error.
    #[error("markdown error: {0}")]
    Markdown(#[from] MarkdownError),
}

/// Result type for parser operations.
pub type Result<T> = std::result::Result<T, ParserError>;

/// Output of a conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Converted {
    /// Body HTML.
    pub body: String,

    /// Table of contents HTML, empty when the document has no headings.
    pub toc: String,
}

/// Converts a Markdown document body to HTML.
///
/// Implementations must be safe to call from several threads at once.
pub trait Converter: Send + Sync {
    /// Convert raw Markdown bytes.
    fn convert(&self, markdown: &[u8]) -> Result<Converted>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converter_trait_object() {
        let converter: Box<dyn Converter> = Box::new(MarkdownConverter::new());
        let out = converter.convert(b"## Section\n\nText").unwrap();
        assert!(out.body.contains("<h2 id=\"section\">Section</h2>"));
        assert!(out.toc.contains("#section"));
    }

    #[test]
    fn test_encoding_error_is_reported() {
        let result = MarkdownConverter::new().convert(&[0xc3, 0x28]);
        assert!(matches!(
            result,
            Err(ParserError::Markdown(MarkdownError::Encoding(_)))
        ));
    }
}
