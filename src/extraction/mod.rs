//! Document extraction: turning source files into plain text plus document metadata.
//!
//! The orchestrator depends on the [`DocumentExtractor`] trait only; [`PdfExtractor`] is the
//! production implementation.

mod pdf;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

pub use pdf::PdfExtractor;

/// Limits the extractor enforces while reading a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionConstraints {
    /// Documents with more pages than this are rejected.
    pub max_pages: usize,
    /// Documents larger than this many bytes are rejected.
    pub max_file_size: u64,
}

/// Text and metadata produced by an extractor for a single document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedDocument {
    /// Extracted text; pages are separated by a blank line.
    pub text: String,
    /// Number of pages in the source document.
    pub page_count: usize,
    /// Selected document metadata (title, author, ...).
    pub metadata: BTreeMap<String, String>,
    /// File name of the source document.
    pub file_name: String,
    /// Source size in bytes.
    pub file_size: u64,
    /// 1-based page numbers whose text could not be decoded.
    pub unreadable_pages: Vec<u32>,
    /// SHA-256 of the source bytes, hex encoded.
    pub fingerprint: String,
}

impl ExtractedDocument {
    /// Whether any extractable characters remain once whitespace is ignored.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Whether part of the document could not be read.
    pub fn is_degraded(&self) -> bool {
        !self.unreadable_pages.is_empty()
    }
}

/// Errors raised while reading or parsing a source document.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The path does not point at a file.
    #[error("Document not found: {0}")]
    NotFound(String),
    /// The extractor does not understand this kind of file.
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),
    /// The file exceeds the configured byte limit.
    #[error("Document is {size} bytes; the limit is {limit} bytes")]
    FileTooLarge {
        /// Actual file size.
        size: u64,
        /// Configured limit.
        limit: u64,
    },
    /// The document exceeds the configured page limit.
    #[error("Document has {pages} pages; the limit is {limit} pages")]
    PageLimitExceeded {
        /// Actual page count.
        pages: usize,
        /// Configured limit.
        limit: usize,
    },
    /// The file could not be parsed.
    #[error("Failed to parse document: {0}")]
    Corrupt(String),
    /// Reading the file failed.
    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),
}

/// Interface implemented by document extraction backends.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Extract text and metadata from the file at `path`, honoring `constraints`.
    async fn extract(
        &self,
        path: &Path,
        constraints: &ExtractionConstraints,
    ) -> Result<ExtractedDocument, ExtractionError>;
}
