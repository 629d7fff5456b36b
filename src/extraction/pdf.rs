//! PDF extraction backed by `lopdf`.

use super::{DocumentExtractor, ExtractedDocument, ExtractionConstraints, ExtractionError};
use async_trait::async_trait;
use lopdf::{Document, Object};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// Info dictionary entries surfaced as document metadata.
const INFO_KEYS: [(&str, &str); 7] = [
    ("Title", "title"),
    ("Author", "author"),
    ("Subject", "subject"),
    ("Creator", "creator"),
    ("Producer", "producer"),
    ("CreationDate", "creation_date"),
    ("ModDate", "modification_date"),
];

/// Extracts text page by page from PDF files.
///
/// Parsing is CPU bound and runs on the blocking pool. Pages whose content streams cannot be
/// decoded are reported through [`ExtractedDocument::unreadable_pages`] instead of failing the
/// whole document.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl PdfExtractor {
    /// Construct a new PDF extractor.
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    async fn extract(
        &self,
        path: &Path,
        constraints: &ExtractionConstraints,
    ) -> Result<ExtractedDocument, ExtractionError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !has_pdf_extension(&file_name) {
            return Err(ExtractionError::UnsupportedFormat(file_name));
        }

        let metadata = tokio::fs::metadata(path).await.map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                ExtractionError::NotFound(path.display().to_string())
            } else {
                ExtractionError::Io(error)
            }
        })?;
        if !metadata.is_file() {
            return Err(ExtractionError::NotFound(path.display().to_string()));
        }
        if metadata.len() > constraints.max_file_size {
            return Err(ExtractionError::FileTooLarge {
                size: metadata.len(),
                limit: constraints.max_file_size,
            });
        }

        let bytes = tokio::fs::read(path).await?;
        let max_pages = constraints.max_pages;
        let parsed = tokio::task::spawn_blocking(move || parse_pdf(&bytes, max_pages))
            .await
            .map_err(|error| ExtractionError::Corrupt(format!("extraction task failed: {error}")))??;

        tracing::debug!(
            file = %file_name,
            pages = parsed.page_count,
            unreadable = parsed.unreadable_pages.len(),
            chars = parsed.text.len(),
            "PDF text extraction complete"
        );

        Ok(ExtractedDocument {
            file_name,
            file_size: metadata.len(),
            ..parsed
        })
    }
}

fn has_pdf_extension(file_name: &str) -> bool {
    file_name.to_ascii_lowercase().ends_with(".pdf")
}

fn parse_pdf(bytes: &[u8], max_pages: usize) -> Result<ExtractedDocument, ExtractionError> {
    let fingerprint = hex::encode(Sha256::digest(bytes));
    let document =
        Document::load_mem(bytes).map_err(|error| ExtractionError::Corrupt(error.to_string()))?;

    let pages = document.get_pages();
    let page_count = pages.len();
    if page_count > max_pages {
        return Err(ExtractionError::PageLimitExceeded {
            pages: page_count,
            limit: max_pages,
        });
    }

    let mut texts = Vec::with_capacity(page_count);
    let mut unreadable_pages = Vec::new();
    for page_number in pages.keys().copied() {
        match document.extract_text(&[page_number]) {
            Ok(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    texts.push(trimmed.to_string());
                }
            }
            Err(error) => {
                tracing::debug!(page = page_number, %error, "Failed to decode page text");
                unreadable_pages.push(page_number);
            }
        }
    }

    Ok(ExtractedDocument {
        text: texts.join("\n\n"),
        page_count,
        metadata: read_info_dictionary(&document),
        unreadable_pages,
        fingerprint,
        ..ExtractedDocument::default()
    })
}

fn read_info_dictionary(document: &Document) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    let Ok(info_id) = document.trailer.get(b"Info").and_then(Object::as_reference) else {
        return metadata;
    };
    let Ok(info) = document.get_dictionary(info_id) else {
        return metadata;
    };

    for (key, label) in INFO_KEYS {
        if let Ok(raw) = info.get(key.as_bytes()).and_then(Object::as_str) {
            let value = decode_pdf_text_string(raw);
            if !value.trim().is_empty() {
                metadata.insert(label.to_string(), value.trim().to_string());
            }
        }
    }

    metadata
}

/// Decode a PDF text string: UTF-16BE when it carries a byte-order mark, PDFDocEncoding
/// (approximated as Latin-1) otherwise.
fn decode_pdf_text_string(raw: &[u8]) -> String {
    if let Some(body) = raw.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    raw.iter().map(|&byte| char::from(byte)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};
    use std::io::Write;

    fn constraints() -> ExtractionConstraints {
        ExtractionConstraints {
            max_pages: 10,
            max_file_size: 1024,
        }
    }

    #[test]
    fn decodes_utf16_text_strings() {
        let raw = [0xFE, 0xFF, 0x00, b'H', 0x00, b'i'];
        assert_eq!(decode_pdf_text_string(&raw), "Hi");
    }

    #[test]
    fn decodes_latin1_text_strings() {
        assert_eq!(decode_pdf_text_string(b"Report \xE9t\xE9"), "Report été");
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(has_pdf_extension("REPORT.PDF"));
        assert!(!has_pdf_extension("report.txt"));
    }

    #[tokio::test]
    async fn rejects_non_pdf_names() {
        let error = PdfExtractor::new()
            .extract(Path::new("/tmp/notes.txt"), &constraints())
            .await
            .unwrap_err();
        assert!(matches!(error, ExtractionError::UnsupportedFormat(name) if name == "notes.txt"));
    }

    #[tokio::test]
    async fn reports_missing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let error = PdfExtractor::new()
            .extract(&dir.path().join("missing.pdf"), &constraints())
            .await
            .unwrap_err();
        assert!(matches!(error, ExtractionError::NotFound(_)));
    }

    #[tokio::test]
    async fn rejects_oversized_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("big.pdf");
        std::fs::write(&path, vec![b'x'; 2048]).expect("write fixture");

        let error = PdfExtractor::new()
            .extract(&path, &constraints())
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            ExtractionError::FileTooLarge {
                size: 2048,
                limit: 1024
            }
        ));
    }

    #[tokio::test]
    async fn garbage_bytes_are_reported_as_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.pdf");
        let mut file = std::fs::File::create(&path).expect("create fixture");
        file.write_all(b"definitely not a pdf").expect("write fixture");

        let error = PdfExtractor::new()
            .extract(&path, &constraints())
            .await
            .unwrap_err();
        assert!(matches!(error, ExtractionError::Corrupt(_)));
    }

    /// Build a PDF with one page per content stream and an optional Info dictionary.
    fn build_pdf(pages: &[&[u8]], info: &[(&str, &str)]) -> Vec<u8> {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let font_id = document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = document.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for content in pages {
            let content_id = document.add_object(Stream::new(dictionary! {}, content.to_vec()));
            let page_id = document.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }
        let page_count = kids.len() as i64;
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);

        if !info.is_empty() {
            let mut dictionary = lopdf::Dictionary::new();
            for (key, value) in info {
                dictionary.set(*key, Object::string_literal(*value));
            }
            let info_id = document.add_object(dictionary);
            document.trailer.set("Info", info_id);
        }

        let mut bytes = Vec::new();
        document.save_to(&mut bytes).expect("serialize fixture");
        bytes
    }

    fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).expect("write fixture");
        path
    }

    fn roomy_constraints(max_pages: usize) -> ExtractionConstraints {
        ExtractionConstraints {
            max_pages,
            max_file_size: 1_000_000,
        }
    }

    #[tokio::test]
    async fn extracts_page_text_and_info_metadata() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bytes = build_pdf(
            &[
                b"BT /F1 12 Tf 72 720 Td (Quarterly revenue grew.) Tj ET",
                b"BT /F1 12 Tf 72 720 Td (Costs were flat.) Tj ET",
            ],
            &[("Title", "Quarterly Report"), ("Author", "Finance Team")],
        );
        let path = write_fixture(dir.path(), "report.pdf", &bytes);

        let document = PdfExtractor::new()
            .extract(&path, &roomy_constraints(10))
            .await
            .expect("extraction succeeds");

        assert_eq!(document.page_count, 2);
        assert_eq!(document.file_name, "report.pdf");
        assert_eq!(document.file_size, bytes.len() as u64);
        let revenue = document.text.find("Quarterly revenue grew.").expect("page one text");
        let costs = document.text.find("Costs were flat.").expect("page two text");
        assert!(revenue < costs);
        assert!(document.unreadable_pages.is_empty());
        assert_eq!(document.metadata.get("title").map(String::as_str), Some("Quarterly Report"));
        assert_eq!(document.metadata.get("author").map(String::as_str), Some("Finance Team"));
        assert!(!document.metadata.contains_key("subject"));
        assert_eq!(document.fingerprint, hex::encode(Sha256::digest(&bytes)));
    }

    #[tokio::test]
    async fn undecodable_pages_are_reported_without_failing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bytes = build_pdf(
            &[
                b"BT /F1 12 Tf 72 720 Td (Readable page.) Tj ET",
                b"BT 12 12 Tf 72 720 Td (Broken font operand.) Tj ET",
            ],
            &[],
        );
        let path = write_fixture(dir.path(), "mixed.pdf", &bytes);

        let document = PdfExtractor::new()
            .extract(&path, &roomy_constraints(10))
            .await
            .expect("extraction succeeds");

        assert!(document.text.contains("Readable page."));
        assert!(!document.text.contains("Broken font operand."));
        assert_eq!(document.unreadable_pages, vec![2]);
        assert!(document.metadata.is_empty());
    }

    #[tokio::test]
    async fn page_limit_is_enforced_after_parsing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let page: &[u8] = b"BT /F1 12 Tf 72 720 Td (Page.) Tj ET";
        let bytes = build_pdf(&[page, page, page], &[]);
        let path = write_fixture(dir.path(), "long.pdf", &bytes);

        let error = PdfExtractor::new()
            .extract(&path, &roomy_constraints(2))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            ExtractionError::PageLimitExceeded { pages: 3, limit: 2 }
        ));

        let document = PdfExtractor::new()
            .extract(&path, &roomy_constraints(3))
            .await
            .expect("three pages fit");
        assert_eq!(document.page_count, 3);
    }
}
