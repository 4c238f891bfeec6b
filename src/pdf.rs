//! PDF text extraction.
//!
//! Extraction goes through a prioritized list of [`PdfExtractor`]
//! strategies: the first one that succeeds wins. The `pdf-fallback`
//! feature adds a second extractor behind the primary one.

use std::{io::Read, path::Path};

use crate::error::{Error, Result};

/// First bytes of every well-formed PDF file.
pub const PDF_MAGIC: &[u8; 5] = b"%PDF-";

/// Check whether a file starts with the PDF magic signature.
///
/// Unreadable and truncated files are reported as not being PDFs.
pub fn has_pdf_magic(path: &Path) -> bool {
    let mut head = [0u8; PDF_MAGIC.len()];
    std::fs::File::open(path)
        .and_then(|mut f| f.read_exact(&mut head))
        .is_ok_and(|()| &head == PDF_MAGIC)
}

/// A strategy that turns a PDF file into per-page text.
pub trait PdfExtractor {
    /// Short name used in log messages.
    fn name(&self) -> &'static str;

    /// Extract the text of every page, in page order.
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>>;
}

/// Primary extractor backed by `pdf_oxide`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OxideExtractor;

impl PdfExtractor for OxideExtractor {
    fn name(&self) -> &'static str {
        "pdf_oxide"
    }

    fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
        let doc = pdf_oxide::PdfDocument::open(path)
            .map_err(|e| Error::Pdf(e.to_string()))?;
        let page_count =
            doc.page_count().map_err(|e| Error::Pdf(e.to_string()))?;

        let mut pages = Vec::with_capacity(page_count);
        for page in 0..page_count {
            let text = doc
                .extract_text(page)
                .map_err(|e| Error::Pdf(format!("page {page}: {e}")))?;
            pages.push(text);
        }
        Ok(pages)
    }
}

/// Fallback extractor backed by `pdf-extract`.
#[cfg(feature = "pdf-fallback")]
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractFallback;

#[cfg(feature = "pdf-fallback")]
impl PdfExtractor for PdfExtractFallback {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
        // pdf-extract panics on some malformed files instead of erroring.
        let outcome = std::panic::catch_unwind(|| {
            pdf_extract::extract_text_by_pages(path)
        });
        match outcome {
            Ok(Ok(pages)) => Ok(pages),
            Ok(Err(e)) => Err(Error::Pdf(e.to_string())),
            Err(_) => Err(Error::Pdf("pdf-extract panicked".to_string())),
        }
    }
}

/// The extractors compiled into this build, in the order they are tried.
pub fn default_extractors() -> Vec<Box<dyn PdfExtractor>> {
    #[allow(unused_mut)]
    let mut chain: Vec<Box<dyn PdfExtractor>> = vec![Box::new(OxideExtractor)];
    #[cfg(feature = "pdf-fallback")]
    chain.push(Box::new(PdfExtractFallback));
    chain
}

/// Run `extractors` in order and return the first successful result.
///
/// On total failure, returns the error of the last extractor tried. The
/// error notes when only a single extractor was available.
pub fn extract_with_fallback(
    extractors: &[Box<dyn PdfExtractor>],
    path: &Path,
) -> Result<Vec<String>> {
    let mut last_err = None;

    for extractor in extractors {
        match extractor.extract_pages(path) {
            Ok(pages) => return Ok(pages),
            Err(e) => {
                tracing::debug!(
                    extractor = extractor.name(),
                    path = %path.display(),
                    "PDF extraction failed: {e}"
                );
                last_err = Some(e);
            }
        }
    }

    match last_err {
        Some(e) if extractors.len() == 1 => Err(Error::Pdf(format!(
            "{} failed and no fallback extractor is available: {e}",
            extractors[0].name()
        ))),
        Some(e) => Err(e),
        None => Err(Error::Pdf("no PDF extractor configured".to_string())),
    }
}
