//! Turning discovered files into raw text documents.
//!
//! Loading never fails as a whole: every file gets a [`LoadOutcome`] and
//! the caller decides what to do with skipped or failed files.

use std::path::{Path, PathBuf};

use crate::{
    pdf::{self, PdfExtractor},
    walker::{DiscoveredFile, FileKind},
};

/// Raw text extracted from a file (or one page of a PDF).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    /// Absolute path of the source file.
    pub source: PathBuf,
    /// Zero-based page number, for paged formats only.
    pub page: Option<u32>,
}

/// The result of loading a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(Vec<Document>),
    /// The file was deliberately ignored (e.g. not really a PDF).
    Skipped(String),
    /// Every way of reading the file failed.
    Failed(String),
}

/// What happened to one file of a [`LoadReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// The file contributed this many documents to the report.
    Loaded { documents: usize },
    Skipped(String),
    Failed(String),
}

/// Aggregated result of loading a set of files.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// All loaded documents, in file order.
    pub documents: Vec<Document>,
    /// Per-file status, in file order. A file that loaded zero documents
    /// is recorded as skipped.
    pub files: Vec<(DiscoveredFile, FileStatus)>,
}

impl LoadReport {
    pub fn loaded_files(&self) -> usize {
        self.files
            .iter()
            .filter(|(_, s)| matches!(s, FileStatus::Loaded { .. }))
            .count()
    }

    pub fn skipped_files(&self) -> usize {
        self.files.len() - self.loaded_files()
    }
}

/// Loads files using a fixed chain of PDF extractors.
pub struct Loader {
    pdf_extractors: Vec<Box<dyn PdfExtractor>>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(pdf::default_extractors())
    }
}

impl Loader {
    pub fn new(pdf_extractors: Vec<Box<dyn PdfExtractor>>) -> Self {
        Self { pdf_extractors }
    }

    /// Load a single file into documents.
    pub fn load_file(&self, path: &Path, kind: FileKind) -> LoadOutcome {
        match kind {
            FileKind::Text => load_text(path),
            FileKind::Pdf => self.load_pdf(path),
        }
    }

    fn load_pdf(&self, path: &Path) -> LoadOutcome {
        if !pdf::has_pdf_magic(path) {
            return LoadOutcome::Skipped(
                "not a valid PDF (bad header)".to_string(),
            );
        }

        match pdf::extract_with_fallback(&self.pdf_extractors, path) {
            Ok(pages) => LoadOutcome::Loaded(
                pages
                    .into_iter()
                    .enumerate()
                    .map(|(page, text)| Document {
                        text,
                        source: path.to_path_buf(),
                        page: Some(page as u32),
                    })
                    .collect(),
            ),
            Err(e) => LoadOutcome::Failed(e.to_string()),
        }
    }

    /// Load every file in order, logging each outcome.
    pub fn load_documents(&self, files: &[DiscoveredFile]) -> LoadReport {
        let mut report = LoadReport::default();

        for file in files {
            let name = file.file_name();
            let status = match self.load_file(&file.absolute_path, file.kind)
            {
                LoadOutcome::Loaded(docs) if !docs.is_empty() => {
                    let documents = docs.len();
                    tracing::debug!(file = %name, documents, "loaded");
                    report.documents.extend(docs);
                    FileStatus::Loaded { documents }
                }
                LoadOutcome::Loaded(_) => {
                    tracing::warn!("skipping {name}: no text extracted");
                    FileStatus::Skipped("no text extracted".to_string())
                }
                LoadOutcome::Skipped(reason) => {
                    tracing::warn!("skipping {name}: {reason}");
                    FileStatus::Skipped(reason)
                }
                LoadOutcome::Failed(reason) => {
                    tracing::warn!("failed to load {name}: {reason}");
                    FileStatus::Failed(reason)
                }
            };
            report.files.push((file.clone(), status));
        }

        report
    }
}

fn load_text(path: &Path) -> LoadOutcome {
    match std::fs::read_to_string(path) {
        Ok(text) => LoadOutcome::Loaded(vec![Document {
            text,
            source: path.to_path_buf(),
            page: None,
        }]),
        Err(e) => LoadOutcome::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Error, walker::discover_files};

    struct PagesExtractor(Vec<&'static str>);

    impl PdfExtractor for PagesExtractor {
        fn name(&self) -> &'static str {
            "pages"
        }

        fn extract_pages(&self, _path: &Path) -> crate::Result<Vec<String>> {
            Ok(self.0.iter().map(|p| p.to_string()).collect())
        }
    }

    struct BrokenExtractor;

    impl PdfExtractor for BrokenExtractor {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn extract_pages(&self, _path: &Path) -> crate::Result<Vec<String>> {
            Err(Error::Pdf("corrupt xref table".to_string()))
        }
    }

    #[test]
    fn text_file_is_one_document_without_page() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "Revenue grew 10% in Q1.").unwrap();

        let outcome = Loader::default().load_file(&path, FileKind::Text);
        assert_eq!(
            outcome,
            LoadOutcome::Loaded(vec![Document {
                text: "Revenue grew 10% in Q1.".to_string(),
                source: path,
                page: None,
            }])
        );
    }

    #[test]
    fn invalid_utf8_text_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("latin1.txt");
        std::fs::write(&path, [0x66, 0x6f, 0xff, 0xfe]).unwrap();

        let outcome = Loader::default().load_file(&path, FileKind::Text);
        assert!(matches!(outcome, LoadOutcome::Failed(_)));
    }

    #[test]
    fn pdf_with_bad_header_is_skipped_without_extracting() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fake.pdf");
        std::fs::write(&path, "this is actually text").unwrap();

        let loader = Loader::new(vec![Box::new(PagesExtractor(vec!["x"]))]);
        let outcome = loader.load_file(&path, FileKind::Pdf);
        assert!(matches!(outcome, LoadOutcome::Skipped(_)));
    }

    #[test]
    fn pdf_pages_become_documents() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("report.pdf");
        std::fs::write(&path, "%PDF-1.4 whatever").unwrap();

        let loader = Loader::new(vec![
            Box::new(BrokenExtractor),
            Box::new(PagesExtractor(vec!["first", "second"])),
        ]);
        let LoadOutcome::Loaded(docs) = loader.load_file(&path, FileKind::Pdf)
        else {
            panic!("expected loaded outcome");
        };
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].page, Some(0));
        assert_eq!(docs[1].page, Some(1));
        assert_eq!(docs[1].text, "second");
    }

    #[test]
    fn real_pdf_loads_one_document_per_page() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("revenue.pdf");
        std::fs::write(
            &path,
            crate::pdf::fixtures::one_page_pdf("Revenue grew in Q1"),
        )
        .unwrap();

        let LoadOutcome::Loaded(docs) =
            Loader::default().load_file(&path, FileKind::Pdf)
        else {
            panic!("expected loaded outcome");
        };
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].page, Some(0));
        assert_eq!(docs[0].source, path);
        assert!(docs[0].text.contains("Revenue grew in Q1"), "{docs:?}");
    }

    #[test]
    fn pdf_failing_every_extractor_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.pdf");
        std::fs::write(&path, "%PDF-1.4 garbage").unwrap();

        let loader = Loader::new(vec![Box::new(BrokenExtractor)]);
        let outcome = loader.load_file(&path, FileKind::Pdf);
        let LoadOutcome::Failed(reason) = outcome else {
            panic!("expected failure");
        };
        assert!(reason.contains("corrupt xref table"));
    }

    #[test]
    fn report_continues_past_bad_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "alpha").unwrap();
        std::fs::write(tmp.path().join("b.pdf"), "not a pdf").unwrap();
        std::fs::write(tmp.path().join("c.md"), "# gamma").unwrap();

        let files = discover_files(tmp.path()).unwrap();
        let report = Loader::default().load_documents(&files);

        assert_eq!(report.files.len(), 3);
        assert_eq!(report.files[0].1, FileStatus::Loaded { documents: 1 });
        assert!(matches!(report.files[1].1, FileStatus::Skipped(_)));
        assert_eq!(report.loaded_files(), 2);
        assert_eq!(report.skipped_files(), 1);
        let texts: Vec<_> =
            report.documents.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha", "# gamma"]);
    }

    #[test]
    fn all_skipped_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("only.pdf"), "nope").unwrap();

        let files = discover_files(tmp.path()).unwrap();
        let report = Loader::default().load_documents(&files);
        assert!(report.documents.is_empty());
        assert_eq!(report.skipped_files(), 1);
    }
}
