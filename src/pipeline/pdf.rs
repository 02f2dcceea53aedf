//! PDF I/O via pdfium: read page text, write split documents.
//!
//! pdfium keeps thread-local state and blocks, so every public function here
//! moves its work onto `tokio::task::spawn_blocking` and binds its own
//! library handle there.

use crate::error::ResumeParserError;
use crate::splitter::{CandidatePageRun, PageText};
use crate::text::join_pages;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn bind() -> Result<Pdfium, ResumeParserError> {
    pdfium_auto::bind_pdfium_silent().map_err(|e| ResumeParserError::PdfiumBindingFailed(e.to_string()))
}

fn corrupt(path: &Path, e: PdfiumError) -> ResumeParserError {
    ResumeParserError::CorruptPdf {
        path: path.to_path_buf(),
        detail: format!("{e:?}"),
    }
}

/// Extract the raw text of every page, in order.
pub async fn read_pages(pdf_path: &Path) -> Result<Vec<PageText>, ResumeParserError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || read_pages_blocking(&path))
        .await
        .map_err(|e| ResumeParserError::Internal(format!("Read task panicked: {e}")))?
}

fn read_pages_blocking(pdf_path: &Path) -> Result<Vec<PageText>, ResumeParserError> {
    let pdfium = bind()?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| corrupt(pdf_path, e))?;

    let mut pages = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let text = page.text().map_err(|e| corrupt(pdf_path, e))?.all();
        pages.push(PageText::new(index, text));
    }

    info!("{}: {} pages", pdf_path.display(), pages.len());
    Ok(pages)
}

/// Full normalised text of a single resume PDF.
pub async fn read_resume_text(pdf_path: &Path) -> Result<String, ResumeParserError> {
    let pages = read_pages(pdf_path).await?;
    Ok(join_pages(pages.iter().map(|p| p.text.as_str())))
}

/// Write each run as `<out_dir>/<identifier>.pdf`, copying its pages from
/// `source` in order. Returns the written paths.
///
/// Each file is saved as `<identifier>.pdf.tmp` and renamed, so a crash never
/// leaves a partial `.pdf` behind.
pub async fn write_runs(
    source: &Path,
    runs: &[CandidatePageRun],
    out_dir: &Path,
) -> Result<Vec<PathBuf>, ResumeParserError> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| ResumeParserError::OutputWriteFailed {
            path: out_dir.to_path_buf(),
            source: e,
        })?;

    let source = source.to_path_buf();
    let out_dir = out_dir.to_path_buf();
    let jobs: Vec<(String, Vec<usize>)> = runs
        .iter()
        .map(|r| (r.file_name(), r.page_indices()))
        .collect();

    tokio::task::spawn_blocking(move || write_runs_blocking(&source, &jobs, &out_dir))
        .await
        .map_err(|e| ResumeParserError::Internal(format!("Write task panicked: {e}")))?
}

fn write_runs_blocking(
    source: &Path,
    jobs: &[(String, Vec<usize>)],
    out_dir: &Path,
) -> Result<Vec<PathBuf>, ResumeParserError> {
    let pdfium = bind()?;
    let src = pdfium
        .load_pdf_from_file(source, None)
        .map_err(|e| corrupt(source, e))?;

    let mut written = Vec::with_capacity(jobs.len());
    for (file_name, indices) in jobs {
        let final_path = out_dir.join(file_name);
        let tmp_path = temp_path_for(&final_path);

        let mut doc = pdfium.create_new_pdf().map_err(|e| corrupt(source, e))?;
        for (dest, &idx) in indices.iter().enumerate() {
            doc.pages_mut()
                .copy_page_from_document(&src, idx as PdfPageIndex, dest as PdfPageIndex)
                .map_err(|e| corrupt(source, e))?;
        }

        doc.save_to_file(&tmp_path)
            .map_err(|e| ResumeParserError::OutputWriteFailed {
                path: final_path.clone(),
                source: std::io::Error::other(format!("{e:?}")),
            })?;
        std::fs::rename(&tmp_path, &final_path).map_err(|e| ResumeParserError::OutputWriteFailed {
            path: final_path.clone(),
            source: e,
        })?;

        debug!("Wrote {} ({} pages)", final_path.display(), indices.len());
        written.push(final_path);
    }

    Ok(written)
}

/// `<id>.pdf` → `<id>.pdf.tmp`; the suffix keeps it out of `*.pdf` counts.
fn temp_path_for(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_is_not_a_pdf() {
        let tmp = temp_path_for(Path::new("out/pdfs/221CS101.pdf"));
        assert_eq!(tmp, PathBuf::from("out/pdfs/221CS101.pdf.tmp"));
        assert_ne!(tmp.extension().and_then(|e| e.to_str()), Some("pdf"));
    }
}
