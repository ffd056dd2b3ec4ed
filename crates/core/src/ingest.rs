use crate::error::{QaError, Result};
use crate::models::FileRef;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Recursively find PDF files under a folder, sorted for stable
/// registration order.
pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Build a file reference for a PDF that already sits on durable storage.
pub fn file_ref_for(path: &Path) -> Result<FileRef> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            QaError::Validation(format!("path missing filename: {}", path.display()))
        })?;
    let metadata = fs::metadata(path)?;

    Ok(FileRef {
        file_key: path.to_string_lossy().to_string(),
        file_name: name.to_string(),
        mime_type: "application/pdf".to_string(),
        file_size: metadata.len(),
    })
}
