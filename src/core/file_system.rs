// src/core/file_system.rs

use chrono::Utc;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

/// Receipt file extensions the platform accepts.
pub const SUPPORTED_RECEIPT_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "pdf", "heic"];

pub struct FileSystem;

impl FileSystem {
    /// A pure existence check; validation treats any missing path as fatal
    /// for the claim.
    pub fn exists(path: &str) -> bool {
        Path::new(path).exists()
    }

    pub fn read(path: &str) -> Result<Vec<u8>, std::io::Error> {
        fs::read(path)
    }

    /// Content type for a receipt upload, inferred from the file extension.
    pub fn mime_type(path: &str) -> &'static str {
        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("pdf") => "application/pdf",
            Some("heic") => "image/heic",
            _ => "application/octet-stream",
        }
    }

    pub fn file_name(path: &str) -> String {
        Path::new(path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("receipt")
            .to_string()
    }

    fn is_supported_receipt_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                SUPPORTED_RECEIPT_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
    }

    /// All supported receipt files directly inside `directory`, sorted by
    /// file name for a stable processing order.
    pub fn receipt_files_in(directory: &str) -> Result<Vec<PathBuf>, Box<dyn Error>> {
        let dir = Path::new(directory);
        if !dir.exists() {
            return Err(format!("Directory '{}' does not exist.", directory).into());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && Self::is_supported_receipt_file(path))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Moves a processed receipt into `processed_dir`, creating it if needed.
    /// An existing file with the same name gets a UTC timestamp suffix rather
    /// than being overwritten.
    pub fn move_to_processed(source: &Path, processed_dir: &Path) -> Result<PathBuf, Box<dyn Error>> {
        if !processed_dir.exists() {
            fs::create_dir_all(processed_dir)?;
        }

        let file_name = source
            .file_name()
            .ok_or_else(|| format!("'{}' has no file name", source.display()))?;
        let mut destination = processed_dir.join(file_name);

        if destination.exists() {
            let timestamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
            let stem = source
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("receipt");
            let extension = source
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| format!(".{}", ext))
                .unwrap_or_default();
            destination = processed_dir.join(format!("{}-{}{}", stem, timestamp, extension));
        }

        fs::rename(source, &destination)?;
        Ok(destination)
    }
}
