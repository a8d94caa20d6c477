// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Upload validation.
//!
//! Runs before any durable write: a rejected file never produces a staging
//! record or stored bytes.

use crate::error::IngestError;
use crate::models::FileType;

/// Longest filename kept on a staging record.
const MAX_FILENAME_LEN: usize = 255;
/// Longest suffix kept intact when a long filename is shortened.
const MAX_EXTENSION_LEN: usize = 16;

/// A file received from the client.
#[derive(Debug, Clone)]
pub struct FileUpload {
    /// Client-declared filename (path components stripped)
    pub filename: String,
    /// Client-declared content type, if any
    pub content_type: Option<String>,
    pub data: Vec<u8>,
    /// Bytes seen on the wire. May exceed `data.len()` when reading stopped
    /// at the size cap.
    pub size_bytes: u64,
}

impl FileUpload {
    pub fn new(filename: &str, content_type: Option<String>, data: Vec<u8>) -> Self {
        let size_bytes = data.len() as u64;
        Self {
            filename: clean_filename(filename),
            content_type,
            data,
            size_bytes,
        }
    }

    /// Extension without the dot, as the client wrote it.
    pub fn extension(&self) -> Option<&str> {
        let (stem, ext) = self.filename.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext)
    }
}

/// Check an upload and resolve its format.
///
/// Checks run in a fixed order: presence, size cap, emptiness, then type.
pub fn validate_upload(
    upload: Option<&FileUpload>,
    max_bytes: u64,
) -> Result<FileType, IngestError> {
    let upload = upload.ok_or(IngestError::MissingFile)?;

    if upload.size_bytes > max_bytes {
        return Err(IngestError::FileTooLarge {
            size: upload.size_bytes,
            max: max_bytes,
        });
    }

    if upload.size_bytes == 0 {
        return Err(IngestError::EmptyFile);
    }

    resolve_file_type(upload).ok_or_else(|| {
        let declared = upload
            .extension()
            .map(|ext| format!(".{}", ext))
            .or_else(|| upload.content_type.clone())
            .unwrap_or_else(|| "unknown".to_string());
        IngestError::UnsupportedFileType(format!(
            "{} (accepted: .tcx, .gpx, .fit)",
            declared
        ))
    })
}

fn resolve_file_type(upload: &FileUpload) -> Option<FileType> {
    upload
        .extension()
        .and_then(FileType::from_extension)
        .or_else(|| {
            upload
                .content_type
                .as_deref()
                .and_then(FileType::from_content_type)
        })
}

/// Strip directories and control characters from a client filename.
///
/// Overlong names are shortened in the stem so the extension survives.
fn clean_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let cleaned = shorten(cleaned.trim());
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

fn shorten(name: &str) -> String {
    if name.chars().count() <= MAX_FILENAME_LEN {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && !ext.is_empty() && ext.chars().count() <= MAX_EXTENSION_LEN =>
        {
            let keep = MAX_FILENAME_LEN - ext.chars().count() - 1;
            let stem: String = stem.chars().take(keep).collect();
            format!("{}.{}", stem, ext)
        }
        _ => name.chars().take(MAX_FILENAME_LEN).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u64 = 1024;

    fn upload(name: &str, content_type: Option<&str>, size: usize) -> FileUpload {
        FileUpload::new(name, content_type.map(str::to_string), vec![b'x'; size])
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            validate_upload(None, MAX),
            Err(IngestError::MissingFile)
        ));
    }

    #[test]
    fn test_size_is_checked_before_type() {
        let file = upload("huge.bin", None, 2048);
        assert!(matches!(
            validate_upload(Some(&file), MAX),
            Err(IngestError::FileTooLarge { size: 2048, max: MAX })
        ));
    }

    #[test]
    fn test_truncated_read_reports_wire_size() {
        let mut file = upload("ride.fit", None, 10);
        file.size_bytes = MAX + 1;
        assert!(matches!(
            validate_upload(Some(&file), MAX),
            Err(IngestError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn test_empty_file() {
        let file = upload("run.gpx", None, 0);
        assert!(matches!(
            validate_upload(Some(&file), MAX),
            Err(IngestError::EmptyFile)
        ));
    }

    #[test]
    fn test_extension_resolves_format() {
        assert_eq!(
            validate_upload(Some(&upload("Morning.TCX", None, 5)), MAX).unwrap(),
            FileType::Tcx
        );
        assert_eq!(
            validate_upload(Some(&upload("a.b.gpx", None, 5)), MAX).unwrap(),
            FileType::Gpx
        );
    }

    #[test]
    fn test_content_type_fallback() {
        let file = upload("activity", Some("application/vnd.ant.fit"), 5);
        assert_eq!(validate_upload(Some(&file), MAX).unwrap(), FileType::Fit);
    }

    #[test]
    fn test_generic_content_type_is_rejected() {
        let file = upload("activity.bin", Some("application/octet-stream"), 5);
        let err = validate_upload(Some(&file), MAX).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFileType(ref m) if m.starts_with(".bin")));
    }

    #[test]
    fn test_hidden_file_has_no_extension() {
        let file = upload(".fit", None, 5);
        assert!(matches!(
            validate_upload(Some(&file), MAX),
            Err(IngestError::UnsupportedFileType(_))
        ));
    }

    #[test]
    fn test_filename_is_cleaned() {
        let file = upload("../../etc/ride\n.fit", None, 5);
        assert_eq!(file.filename, "ride.fit");
        assert_eq!(upload("dir\\", None, 1).filename, "upload");
    }

    #[test]
    fn test_long_filename_keeps_extension() {
        let file = upload(&format!("{}.fit", "a".repeat(300)), None, 5);
        assert_eq!(file.filename.chars().count(), MAX_FILENAME_LEN);
        assert!(file.filename.ends_with("aaa.fit"));
        assert_eq!(validate_upload(Some(&file), MAX).unwrap(), FileType::Fit);

        let no_ext = upload(&"b".repeat(300), None, 5);
        assert_eq!(no_ext.filename.chars().count(), MAX_FILENAME_LEN);
    }

    #[test]
    fn test_extension_keeps_client_case() {
        assert_eq!(upload("Morning.TCX", None, 1).extension(), Some("TCX"));
        assert_eq!(upload("noext", None, 1).extension(), None);
    }
}
