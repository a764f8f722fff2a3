//! Utility functions for file naming and output paths

use crate::config::FileCollisionAction;
use crate::error::DownloadError;
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Name used when the server supplies nothing usable
const FALLBACK_FILENAME: &str = "document";

/// Get a unique path for a file, handling collisions according to the specified action
///
/// For Rename, `letter.docx` becomes `letter (1).docx`, then `letter (2).docx`, etc.
/// For Skip, an existing file is reported as [`DownloadError::Collision`].
/// For Overwrite, the original path is returned unchanged.
///
/// # Examples
///
/// ```
/// use jobsai_client::utils::get_unique_path;
/// use jobsai_client::config::FileCollisionAction;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/jobsai-doc-test/cover_letter.docx");
/// let unique = get_unique_path(path, FileCollisionAction::Rename).unwrap();
/// assert_eq!(unique, path);
/// ```
pub fn get_unique_path(path: &Path, action: FileCollisionAction) -> Result<PathBuf, DownloadError> {
    let display_name = || {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    };

    match action {
        FileCollisionAction::Overwrite => Ok(path.to_path_buf()),
        FileCollisionAction::Skip => {
            if path.exists() {
                return Err(DownloadError::Collision {
                    filename: display_name(),
                });
            }
            Ok(path.to_path_buf())
        }
        FileCollisionAction::Rename => {
            if !path.exists() {
                return Ok(path.to_path_buf());
            }

            let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
                DownloadError::Save {
                    filename: display_name(),
                    message: "cannot extract file stem".to_string(),
                }
            })?;
            let extension = path.extension().and_then(|e| e.to_str());
            let parent = path.parent().unwrap_or_else(|| Path::new(""));

            for i in 1..=MAX_RENAME_ATTEMPTS {
                let new_name = match extension {
                    Some(ext) => format!("{} ({}).{}", stem, i, ext),
                    None => format!("{} ({})", stem, i),
                };
                let new_path = parent.join(new_name);
                if !new_path.exists() {
                    return Ok(new_path);
                }
            }

            Err(DownloadError::Collision {
                filename: display_name(),
            })
        }
    }
}

/// Reduce a server-supplied name to a single safe path component
///
/// Directory parts are dropped so a name like `../../etc/passwd` cannot
/// escape the download directory.
///
/// # Examples
///
/// ```
/// use jobsai_client::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("../../letter.docx"), "letter.docx");
/// assert_eq!(sanitize_filename("a:b?.docx"), "a_b_.docx");
/// assert_eq!(sanitize_filename(".."), "document");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = last
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned
    }
}

/// Extract a filename from an HTTP response
///
/// Tries the Content-Disposition header first (`filename=` and RFC 5987
/// `filename*=`), then the last segment of the URL path. The extension is kept.
///
/// # Examples
///
/// ```ignore
/// let response = reqwest::get("https://example.com/letters/cover_letter.docx").await?;
/// let name = extract_filename_from_response(&response, "https://example.com/letters/cover_letter.docx");
/// // Returns Some("cover_letter.docx")
/// ```
pub fn extract_filename_from_response(response: &reqwest::Response, url: &str) -> Option<String> {
    if let Some(content_disposition) = response.headers().get(reqwest::header::CONTENT_DISPOSITION)
        && let Ok(value) = content_disposition.to_str()
        && let Some(name) = filename_from_content_disposition(value)
    {
        return Some(name);
    }

    if let Ok(parsed_url) = url::Url::parse(url)
        && let Some(mut segments) = parsed_url.path_segments()
        && let Some(last_segment) = segments.next_back()
        && !last_segment.is_empty()
    {
        return urlencoding::decode(last_segment)
            .map(|decoded| decoded.into_owned())
            .ok();
    }

    None
}

/// Parse the filename out of a Content-Disposition header value
///
/// `filename*=` (RFC 5987, percent-encoded) wins over plain `filename=`.
pub fn filename_from_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    for part in value.split(';') {
        let part = part.trim();
        if let Some(encoded) = part.strip_prefix("filename*=") {
            // Format is: charset'lang'encoded-filename
            if let Some(idx) = encoded.rfind('\'')
                && let Ok(decoded) = urlencoding::decode(&encoded[idx + 1..])
                && !decoded.is_empty()
            {
                return Some(decoded.into_owned());
            }
        } else if let Some(name) = part.strip_prefix("filename=") {
            let name = name.trim_matches('"');
            if !name.is_empty() {
                plain = Some(name.to_string());
            }
        }
    }
    plain
}
