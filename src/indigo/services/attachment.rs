//! Attachment staging and validation
//!
//! Files are validated (size, extension) and encoded as self-describing
//! data URIs before they enter the pipeline. Oversized attachments are
//! rejected here, before any store mutation.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::indigo::models::Attachment;

/// Maximum size of the encoded data URI, in bytes
pub const MAX_ENCODED_BYTES: usize = 4 * 1024 * 1024; // 4 MiB

pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "bmp", "pdf", "txt", "md",
];

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("attachment too large: {size} bytes encoded (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("unsupported file type: .{0}")]
    UnsupportedExtension(String),

    #[error("file has no extension")]
    NoExtension,

    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),
}

/// Read a file and stage it as a message attachment.
///
/// Validates the extension against the allow-list and rejects files whose
/// encoded form exceeds [`MAX_ENCODED_BYTES`]. The size check runs against
/// the encoded payload because that is what travels with the request.
pub fn stage_attachment(path: &Path) -> Result<Attachment, AttachmentError> {
    let ext = path
        .extension()
        .ok_or(AttachmentError::NoExtension)?
        .to_string_lossy()
        .to_lowercase();

    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(AttachmentError::UnsupportedExtension(ext));
    }

    let bytes = std::fs::read(path)?;
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    let data_uri = format!("data:{};base64,{}", mime_type, STANDARD.encode(&bytes));
    if data_uri.len() > MAX_ENCODED_BYTES {
        return Err(AttachmentError::TooLarge {
            size: data_uri.len(),
            max: MAX_ENCODED_BYTES,
        });
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Attachment {
        data_uri,
        name,
        mime_type,
    })
}
