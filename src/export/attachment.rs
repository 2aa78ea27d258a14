//! Write decoded attachments to disk.

use std::path::{Path, PathBuf};

use crate::api::Transport;
use crate::model::message::Message;
use crate::model::part::{Attachment, Decomposition};
use crate::store::MessageStore;

/// Longest file name produced for a single attachment.
const MAX_FILENAME_LEN: usize = 150;

/// Write one attachment into `output_dir`, never overwriting an existing file.
///
/// Unnamed attachments are called `attachment-{index}`, with an extension
/// taken from the media subtype when it looks like one.
pub fn save_attachment(
    attachment: &Attachment,
    index: usize,
    output_dir: &Path,
) -> anyhow::Result<PathBuf> {
    let filename = if attachment.filename.trim().is_empty() {
        fallback_name(attachment, index)
    } else {
        sanitize_filename_part(&attachment.filename, MAX_FILENAME_LEN)
    };

    let path = unique_path(&output_dir.join(filename));
    std::fs::write(&path, &attachment.content)?;
    tracing::debug!(
        path = %path.display(),
        size = attachment.content.len(),
        "Saved attachment"
    );
    Ok(path)
}

/// Write every attachment of a decomposition into `output_dir`.
///
/// A failed write is logged and skipped.
pub fn save_all(decomposition: &Decomposition, output_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    save_each(&decomposition.attachments, output_dir)
}

/// Fetch a message through the store and save its attachments into a
/// per-message folder: `{output_dir}/{date}_{id}_{subject}/`.
pub fn export_message_attachments<T: Transport>(
    store: &mut MessageStore<T>,
    id: &str,
    output_dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    let message = store.get_message(id)?;
    if message.attachments.is_empty() {
        return Ok(Vec::new());
    }
    let folder = output_dir.join(message_folder_name(&message));
    save_each(&message.attachments, &folder)
}

fn save_each(attachments: &[Attachment], output_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut paths = Vec::new();

    for (i, att) in attachments.iter().enumerate() {
        match save_attachment(att, i + 1, output_dir) {
            Ok(path) => paths.push(path),
            Err(e) => {
                tracing::warn!(
                    filename = %att.filename,
                    error = %e,
                    "Failed to export attachment"
                );
            }
        }
    }

    Ok(paths)
}

fn fallback_name(attachment: &Attachment, index: usize) -> String {
    let subtype = attachment
        .media_type
        .split_once('/')
        .map(|(_, sub)| sub)
        .unwrap_or("");
    if !subtype.is_empty() && subtype.len() <= 8 && subtype.chars().all(|c| c.is_ascii_alphanumeric()) {
        format!("attachment-{index}.{subtype}")
    } else {
        format!("attachment-{index}")
    }
}

fn message_folder_name(message: &Message) -> String {
    let date = message.created_at.format("%Y%m%d_%H%M%S");
    let subject = sanitize_filename_part(&message.subject, 60);
    format!("{date}_{}_{subject}", sanitize_filename_part(&message.id, 20))
}

/// Replace anything but alphanumerics and `-._@` with `_`, truncate to
/// `max_len` characters and never start with a dot.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '@' {
                c
            } else {
                '_'
            }
        })
        .skip_while(|&c| c == '.')
        .take(max_len)
        .collect();

    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

/// If `path` already exists, append a counter to make it unique.
fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    (1..)
        .map(|i| {
            if ext.is_empty() {
                parent.join(format!("{stem}_{i}"))
            } else {
                parent.join(format!("{stem}_{i}.{ext}"))
            }
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}
