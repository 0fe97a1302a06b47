//! Server-side include expansion.
//!
//! Replaces each `<!--#include virtual="REF"-->` marker in a document with
//! the raw bytes of the file REF names. Absolute references are resolved
//! against the document root, relative ones against the including
//! document's directory. Included content is inserted verbatim and is not
//! scanned again. A reference that cannot be read is replaced by an inline
//! error message; only an unreadable document fails the whole call.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::bytes::Regex;

/// Extension of documents that go through [`expand`].
pub const INCLUDE_EXTENSION: &str = "shtml";

static INCLUDE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<!--#include virtual="([^"\n]*)"-->"#).expect("include marker pattern is valid")
});

#[must_use]
pub fn is_include_document(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(INCLUDE_EXTENSION))
}

/// Where an include reference points for a document in `document_dir`.
#[must_use]
pub fn resolve_reference(root: &Path, document_dir: &Path, reference: &str) -> PathBuf {
    match reference.strip_prefix('/') {
        Some(rooted) => root.join(rooted),
        None => document_dir.join(reference),
    }
}

pub async fn expand(root: &Path, document: &Path) -> std::io::Result<Vec<u8>> {
    let source = tokio::fs::read(document).await?;
    let document_dir = document.parent().unwrap_or_else(|| Path::new(""));

    // Collected up front: the regex match iterator is not held across awaits.
    let markers: Vec<(Range<usize>, PathBuf)> = INCLUDE_MARKER
        .captures_iter(&source)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let reference = String::from_utf8_lossy(caps.get(1)?.as_bytes()).into_owned();
            Some((
                whole.range(),
                resolve_reference(root, document_dir, &reference),
            ))
        })
        .collect();

    if markers.is_empty() {
        return Ok(source);
    }

    let mut out = Vec::with_capacity(source.len());
    let mut last = 0;
    for (range, included) in markers {
        out.extend_from_slice(&source[last..range.start]);
        match tokio::fs::read(&included).await {
            Ok(bytes) => out.extend_from_slice(&bytes),
            Err(e) => {
                tracing::debug!(document = %document.display(), include = %included.display(), error = %e, "include failed");
                out.extend_from_slice(
                    format!("Error including {}: {e}", included.display()).as_bytes(),
                );
            }
        }
        last = range.end;
    }
    out.extend_from_slice(&source[last..]);
    Ok(out)
}
