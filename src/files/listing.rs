//! Directory listing for serve-files routes that allow it.

use std::path::Path;

use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use html_escape::{encode_double_quoted_attribute, encode_text};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::response::internal_error;

/// Characters escaped in listing links; `/` is kept so directories stay
/// relative links.
const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub async fn render(dir: &Path) -> Response {
    let names = match entry_names(dir).await {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to read directory");
            return internal_error();
        }
    };

    let mut response = page(&names).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

/// Sorted entry names, directories suffixed with `/`.
pub async fn entry_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

#[must_use]
pub fn page(names: &[String]) -> String {
    let mut out = String::from("<pre>\n");
    for name in names {
        let href = utf8_percent_encode(name, HREF).to_string();
        out.push_str(&format!(
            "<a href=\"{}\">{}</a>\n",
            encode_double_quoted_attribute(&href),
            encode_text(name)
        ));
    }
    out.push_str("</pre>\n");
    out
}
