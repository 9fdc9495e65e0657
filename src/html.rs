//! Generated HTML and small formatting helpers: directory indexes,
//! error pages, HTTP dates, multipart boundaries and MIME lookup.

use chrono::{DateTime, Local, Utc};
use rand::Rng;
use std::io;
use std::path::Path;

const HEAD_FMT: &str = r#"<html><head><meta charset="UTF-8"><title>Index of {target}</title></head><body bgcolor="white"><h1>Index of {target}</h1><hr><pre>"#;
const TAIL_FMT: &str = "</pre><hr></body></html>";

/// Width of the name column in a directory listing.
const NAME_COLUMN: usize = 50;

/// Renders a directory index page for `path`, titled with the request
/// target. Directories list before files; within each group the
/// directory-iterator order is preserved.
pub fn format_dir_to_html(target: &str, path: &Path) -> io::Result<String> {
    let mut dir_rows = Vec::new();
    let mut file_rows = Vec::new();

    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(_) => continue,
        };
        let mtime = meta
            .modified()
            .map(format_listing_time)
            .unwrap_or_default();

        if meta.is_dir() {
            dir_rows.push(format_entry(&format!("{name}/"), &mtime, "-"));
        } else {
            let size = add_suffix(meta.len() as f64);
            file_rows.push(format_entry(&name, &mtime, &size));
        }
    }

    let head = HEAD_FMT.replace("{target}", target);
    let mut body = format_entry("../", "", "");
    for row in dir_rows.into_iter().chain(file_rows) {
        body.push_str(&row);
    }

    Ok(format!("{head}{body}{TAIL_FMT}"))
}

/// One `<a href>` row: name padded to the column width, then mtime and
/// size (or `-` for directories). Names wider than the column are
/// truncated with an HTML-escaped `..>` marker.
fn format_entry(name: &str, mtime: &str, size: &str) -> String {
    let mut shown = name.to_string();
    if shown.len() > NAME_COLUMN {
        let mut cut = NAME_COLUMN - 3;
        while !shown.is_char_boundary(cut) {
            cut -= 1;
        }
        shown.truncate(cut);
        shown.push_str("..&gt;");
    }
    let width = NAME_COLUMN.saturating_sub(shown.len());
    let space = " ".repeat(width);
    format!("<a href=\"{name}\">{shown}</a>{space} {mtime}       {size}\r\n")
}

fn format_listing_time(mtime: std::time::SystemTime) -> String {
    let dt: DateTime<Local> = mtime.into();
    dt.format("%m-%d-%Y %H:%M").to_string()
}

/// Human-readable size with a binary-unit suffix.
pub fn add_suffix(mut size: f64) -> String {
    for suffix in ["B", "K", "M", "G", "T"] {
        if size < 1024.0 {
            return if suffix == "B" {
                format!("{}{suffix}", size as u64)
            } else {
                format!("{size:.1}{suffix}")
            };
        }
        size /= 1024.0;
    }
    format!("{size:.1}P")
}

/// Minimal error page: the status and reason, then a centered server
/// identifier.
pub fn format_error_content(status: u16, reason: &str, server: &str) -> String {
    format!(
        r#"<html>
<head><title>{status} {reason}</title></head>
<body bgcolor="white">
<center><h1>{status} {reason}</h1></center>
<hr><center>{server}</center>
</body>
</html>"#
    )
}

/// Current time formatted for the `Date` response header (RFC 7231).
pub fn format_http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Boundary for server-generated multipart payloads: a millisecond
/// timestamp plus six random digits.
pub fn generate_boundary() -> String {
    let millis = Utc::now().timestamp_millis();
    let salt: u32 = rand::thread_rng().gen_range(100_000..=999_999);
    format!("----------------{millis}{salt}")
}

/// `Content-Type` guess from a file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("html") | Some("htm") => "text/html",
        Some("txt") => "text/plain",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        Some("mp4") => "video/mp4",
        Some("mp3") => "audio/mpeg",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}
