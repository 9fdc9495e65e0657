//! Mount-point fallback: directory indexes and (ranged) file serving.

use crate::error::{Error, Result};
use crate::html;
use crate::http::ranges::{parse_ranges, RangeError};
use crate::http::request::Request;
use crate::http::response::Response;
use std::path::{Component, Path, PathBuf};

/// A URL-prefix to filesystem-root mapping consulted after every route
/// has failed to match.
#[derive(Debug, Clone)]
pub struct MountPoint {
    pub url_prefix: String,
    pub fs_root: PathBuf,
}

impl MountPoint {
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.url_prefix)
    }
}

/// Resolves a decoded request path against a mount point, refusing any
/// remainder that would escape the root after normalization.
pub fn resolve_mount_path(mount: &MountPoint, path: &str) -> Option<PathBuf> {
    let remainder = path.strip_prefix(&mount.url_prefix)?;

    let mut depth: usize = 0;
    let mut resolved = mount.fs_root.clone();
    for component in Path::new(remainder).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                resolved.pop();
                depth -= 1;
            }
            Component::CurDir | Component::RootDir => {}
            Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}

/// Serves `req.path` from `mount`: directories render an HTML index,
/// regular files honor a `Range` header, anything else is `404`.
pub async fn serve(req: &Request, resp: &mut Response, mount: &MountPoint) -> Result<()> {
    let target = resolve_mount_path(mount, &req.path)
        .ok_or_else(|| Error::BadRequest(format!("path escapes mount root: {}", req.path)))?;

    let meta = match tokio::fs::metadata(&target).await {
        Ok(meta) => meta,
        Err(_) => return Err(Error::NotFound),
    };

    if meta.is_dir() {
        let page = html::format_dir_to_html(&req.path, &target).map_err(|_| Error::NotFound)?;
        resp.set_string_content(page, "text/html");
        return Ok(());
    }
    if !meta.is_file() {
        return Err(Error::NotFound);
    }

    let ranges = match req.headers.get("Range") {
        Some(value) => parse_ranges(value, meta.len()).map_err(|e| match e {
            RangeError::Malformed => Error::BadRequest(format!("malformed range: {value}")),
            RangeError::Unsatisfiable => Error::RangeNotSatisfiable,
        })?,
        None => Vec::new(),
    };

    if ranges.is_empty() {
        resp.set_file_content(&target)?;
    } else {
        resp.set_file_content_ranges(&target, ranges)?;
    }
    Ok(())
}
