//! Canonical path helpers (spec §3: "Canonical path").
//!
//! A canonical path is a slash-delimited, percent-decoded string beginning
//! with `/`, never containing the backend URL prefix. Directories end with
//! `/`; files do not.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Leaves `/` untouched but percent-encodes everything else that isn't
/// already safe in an HTTP path segment, matching spec §4.1's "path
/// percent-encoded keeping `/` safe".
const PATH_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'%');

/// Strips the backend's origin+path prefix from a raw backend `href`,
/// producing a canonical path. Tries the full `backend_base` first, then
/// falls back to just the backend URL's path component (spec §4.2).
pub fn canonicalize(raw_href: &str, backend_base: &str, backend_path: &str) -> String {
    let decoded = percent_decode(raw_href);
    let stripped = if let Some(rest) = decoded.strip_prefix(backend_base) {
        rest
    } else if backend_path != "/" {
        decoded.strip_prefix(backend_path).unwrap_or(&decoded)
    } else {
        &decoded
    };
    if stripped.starts_with('/') {
        stripped.to_string()
    } else {
        format!("/{stripped}")
    }
}

pub fn percent_decode(s: &str) -> String {
    percent_encoding::percent_decode_str(s)
        .decode_utf8_lossy()
        .into_owned()
}

/// Encodes a canonical path for inclusion in an outbound backend URL,
/// keeping `/` as a path separator.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|seg| utf8_percent_encode(seg, PATH_UNSAFE).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Composes `backend_base + "/" + path_without_leading_slash`, percent
/// encoding the path, as spec §4.1 requires.
pub fn backend_url(backend_base: &str, path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        return backend_base.to_string();
    }
    format!("{backend_base}/{}", encode_path(trimmed))
}

/// The parent directory of a canonical path, always ending in `/`.
/// `parent("/a/b.txt") == "/a/"`, `parent("/a/") == "/"`, `parent("/") == "/"`.
pub fn parent(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => format!("{}/", &trimmed[..idx]),
        None => "/".to_string(),
    }
}

/// The last path segment (file name, or directory name without the
/// trailing slash).
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

pub fn is_collection_path(path: &str) -> bool {
    path.ends_with('/')
}

/// Joins a bare child name (as returned by `Provider::list_members`, e.g.
/// `"b.txt"` or `"sub/"`) onto a directory path that already ends in `/`.
pub fn join_member(dir: &str, name: &str) -> String {
    format!("{dir}{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_full_backend_base() {
        let got = canonicalize(
            "http://backend.example/webdav/a/file.bin",
            "http://backend.example/webdav",
            "/webdav",
        );
        assert_eq!(got, "/a/file.bin");
    }

    #[test]
    fn strips_path_only_when_base_mismatches() {
        let got = canonicalize(
            "/webdav/a/file.bin",
            "http://backend.example/webdav",
            "/webdav",
        );
        assert_eq!(got, "/a/file.bin");
    }

    #[test]
    fn percent_decodes_href() {
        let got = canonicalize(
            "http://backend.example/webdav/a%20b.txt",
            "http://backend.example/webdav",
            "/webdav",
        );
        assert_eq!(got, "/a b.txt");
    }

    #[test]
    fn parent_of_file_is_directory() {
        assert_eq!(parent("/a/b/file.bin"), "/a/b/");
        assert_eq!(parent("/a/"), "/");
        assert_eq!(parent("/"), "/");
    }

    #[test]
    fn basename_strips_trailing_slash() {
        assert_eq!(basename("/a/b/"), "b");
        assert_eq!(basename("/a/b.txt"), "b.txt");
    }

    #[test]
    fn backend_url_joins_and_encodes() {
        assert_eq!(
            backend_url("http://backend.example/webdav", "/a b/file.bin"),
            "http://backend.example/webdav/a%20b/file.bin"
        );
    }
}
