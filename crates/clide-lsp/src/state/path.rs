use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use tower_lsp::lsp_types::Url;

/// Maps a `file:` URI to a filesystem path.
///
/// Falls back to percent-decoding the raw path for URIs `Url` refuses to
/// convert (unusual hosts, malformed escapes).
pub(crate) fn uri_to_path(uri: &Url) -> Option<PathBuf> {
    if let Ok(path) = uri.to_file_path() {
        return Some(path);
    }
    if uri.scheme() != "file" {
        return None;
    }
    let raw_path = uri.path();
    if raw_path.is_empty() {
        return None;
    }
    let decoded = percent_decode_str(raw_path).decode_utf8_lossy();
    tracing::debug!("uri_to_path decoded {} to {}", uri, decoded);
    Some(PathBuf::from(decoded.as_ref()))
}

pub(crate) fn path_to_uri(path: &Path) -> Option<Url> {
    Url::from_file_path(path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn file_uris_map_to_paths() {
        let uri = Url::parse("file:///src/my%20app/main.cpp").expect("uri");
        assert_eq!(
            uri_to_path(&uri),
            Some(PathBuf::from("/src/my app/main.cpp"))
        );
    }

    #[test]
    fn non_file_uris_have_no_path() {
        let uri = Url::parse("untitled:Untitled-1").expect("uri");
        assert_eq!(uri_to_path(&uri), None);
    }

    #[cfg(unix)]
    #[test]
    fn paths_round_trip_through_uris() {
        let path = Path::new("/src/main.cpp");
        let uri = path_to_uri(path).expect("uri");
        assert_eq!(uri.as_str(), "file:///src/main.cpp");
        assert_eq!(uri_to_path(&uri).as_deref(), Some(path));
    }
}
