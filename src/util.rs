//! Small helpers shared across the crate.

use std::any::Any;
use std::path::Path;

/// Build a `file://` URI for a filesystem path, percent-encoding everything
/// outside the RFC 3986 unreserved set (and `/`).
pub fn file_uri(path: &Path) -> String {
    let mut out = String::from("file://");
    for &b in path.to_string_lossy().as_bytes() {
        if is_uri_safe(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push_str(&format!("{:02X}", b));
        }
    }
    out
}

#[inline]
fn is_uri_safe(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~' | b'/')
}

/// Turn a caught panic payload into something printable.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn plain_paths_pass_through() {
        let p = PathBuf::from("/tmp/exports/photo.png");
        assert_eq!(file_uri(&p), "file:///tmp/exports/photo.png");
    }

    #[test]
    fn spaces_and_specials_are_encoded() {
        let p = PathBuf::from("/tmp/my files/report (1).txt");
        assert_eq!(
            file_uri(&p),
            "file:///tmp/my%20files/report%20%281%29.txt"
        );
    }
}
