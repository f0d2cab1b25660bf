//! Blob name resolution shared by the storage adapters

use percent_encoding::percent_decode_str;
use reqwest::Url;

/// Blob name of `remote_url` inside `container`
///
/// Accepts full URLs (`https://host/<container>/<blob>`), container-relative
/// paths (`<container>/<blob>`) and bare blob names. Query strings and
/// fragments are dropped and every path segment is percent-decoded. Returns
/// `None` when no blob name remains or when a segment would climb out of the
/// container.
pub fn blob_name(container: &str, remote_url: &str) -> Option<String> {
    let segments: Vec<String> = match Url::parse(remote_url) {
        Ok(url) => url.path_segments()?.map(decode_segment).collect::<Option<_>>()?,
        // Relative references have no scheme to parse against
        Err(_) => {
            let path = remote_url.split(['?', '#']).next().unwrap_or_default();
            path.split('/').map(decode_segment).collect::<Option<_>>()?
        }
    };

    let mut segments: Vec<String> = segments.into_iter().filter(|s| !s.is_empty()).collect();
    if segments.first().is_some_and(|first| first == container) {
        segments.remove(0);
    }

    if segments.is_empty() || segments.iter().any(|s| !is_plain_segment(s)) {
        return None;
    }

    Some(segments.join("/"))
}

fn decode_segment(segment: &str) -> Option<String> {
    percent_decode_str(segment).decode_utf8().ok().map(|decoded| decoded.into_owned())
}

/// A decoded segment that names exactly one path component
fn is_plain_segment(segment: &str) -> bool {
    segment != "." && segment != ".." && !segment.contains(['/', '\\'])
}
