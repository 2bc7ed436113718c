//! Entries of a remote WebDAV namespace, as returned by a listing

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use crate::error::DavError;

/// Characters that must be escaped in a single path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ').add(b'"').add(b'#').add(b'%').add(b'<').add(b'>')
    .add(b'?').add(b'`').add(b'{').add(b'}').add(b'/')
    .add(b'(').add(b')').add(b'[').add(b']').add(b'^').add(b'|').add(b'\\');


/// A named entry of the remote namespace
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteNode {
    href: String,
    is_collection: bool,
    last_modified: Option<String>,
    content_length: Option<u64>,
}

impl RemoteNode {
    pub fn new(href: String, is_collection: bool, last_modified: Option<String>, content_length: Option<u64>) -> Self {
        Self { href: href_path(&href).into_owned(), is_collection, last_modified, content_length }
    }

    /// The server-relative path, percent-encoded as the server sent it
    pub fn href(&self) -> &str { &self.href }
    pub fn is_collection(&self) -> bool { self.is_collection }
    /// The raw `getlastmodified` property, if the server sent one
    pub fn last_modified(&self) -> Option<&str> { self.last_modified.as_deref() }
    pub fn content_length(&self) -> Option<u64> { self.content_length }

    /// The percent-decoded path of this node
    pub fn decoded_path(&self) -> Result<String, DavError> {
        decode_path(&self.href)
    }

    /// The last segment of the decoded path (e.g. `report (final).txt`)
    pub fn name(&self) -> Result<String, DavError> {
        // Split before decoding, an encoded `/` is part of the name
        let segment = self.href.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
        let name = decode_path(segment)?;
        if name.is_empty() {
            return Err(DavError::decode(format!("{} has no name", self.href)));
        }
        Ok(name)
    }

    /// Whether this node denotes the same collection as `other` (a percent-encoded path)
    pub fn is_same_path_as(&self, other: &str) -> Result<bool, DavError> {
        let mine = self.decoded_path()?;
        let theirs = decode_path(&href_path(other))?;
        Ok(mine.trim_end_matches('/') == theirs.trim_end_matches('/'))
    }

    /// The last modification time, if it was sent and can be parsed
    pub fn last_modified_at(&self) -> Option<DateTime<Utc>> {
        self.last_modified.as_deref().and_then(parse_timestamp)
    }
}


/// Percent-decode a server path
pub fn decode_path(encoded: &str) -> Result<String, DavError> {
    percent_decode_str(encoded)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|err| DavError::decode(format!("{} is not valid UTF-8 once decoded: {}", encoded, err)))
}

/// Percent-encode a single path segment (e.g. a file name)
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Some servers reply with absolute URLs rather than paths. Only keep the path part
fn href_path(href: &str) -> Cow<'_, str> {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        if let Ok(url) = Url::parse(href) {
            return Cow::Owned(url.path().to_string());
        }
    }
    Cow::Borrowed(href)
}

/// Parse a `getlastmodified` value
///
/// WebDAV servers send HTTP-dates (`Mon, 01 Jan 2024 10:00:00 GMT`), but RFC 3339 and plain dates are accepted too.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}



#[cfg(test)]
mod test {
    use super::*;

    fn file(href: &str) -> RemoteNode {
        RemoteNode::new(href.to_string(), false, None, None)
    }

    #[test]
    fn decodes_names() {
        let node = file("/remote.php/dav/files/anchor/Collectives/report%20%28final%29.txt");
        assert_eq!(node.name().unwrap(), "report (final).txt");

        let dir = RemoteNode::new("/remote.php/dav/files/anchor/Collectives/Sub%20dir/".to_string(), true, None, None);
        assert_eq!(dir.name().unwrap(), "Sub dir");

        let bad = file("/files/%FF%FE");
        assert!(matches!(bad.name(), Err(DavError::DecodeFailed { .. })));
    }

    #[test]
    fn absolute_hrefs_are_reduced_to_paths() {
        let node = file("https://cloud.example.com/remote.php/dav/files/anchor/a.txt");
        assert_eq!(node.href(), "/remote.php/dav/files/anchor/a.txt");
    }

    #[test]
    fn same_path_ignores_encoding_and_trailing_slash() {
        let node = RemoteNode::new("/dav/My%20Folder/".to_string(), true, None, None);
        assert!(node.is_same_path_as("/dav/My Folder").unwrap());
        assert!(node.is_same_path_as("/dav/My%20Folder/").unwrap());
        assert!(node.is_same_path_as("/dav/My%20Folder/child/").unwrap() == false);
    }

    #[test]
    fn timestamps() {
        let http = parse_timestamp("Mon, 01 Jan 2024 10:00:00 GMT").unwrap();
        let rfc3339 = parse_timestamp("2024-01-01T10:00:00Z").unwrap();
        assert_eq!(http, rfc3339);

        let day = parse_timestamp("2024-03-01").unwrap();
        assert!(day > http);
        assert!(parse_timestamp("yesterday").is_none());

        // Lexicographic order of HTTP-dates is not chronological
        let feb = parse_timestamp("Thu, 01 Feb 2024 00:00:00 GMT").unwrap();
        let jan = parse_timestamp("Wed, 31 Jan 2024 00:00:00 GMT").unwrap();
        assert!(jan < feb);
    }

    #[test]
    fn encodes_segments() {
        assert_eq!(encode_segment("report (final).txt"), "report%20%28final%29.txt");
        assert_eq!(encode_segment("a/b"), "a%2Fb");
    }
}
