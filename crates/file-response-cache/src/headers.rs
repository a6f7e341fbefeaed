//! `Name: Value` line codec for header multi-maps

use http::header::{HeaderMap, HeaderName, HeaderValue};

const SEPARATOR: &[u8] = b": ";

/// Serialize headers as one `Name: Value` line per value.
///
/// Multiple values for a name become multiple lines, in insertion order.
pub fn encode_headers(headers: &HeaderMap) -> Vec<u8> {
    let mut buf = Vec::new();
    for (name, value) in headers {
        buf.extend_from_slice(name.as_str().as_bytes());
        buf.extend_from_slice(SEPARATOR);
        buf.extend_from_slice(value.as_bytes());
        buf.push(b'\n');
    }
    buf
}

/// Parse the output of [`encode_headers`].
///
/// Blank lines are skipped. Returns `None` if any other line lacks the
/// `": "` separator or holds an invalid header name or value.
pub fn decode_headers(data: &[u8]) -> Option<HeaderMap> {
    let mut headers = HeaderMap::new();

    for line in data.split(|b| *b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            continue;
        }

        let split = line
            .windows(SEPARATOR.len())
            .position(|window| window == SEPARATOR)?;
        let name = HeaderName::from_bytes(&line[..split]).ok()?;
        let value = HeaderValue::from_bytes(&line[split + SEPARATOR.len()..]).ok()?;
        headers.append(name, value);
    }

    Some(headers)
}
