use crate::error::{Error, ParseErrorKind};

/// Largest accepted request body (an SDP announcement).
pub const MAX_BODY_SIZE: usize = 128 * 1024;

/// A parsed RTSP request (RFC 2326 §6).
///
/// RTSP requests follow HTTP/1.1 syntax:
///
/// ```text
/// Method SP Request-URI SP RTSP-Version CRLF
/// *(Header: Value CRLF)
/// CRLF
/// [body]
/// ```
///
/// Header lookup is case-insensitive per RFC 2326 §4.2. The head is parsed
/// by [`parse`](Self::parse); the connection reads
/// [`content_length`](Self::content_length) bytes afterwards and stores them
/// in [`body`](Self::body).
#[derive(Debug)]
pub struct RtspRequest {
    /// RTSP method (OPTIONS, ANNOUNCE, SETUP, RECORD, etc.).
    pub method: String,
    /// Request-URI (e.g. `rtsp://host:port/stream/trackID=0`).
    pub uri: String,
    /// Protocol version (expected: `RTSP/1.0`).
    pub version: String,
    /// Headers as ordered (name, value) pairs. Names are stored as-received;
    /// lookups via [`get_header`](Self::get_header) are case-insensitive.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RtspRequest {
    /// Parse the head of an RTSP request.
    ///
    /// Expects the request line, headers, and trailing blank line. Returns
    /// [`Error::Parse`] on malformed input.
    pub fn parse(raw: &str) -> crate::error::Result<Self> {
        let mut lines = raw.lines();

        let request_line = lines.next().ok_or(Error::Parse {
            kind: ParseErrorKind::EmptyRequest,
        })?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();

        if parts.len() != 3 {
            return Err(Error::Parse {
                kind: ParseErrorKind::InvalidRequestLine,
            });
        }

        let method = parts[0].to_string();
        let uri = parts[1].to_string();
        let version = parts[2].to_string();

        if version != "RTSP/1.0" {
            tracing::warn!(version, "client sent non-RTSP/1.0 version");
        }

        let mut headers = Vec::new();

        for line in lines {
            if line.is_empty() {
                break;
            }

            let colon_pos = line.find(':').ok_or(Error::Parse {
                kind: ParseErrorKind::InvalidHeader,
            })?;

            let name = line[..colon_pos].trim().to_string();
            let value = line[colon_pos + 1..].trim().to_string();

            headers.push((name, value));
        }

        Ok(RtspRequest {
            method,
            uri,
            version,
            headers,
            body: Vec::new(),
        })
    }

    /// Look up a header value by name (case-insensitive, per RFC 2326 §4.2).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the CSeq header value, which numbers and orders RTSP
    /// request/response pairs (RFC 2326 §12.17).
    pub fn cseq(&self) -> Option<&str> {
        self.get_header("CSeq")
    }

    /// Body size announced by `Content-Length`, zero when absent.
    pub fn content_length(&self) -> crate::error::Result<usize> {
        let Some(value) = self.get_header("Content-Length") else {
            return Ok(0);
        };
        match value.parse::<usize>() {
            Ok(len) if len <= MAX_BODY_SIZE => Ok(len),
            _ => Err(Error::Parse {
                kind: ParseErrorKind::InvalidContentLength,
            }),
        }
    }

    /// Session ID from the `Session` header, without the timeout suffix:
    /// `"SESSIONID;timeout=60"` -> `"SESSIONID"`.
    pub fn session_id(&self) -> Option<&str> {
        self.get_header("Session")
            .and_then(|s| s.split(';').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Path and query of the request URI.
    pub fn path_and_query(&self) -> (&str, &str) {
        split_uri(&self.uri)
    }
}

/// Split an RTSP URL into its path (leading `/` included, empty when the URL
/// has none) and raw query.
pub fn split_uri(uri: &str) -> (&str, &str) {
    let path_query = match uri
        .strip_prefix("rtsp://")
        .or_else(|| uri.strip_prefix("rtsps://"))
    {
        Some(rest) => rest.find('/').map(|i| &rest[i..]).unwrap_or(""),
        None => uri,
    };

    match path_query.split_once('?') {
        Some((path, query)) => (path, query),
        None => (path_query, ""),
    }
}
