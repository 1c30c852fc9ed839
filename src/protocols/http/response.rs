//! HTTP response builder and serializer.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::Utc;

/// Value of the `Server` header.
const SERVER_NAME: &str = concat!("message-relay/", env!("CARGO_PKG_VERSION"));

/// An HTTP response, always sent with `Connection: close`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// A response with a body of the given content type.
    pub fn with_body(status: u16, content_type: &str, body: impl Into<Bytes>) -> Self {
        let mut response = Self::new(status);
        response.headers.push(("Content-Type", content_type.to_string()));
        response.body = body.into();
        response
    }

    /// `302 Found` pointing at `location`, with no body.
    pub fn redirect(location: &str) -> Self {
        let mut response = Self::new(302);
        response.headers.push(("Location", location.to_string()));
        response
    }

    /// A small built-in HTML error page.
    pub fn error_page(status: u16, detail: &str) -> Self {
        let body = format!(
            "<html><head><title>{code} {reason}</title></head>\
             <body><h1>{code} {reason}</h1><p>{detail}</p></body></html>",
            code = status,
            reason = reason(status),
            detail = detail,
        );
        Self::with_body(status, "text/html", body)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Serialize status line, headers and body.
    pub fn encode(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(256 + self.body.len());
        out.put_slice(format!("HTTP/1.1 {} {}\r\n", self.status, reason(self.status)).as_bytes());
        for (name, value) in &self.headers {
            put_header(&mut out, name, value);
        }
        put_header(&mut out, "Content-Length", &self.body.len().to_string());
        put_header(&mut out, "Server", SERVER_NAME);
        put_header(
            &mut out,
            "Date",
            &Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        );
        put_header(&mut out, "Connection", "close");
        out.put_slice(b"\r\n");
        out.put_slice(&self.body);
        out
    }
}

fn put_header(out: &mut BytesMut, name: &str, value: &str) {
    out.put_slice(name.as_bytes());
    out.put_slice(b": ");
    out.put_slice(value.as_bytes());
    out.put_slice(b"\r\n");
}

/// Reason phrase for the status codes this server sends.
pub fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        302 => "Found",
        400 => "Bad Request",
        404 => "Not Found",
        408 => "Request Timeout",
        413 => "Content Too Large",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        _ => "Unknown",
    }
}
