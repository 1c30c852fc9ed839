//! HTTP/1.x request parser.
//!
//! Parses a request head (request line and headers) from a byte buffer and
//! slices out the body announced by `Content-Length`.

use bytes::Bytes;
use std::collections::HashMap;
use std::str;

/// Largest request head accepted, in bytes.
pub const MAX_HEAD_SIZE: usize = 16 * 1024;

/// Largest request body accepted, in bytes.
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Request method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    /// Anything else; answered with 501.
    Other(String),
}

impl Method {
    fn parse(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Other(m) => m,
        }
    }
}

/// A fully received request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Raw request target, including any query string.
    pub target: String,
    pub version: String,
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Parse result
#[derive(Debug)]
pub enum ParseResult {
    /// A full request and the number of bytes it occupied.
    Complete(Request, usize),
    /// The head is complete but the body is still arriving.
    NeedData { head_bytes: usize, body_bytes: usize },
    /// The head is not complete yet.
    Incomplete,
    Error(ParseError),
}

/// Parse errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    InvalidRequestLine,
    InvalidHeader,
    InvalidContentLength,
    HeadTooLarge,
    BodyTooLarge(usize),
}

impl ParseError {
    /// HTTP status to answer with.
    pub fn status(&self) -> u16 {
        match self {
            ParseError::BodyTooLarge(_) => 413,
            ParseError::HeadTooLarge => 431,
            _ => 400,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::InvalidRequestLine => write!(f, "invalid request line"),
            ParseError::InvalidHeader => write!(f, "invalid header line"),
            ParseError::InvalidContentLength => write!(f, "invalid Content-Length"),
            ParseError::HeadTooLarge => write!(f, "request head too large"),
            ParseError::BodyTooLarge(n) => write!(f, "request body of {} bytes too large", n),
        }
    }
}

impl std::error::Error for ParseError {}

/// HTTP request parser
pub struct Parser;

impl Parser {
    /// Parse a request from the start of `buffer`.
    pub fn parse(buffer: &[u8]) -> ParseResult {
        let head_end = match find_head_end(buffer) {
            Some(pos) => pos,
            None if buffer.len() > MAX_HEAD_SIZE => {
                return ParseResult::Error(ParseError::HeadTooLarge)
            }
            None => return ParseResult::Incomplete,
        };
        if head_end > MAX_HEAD_SIZE {
            return ParseResult::Error(ParseError::HeadTooLarge);
        }

        let head = match str::from_utf8(&buffer[..head_end]) {
            Ok(s) => s,
            Err(_) => return ParseResult::Error(ParseError::InvalidHeader),
        };
        let head_bytes = head_end + 4; // blank line

        let mut lines = head.split("\r\n");
        let (method, target, version) = match lines.next().map(parse_request_line) {
            Some(Ok(parts)) => parts,
            Some(Err(e)) => return ParseResult::Error(e),
            None => return ParseResult::Error(ParseError::InvalidRequestLine),
        };

        let mut headers = HashMap::new();
        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                return ParseResult::Error(ParseError::InvalidHeader);
            };
            let name = name.trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return ParseResult::Error(ParseError::InvalidHeader);
            }
            headers.insert(name.to_ascii_lowercase(), value.trim().to_string());
        }

        let body_bytes = match headers.get("content-length") {
            Some(value) => match value.parse::<usize>() {
                Ok(n) if n > MAX_BODY_SIZE => {
                    return ParseResult::Error(ParseError::BodyTooLarge(n))
                }
                Ok(n) => n,
                Err(_) => return ParseResult::Error(ParseError::InvalidContentLength),
            },
            None => 0,
        };

        let total = head_bytes + body_bytes;
        if buffer.len() < total {
            return ParseResult::NeedData {
                head_bytes,
                body_bytes,
            };
        }

        let request = Request {
            method,
            target,
            version,
            headers,
            body: Bytes::copy_from_slice(&buffer[head_bytes..total]),
        };
        ParseResult::Complete(request, total)
    }
}

fn parse_request_line(line: &str) -> Result<(Method, String, String), ParseError> {
    let mut parts = line.split_whitespace();
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::InvalidRequestLine);
    };

    if !version.starts_with("HTTP/") || !target.starts_with('/') {
        return Err(ParseError::InvalidRequestLine);
    }

    Ok((Method::parse(method), target.to_string(), version.to_string()))
}

/// Find `\r\n\r\n`, returning the position of its first byte.
fn find_head_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}
