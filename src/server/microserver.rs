//! Minimal blocking HTTP/1.1 server over any Read + Write stream.
//!
//! Intentionally limited surface:
//! - One request per connection (no keep-alive)
//! - No chunked transfer encoding (rejected)
//! - POST requires Content-Length
//! - Header cap: 32 KiB, Body cap: 1 MiB, body read to exactly Content-Length

use std::io::{Read, Write};

/// Maximum header section size (32 KiB)
const MAX_HEADER_SIZE: usize = 32 * 1024;

/// Maximum request body size (1 MiB)
pub const MAX_BODY_SIZE: usize = 1_048_576;

/// Parsed HTTP request (transport-free)
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    /// Request target including any query string
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// HTTP response to write back
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a JSON response
    pub fn json(status: u16, value: &impl serde::Serialize) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: serde_json::to_vec(value).unwrap_or_default(),
        }
    }

    /// Empty-bodied response
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Reason phrase for common status codes
fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Read bytes up to and including the blank line ending the head
///
/// `Ok(None)` means the peer closed before sending anything.
fn read_head(stream: &mut impl Read) -> Result<Option<Vec<u8>>, String> {
    let mut head = Vec::with_capacity(1024);
    let mut byte = [0u8; 1];

    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte) {
            Ok(0) if head.is_empty() => return Ok(None),
            Ok(0) => return Err("Connection closed mid-request".to_string()),
            Ok(_) => head.push(byte[0]),
            Err(_) if head.is_empty() => return Ok(None),
            Err(e) => return Err(format!("Read error: {}", e)),
        }
        if head.len() > MAX_HEADER_SIZE {
            return Err("Headers too large".to_string());
        }
    }

    Ok(Some(head))
}

/// Read exactly `len` body bytes, refusing more than `MAX_BODY_SIZE`
fn read_body(stream: &mut impl Read, len: usize) -> Result<Vec<u8>, String> {
    if len > MAX_BODY_SIZE {
        return Err("Request body too large".to_string());
    }

    let mut body = Vec::with_capacity(len);
    stream
        .take(len as u64)
        .read_to_end(&mut body)
        .map_err(|e| format!("Failed to read request body: {}", e))?;

    if body.len() < len {
        return Err(format!(
            "Request body truncated: expected {} bytes, got {}",
            len,
            body.len()
        ));
    }
    Ok(body)
}

/// Read and parse one request
///
/// `None` when the connection closed before any bytes arrived; `Some(Err)`
/// carries a message for a 400/413 reply.
pub fn read_request(stream: &mut impl Read) -> Option<Result<HttpRequest, String>> {
    let head = match read_head(stream) {
        Ok(Some(head)) => head,
        Ok(None) => return None,
        Err(msg) => return Some(Err(msg)),
    };
    Some(parse_request(stream, &head))
}

fn parse_request(stream: &mut impl Read, head: &[u8]) -> Result<HttpRequest, String> {
    let mut slots = [httparse::EMPTY_HEADER; 64];
    let mut parsed = httparse::Request::new(&mut slots);

    match parsed.parse(head) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => return Err("Incomplete HTTP request".to_string()),
        Err(e) => return Err(format!("HTTP parse error: {}", e)),
    }

    let method = parsed.method.unwrap_or("").to_string();
    let path = parsed.path.unwrap_or("/").to_string();
    let headers: Vec<(String, String)> = parsed
        .headers
        .iter()
        .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
        .collect();

    let header = |name: &str| {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    };

    if header("Transfer-Encoding").is_some_and(|v| v.to_ascii_lowercase().contains("chunked")) {
        return Err("Chunked transfer encoding not supported".to_string());
    }

    let body = match method.as_str() {
        "POST" | "PUT" | "PATCH" => {
            let len = header("Content-Length")
                .ok_or_else(|| "POST requires Content-Length".to_string())?
                .trim()
                .parse::<usize>()
                .map_err(|_| "Invalid Content-Length".to_string())?;
            read_body(stream, len)?
        }
        _ => Vec::new(),
    };

    Ok(HttpRequest {
        method,
        path,
        headers,
        body,
    })
}

/// Write an HTTP response to a stream.
pub fn write_response(stream: &mut impl Write, response: &HttpResponse) {
    let mut header_block = format!(
        "HTTP/1.1 {} {}\r\n",
        response.status,
        reason(response.status)
    );
    header_block.push_str(&format!("Content-Length: {}\r\n", response.body.len()));
    header_block.push_str("Connection: close\r\n");

    for (name, value) in &response.headers {
        header_block.push_str(&format!("{}: {}\r\n", name, value));
    }
    header_block.push_str("\r\n");

    // client may already be gone
    let _ = stream.write_all(header_block.as_bytes());
    if !response.body.is_empty() {
        let _ = stream.write_all(&response.body);
    }
    let _ = stream.flush();
}
