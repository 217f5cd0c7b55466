use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::error::BridgeError;

/// Issue a simple HTTP request against the browser's loopback discovery
/// endpoint using blocking I/O inside `spawn_blocking`. The discovery
/// surface (`/json/list`, `/json/version`, `/json/new`, `/json/close/<id>`)
/// is small enough that a full HTTP client crate buys nothing over a
/// hand-rolled request/response cycle.
///
/// # Errors
///
/// Returns `BrowserUnavailable` on connection failure, timeout, or a
/// malformed/non-2xx response.
pub async fn http_request(
    method: &str,
    host: &str,
    port: u16,
    path: &str,
) -> Result<String, BridgeError> {
    let addr = format!("{host}:{port}");
    let request =
        format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");

    let addr_clone = addr.clone();
    tokio::task::spawn_blocking(move || {
        let mut stream = TcpStream::connect_timeout(
            &addr_clone
                .parse()
                .map_err(|e| unavailable(format!("invalid address {addr_clone}: {e}")))?,
            Duration::from_secs(5),
        )
        .map_err(|e| unavailable(format!("connection failed to {addr_clone}: {e}")))?;

        stream.set_read_timeout(Some(Duration::from_secs(5))).ok();

        stream
            .write_all(request.as_bytes())
            .map_err(|e| unavailable(format!("write failed: {e}")))?;

        let mut buf = Vec::with_capacity(4096);
        let mut tmp = [0u8; 4096];
        loop {
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => {
                    buf.extend_from_slice(&tmp[..n]);
                    if is_response_complete(&buf) {
                        break;
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    if is_response_complete(&buf) {
                        break;
                    }
                    return Err(unavailable(format!("read timed out: {e}")));
                }
                Err(e) => return Err(unavailable(format!("read failed: {e}"))),
            }
        }

        parse_response(&buf)
    })
    .await
    .map_err(|e| unavailable(format!("discovery request task failed: {e}")))?
}

fn unavailable(message: String) -> BridgeError {
    BridgeError::new(crate::error::ErrorKind::BrowserUnavailable, message)
}

fn is_response_complete(buf: &[u8]) -> bool {
    let Some(header_end) = find_header_end(buf) else {
        return false;
    };
    let body_start = header_end + 4;
    match parse_content_length(&buf[..header_end]) {
        Some(cl) => buf.len() >= body_start + cl,
        None => true,
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_content_length(headers: &[u8]) -> Option<usize> {
    let header_str = std::str::from_utf8(headers).ok()?;
    for line in header_str.lines() {
        if let Some((key, value)) = line.split_once(':')
            && key.trim().eq_ignore_ascii_case("content-length")
        {
            return value.trim().parse().ok();
        }
    }
    None
}

fn parse_response(buf: &[u8]) -> Result<String, BridgeError> {
    let header_end =
        find_header_end(buf).ok_or_else(|| unavailable("malformed HTTP response".into()))?;
    let body_start = header_end + 4;

    let headers = std::str::from_utf8(&buf[..header_end])
        .map_err(|e| unavailable(format!("invalid UTF-8 in headers: {e}")))?;

    let status_line = headers
        .lines()
        .next()
        .ok_or_else(|| unavailable("empty response".into()))?;
    let status_ok = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .is_some_and(|code| (200..300).contains(&code));
    if !status_ok {
        return Err(unavailable(format!("unexpected HTTP status: {status_line}")));
    }

    let body_bytes = if let Some(cl) = parse_content_length(&buf[..header_end]) {
        let end = (body_start + cl).min(buf.len());
        &buf[body_start..end]
    } else {
        &buf[body_start..]
    };

    String::from_utf8(body_bytes.to_vec())
        .map_err(|e| unavailable(format!("invalid UTF-8 in body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_response_with_content_length() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 13\r\n\r\nHello, world!";
        assert_eq!(parse_response(raw).unwrap(), "Hello, world!");
    }

    #[test]
    fn parse_response_without_content_length() {
        let raw = b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n{\"ok\":true}";
        assert_eq!(parse_response(raw).unwrap(), "{\"ok\":true}");
    }

    #[test]
    fn parse_response_rejects_non_2xx() {
        let raw = b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n";
        assert!(parse_response(raw).is_err());
    }

    #[test]
    fn is_response_complete_waits_for_full_body() {
        let partial = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nHe";
        assert!(!is_response_complete(partial));
        let complete = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nHello";
        assert!(is_response_complete(complete));
    }
}
