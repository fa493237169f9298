//! Minimal HTTP/1.1 framing
//!
//! Reads one request head per connection and writes one response with
//! `Connection: close`. Request bodies are never read.

use std::collections::HashMap;
use std::io;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt,
};
use url::Url;

/// Longest accepted request head
const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Parsed request line and query string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
}

impl Request {
    /// Parse a request target such as `/update?plugin_slug=p`
    pub fn from_target(method: &str, target: &str) -> io::Result<Self> {
        let url = Url::parse("http://depot.invalid")
            .and_then(|base| base.join(target))
            .map_err(|e| invalid(format!("bad request target '{}': {}", target, e)))?;

        let query = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        Ok(Self {
            method: method.to_ascii_uppercase(),
            path: url.path().to_string(),
            query,
        })
    }

    /// A non-empty query parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Read a request head (request line + headers) from the stream.
///
/// Never consumes more than `MAX_HEAD_BYTES + 1` bytes, even when a line has
/// no terminator.
pub async fn read_request<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Request> {
    let mut budget = MAX_HEAD_BYTES;

    let request_line = read_head_line(reader, &mut budget).await?;
    if request_line.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before request",
        ));
    }

    // Drain headers; nothing in them changes the response
    loop {
        let line = read_head_line(reader, &mut budget).await?;
        if line.is_empty() || line == b"\r\n" || line == b"\n" {
            break;
        }
    }

    let request_line = String::from_utf8_lossy(&request_line);
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Err(invalid(format!(
            "malformed request line '{}'",
            request_line.trim_end()
        )));
    };

    Request::from_target(method, target)
}

/// Read one line, charging it against the remaining head budget
async fn read_head_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    budget: &mut usize,
) -> io::Result<Vec<u8>> {
    let mut line = Vec::new();
    let n = (&mut *reader)
        .take(*budget as u64 + 1)
        .read_until(b'\n', &mut line)
        .await?;
    if n > *budget {
        return Err(invalid("request head too large".to_string()));
    }
    *budget -= n;
    Ok(line)
}

/// Reason phrase for the status codes this server emits
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Write a status line and headers
pub async fn write_head<W: AsyncWrite + Unpin>(
    writer: &mut W,
    status: u16,
    headers: &[(&str, String)],
) -> io::Result<()> {
    let mut head = format!("HTTP/1.1 {} {}\r\n", status, reason_phrase(status));
    for (name, value) in headers {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("Connection: close\r\n\r\n");
    writer.write_all(head.as_bytes()).await
}

/// Write a complete JSON response
pub async fn write_json<W: AsyncWrite + Unpin>(
    writer: &mut W,
    status: u16,
    body: &serde_json::Value,
    head_only: bool,
) -> io::Result<()> {
    let body = body.to_string();
    write_head(
        writer,
        status,
        &[
            ("Content-Type", "application/json; charset=utf-8".to_string()),
            ("Content-Length", body.len().to_string()),
        ],
    )
    .await?;
    if !head_only {
        writer.write_all(body.as_bytes()).await?;
    }
    writer.flush().await
}

/// Stream a zip file as an attachment
pub async fn write_attachment<R, W>(
    writer: &mut W,
    file: &mut R,
    len: u64,
    filename: &str,
    head_only: bool,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    write_head(
        writer,
        200,
        &[
            ("Content-Type", "application/zip".to_string()),
            (
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", filename),
            ),
            ("Content-Length", len.to_string()),
        ],
    )
    .await?;

    let sent = if head_only {
        0
    } else {
        tokio::io::copy(file, writer).await?
    };
    writer.flush().await?;
    Ok(sent)
}
