use std::io;

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::resolutions::ApiErrorBody;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpLimits {
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
}

impl Default for HttpLimits {
    fn default() -> Self {
        Self {
            max_header_bytes: 16 * 1024,
            max_body_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("request head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },
    #[error("request body of {length} bytes exceeds {limit} bytes")]
    BodyTooLarge { length: usize, limit: usize },
    #[error("transfer-encoding is not supported")]
    UnsupportedTransferEncoding,
    #[error("connection error: {0}")]
    Io(#[from] io::Error),
}

fn malformed(message: impl Into<String>) -> HttpError {
    HttpError::Malformed(message.into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub version: HttpVersion,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            method: method.into(),
            path,
            query,
            version: HttpVersion::Http11,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Percent-decoded query value; the last occurrence of a repeated key wins.
    pub fn query_param(&self, key: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .filter(|(name, _)| name == key)
            .last()
            .map(|(_, value)| value.into_owned())
    }

    pub fn keep_alive(&self) -> bool {
        let connection = self.header("connection").map(str::to_ascii_lowercase);
        match self.version {
            HttpVersion::Http11 => !connection.is_some_and(|value| value.contains("close")),
            HttpVersion::Http10 => connection.is_some_and(|value| value.contains("keep-alive")),
        }
    }
}

fn split_target(target: &str) -> (String, Option<String>) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (target.to_string(), None),
    }
}

/// Reads one request from the connection. `Ok(None)` means the peer closed
/// the connection cleanly before sending anything.
pub async fn read_request<R>(
    reader: &mut R,
    limits: &HttpLimits,
) -> Result<Option<HttpRequest>, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut budget = limits.max_header_bytes;

    let request_line = loop {
        match read_head_line(reader, &mut budget, limits.max_header_bytes).await? {
            None => return Ok(None),
            Some(line) if line.is_empty() => continue,
            Some(line) => break line,
        }
    };
    let (method, target, version) = parse_request_line(&request_line)?;

    let mut headers = Vec::new();
    loop {
        let Some(line) = read_head_line(reader, &mut budget, limits.max_header_bytes).await? else {
            return Err(malformed("connection closed inside request head"));
        };
        if line.is_empty() {
            break;
        }
        headers.push(parse_header_line(&line)?);
    }

    let (path, query) = split_target(target);
    let mut request = HttpRequest {
        method: method.to_string(),
        path,
        query,
        version,
        headers,
        body: Vec::new(),
    };

    if request.header("transfer-encoding").is_some() {
        return Err(HttpError::UnsupportedTransferEncoding);
    }

    let length = content_length(&request)?;
    if length > limits.max_body_bytes {
        return Err(HttpError::BodyTooLarge {
            length,
            limit: limits.max_body_bytes,
        });
    }

    if length > 0 {
        let mut body = vec![0u8; length];
        if let Err(err) = reader.read_exact(&mut body).await {
            return Err(if err.kind() == io::ErrorKind::UnexpectedEof {
                malformed("request body ended before content-length")
            } else {
                err.into()
            });
        }
        request.body = body;
    }

    Ok(Some(request))
}

async fn read_head_line<R>(
    reader: &mut R,
    budget: &mut usize,
    limit: usize,
) -> Result<Option<String>, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    if *budget == 0 {
        return Err(HttpError::HeadTooLarge { limit });
    }

    let mut raw = Vec::new();
    let mut limited = AsyncReadExt::take(&mut *reader, *budget as u64);
    let read = limited.read_until(b'\n', &mut raw).await?;
    if read == 0 {
        return Ok(None);
    }
    *budget -= read;

    if raw.last() != Some(&b'\n') {
        if *budget == 0 {
            return Err(HttpError::HeadTooLarge { limit });
        }
        return Err(malformed("connection closed inside request head"));
    }
    raw.pop();
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }

    String::from_utf8(raw)
        .map(Some)
        .map_err(|_| malformed("request head is not valid UTF-8"))
}

fn parse_request_line(line: &str) -> Result<(&str, &str, HttpVersion), HttpError> {
    let mut parts = line.split_whitespace();
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed(format!("invalid request line '{line}'")));
    };

    if !method.bytes().all(|byte| byte.is_ascii_uppercase()) {
        return Err(malformed(format!("invalid method '{method}'")));
    }
    if !target.starts_with('/') {
        return Err(malformed(format!("unsupported request target '{target}'")));
    }

    let version = match version {
        "HTTP/1.1" => HttpVersion::Http11,
        "HTTP/1.0" => HttpVersion::Http10,
        other => return Err(malformed(format!("unsupported protocol version '{other}'"))),
    };

    Ok((method, target, version))
}

fn parse_header_line(line: &str) -> Result<(String, String), HttpError> {
    let Some((name, value)) = line.split_once(':') else {
        return Err(malformed("invalid header line"));
    };
    if name.is_empty()
        || name
            .bytes()
            .any(|byte| byte.is_ascii_whitespace() || byte.is_ascii_control())
    {
        return Err(malformed("invalid header name"));
    }
    // Tab is the only control byte allowed inside a field value.
    if value
        .bytes()
        .any(|byte| byte.is_ascii_control() && byte != b'\t')
    {
        return Err(malformed(format!("control character in header '{name}'")));
    }
    Ok((
        name.to_ascii_lowercase(),
        value.trim_matches([' ', '\t']).to_string(),
    ))
}

fn content_length(request: &HttpRequest) -> Result<usize, HttpError> {
    let mut length = None;
    for (name, value) in &request.headers {
        if name != "content-length" {
            continue;
        }
        let parsed: usize = value
            .parse()
            .map_err(|_| malformed(format!("invalid content-length '{value}'")))?;
        if length.is_some_and(|existing| existing != parsed) {
            return Err(malformed("conflicting content-length headers"));
        }
        length = Some(parsed);
    }
    Ok(length.unwrap_or(0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    Created,
    NoContent,
    BadRequest,
    NotFound,
    MethodNotAllowed,
    PayloadTooLarge,
    RequestHeaderFieldsTooLarge,
    InternalServerError,
    NotImplemented,
    ServiceUnavailable,
}

impl StatusCode {
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Created => 201,
            Self::NoContent => 204,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::PayloadTooLarge => 413,
            Self::RequestHeaderFieldsTooLarge => 431,
            Self::InternalServerError => 500,
            Self::NotImplemented => 501,
            Self::ServiceUnavailable => 503,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Created => "Created",
            Self::NoContent => "No Content",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::PayloadTooLarge => "Payload Too Large",
            Self::RequestHeaderFieldsTooLarge => "Request Header Fields Too Large",
            Self::InternalServerError => "Internal Server Error",
            Self::NotImplemented => "Not Implemented",
            Self::ServiceUnavailable => "Service Unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(status)
                .with_header("Content-Type", JSON_CONTENT_TYPE)
                .with_body(body),
            Err(err) => {
                tracing::error!(target: "http", error = %err, "response_serialization_failed");
                Self::internal_error()
            }
        }
    }

    /// Bare 500. Falls back to an empty body if even the error body cannot
    /// be encoded.
    pub fn internal_error() -> Self {
        let body = serde_json::to_vec(&ApiErrorBody::internal(Vec::<String>::new()))
            .unwrap_or_default();
        Self::new(StatusCode::InternalServerError)
            .with_header("Content-Type", JSON_CONTENT_TYPE)
            .with_body(body)
    }

    pub fn no_content() -> Self {
        Self::new(StatusCode::NoContent)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn encode(&self, keep_alive: bool) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\n",
            self.status.as_u16(),
            self.status.reason()
        );
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        if self.status != StatusCode::NoContent {
            head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        }
        let connection = if keep_alive { "keep-alive" } else { "close" };
        head.push_str(&format!("Connection: {connection}\r\n\r\n"));

        let mut encoded = head.into_bytes();
        if self.status != StatusCode::NoContent {
            encoded.extend_from_slice(&self.body);
        }
        encoded
    }
}

pub async fn write_response<W>(
    writer: &mut W,
    response: &HttpResponse,
    keep_alive: bool,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&response.encode(keep_alive)).await?;
    writer.flush().await
}
