//! Response model.
//!
//! # Responsibilities
//! - Define the `Response` contract: status, content type, body writer
//! - Provide the built-in variants (text, JSON, redirect, binary, empty)
//! - Decode JSON bodies back into typed values
//!
//! # Design Decisions
//! - Responses are immutable once constructed
//! - JSON is serialized eagerly so failures surface to the handler
//! - `write_to` reports the exact byte count and any sink error

use std::io::{self, Read, Write};

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub const CONTENT_TYPE_TEXT: &str = "text/plain";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Errors raised while constructing a response.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("failed to serialize response body: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("redirect status must be 3xx, got {0}")]
    InvalidRedirectStatus(u16),

    #[error("invalid redirect location: {0:?}")]
    InvalidLocation(String),

    #[error("invalid content type: {0:?}")]
    InvalidContentType(String),
}

/// A finished response value.
pub trait Response: Send + Sync {
    fn status_code(&self) -> StatusCode;

    /// Content type label; empty when the response has no body.
    fn content_type(&self) -> &str;

    /// Stream the body to `w`, returning the number of bytes written.
    fn write_to(&self, w: &mut dyn Write) -> io::Result<u64>;

    /// Extra headers beyond `Content-Type`.
    fn apply_headers(&self, _headers: &mut HeaderMap) {}
}

fn write_bytes(body: &[u8], w: &mut dyn Write) -> io::Result<u64> {
    w.write_all(body)?;
    Ok(body.len() as u64)
}

/// Plain-text response.
#[derive(Debug, Clone)]
pub struct Text {
    status: StatusCode,
    body: Bytes,
}

impl Text {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "404 page not found")
    }

    pub fn internal_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl Response for Text {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn content_type(&self) -> &str {
        CONTENT_TYPE_TEXT
    }

    fn write_to(&self, w: &mut dyn Write) -> io::Result<u64> {
        write_bytes(&self.body, w)
    }
}

/// JSON response, serialized at construction.
#[derive(Debug, Clone)]
pub struct Json {
    status: StatusCode,
    body: Bytes,
}

impl Json {
    pub fn new<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Result<Self, ResponseError> {
        let body = serde_json::to_vec(value)?;
        Ok(Self {
            status,
            body: Bytes::from(body),
        })
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl Response for Json {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn content_type(&self) -> &str {
        CONTENT_TYPE_JSON
    }

    fn write_to(&self, w: &mut dyn Write) -> io::Result<u64> {
        write_bytes(&self.body, w)
    }
}

/// Redirect to another location.
#[derive(Debug, Clone)]
pub struct Redirect {
    status: StatusCode,
    location: HeaderValue,
}

impl Redirect {
    pub fn new(status: StatusCode, location: &str) -> Result<Self, ResponseError> {
        if !status.is_redirection() {
            return Err(ResponseError::InvalidRedirectStatus(status.as_u16()));
        }
        let location = HeaderValue::from_str(location)
            .map_err(|_| ResponseError::InvalidLocation(location.to_string()))?;
        Ok(Self { status, location })
    }

    /// `302 Found`.
    pub fn found(location: &str) -> Result<Self, ResponseError> {
        Self::new(StatusCode::FOUND, location)
    }

    /// `308 Permanent Redirect`.
    pub fn permanent(location: &str) -> Result<Self, ResponseError> {
        Self::new(StatusCode::PERMANENT_REDIRECT, location)
    }
}

impl Response for Redirect {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn content_type(&self) -> &str {
        ""
    }

    fn write_to(&self, _w: &mut dyn Write) -> io::Result<u64> {
        Ok(0)
    }

    fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(header::LOCATION, self.location.clone());
    }
}

/// Raw bytes with a caller-chosen content type (files, images, ...).
#[derive(Debug, Clone)]
pub struct Binary {
    status: StatusCode,
    content_type: String,
    body: Bytes,
}

impl Binary {
    pub fn new(
        status: StatusCode,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<Self, ResponseError> {
        if HeaderValue::from_str(content_type).is_err() {
            return Err(ResponseError::InvalidContentType(content_type.to_string()));
        }
        Ok(Self {
            status,
            content_type: content_type.to_string(),
            body: body.into(),
        })
    }
}

impl Response for Binary {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn write_to(&self, w: &mut dyn Write) -> io::Result<u64> {
        write_bytes(&self.body, w)
    }
}

/// A status-only response without a body.
#[derive(Debug, Clone, Copy)]
pub struct Empty {
    status: StatusCode,
}

impl Empty {
    pub fn new(status: StatusCode) -> Self {
        Self { status }
    }

    /// Used when a chain finishes without producing a response.
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT)
    }
}

impl Response for Empty {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn content_type(&self) -> &str {
        ""
    }

    fn write_to(&self, _w: &mut dyn Write) -> io::Result<u64> {
        Ok(0)
    }
}

/// Decode a JSON document from `r`.
pub fn decode_json<T: DeserializeOwned>(r: impl Read) -> Result<T, serde_json::Error> {
    serde_json::from_reader(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Person {
        name: String,
        age: u32,
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_text_response() {
        let resp = Text::new(StatusCode::OK, "hello");
        let mut out = Vec::new();
        assert_eq!(resp.write_to(&mut out).unwrap(), 5);
        assert_eq!(out, b"hello");
        assert_eq!(resp.content_type(), "text/plain");
        assert_eq!(resp.status_code(), StatusCode::OK);
    }

    #[test]
    fn test_json_round_trip() {
        let john = Person {
            name: "John Doe".into(),
            age: 33,
        };
        let resp = Json::new(StatusCode::OK, &john).unwrap();
        assert_eq!(resp.content_type(), "application/json");

        let mut out = Vec::new();
        let n = resp.write_to(&mut out).unwrap();
        assert_eq!(n as usize, out.len());

        let decoded: Person = decode_json(&out[..]).unwrap();
        assert_eq!(decoded, john);
    }

    #[test]
    fn test_json_serialization_failure() {
        use std::collections::HashMap;
        // Non-string map keys cannot be encoded as JSON objects.
        let mut bad = HashMap::new();
        bad.insert((1, 2), "x");
        let err = Json::new(StatusCode::OK, &bad).unwrap_err();
        assert!(matches!(err, ResponseError::Serialization(_)));
    }

    #[test]
    fn test_write_error_propagates() {
        let resp = Text::new(StatusCode::OK, "hello");
        let err = resp.write_to(&mut FailingSink).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_redirect() {
        let resp = Redirect::found("/login").unwrap();
        let mut headers = HeaderMap::new();
        resp.apply_headers(&mut headers);
        assert_eq!(resp.status_code(), StatusCode::FOUND);
        assert_eq!(headers.get(header::LOCATION).unwrap(), "/login");

        assert!(matches!(
            Redirect::new(StatusCode::OK, "/x"),
            Err(ResponseError::InvalidRedirectStatus(200))
        ));
        assert!(Redirect::found("bad\nlocation").is_err());
    }

    #[test]
    fn test_binary_and_empty() {
        let resp = Binary::new(StatusCode::OK, "image/png", vec![0x89, 0x50]).unwrap();
        assert_eq!(resp.content_type(), "image/png");
        let mut out = Vec::new();
        assert_eq!(resp.write_to(&mut out).unwrap(), 2);

        assert!(Binary::new(StatusCode::OK, "bad\r\ntype", Vec::new()).is_err());

        let empty = Empty::no_content();
        assert_eq!(empty.status_code(), StatusCode::NO_CONTENT);
        assert_eq!(empty.content_type(), "");
        assert_eq!(empty.write_to(&mut Vec::new()).unwrap(), 0);
    }
}
