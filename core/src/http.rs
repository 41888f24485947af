//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! Requests and responses are plain data. The core builds `HttpRequest`
//! values and parses `HttpResponse` values; the host implements `Transport`
//! and performs the actual exchange. Multipart bodies stay structured so the
//! host's HTTP stack picks the boundary and writes the content type itself.

use crate::error::TransportError;

pub const CONTENT_TYPE: &str = "content-type";
pub const AUTHORIZATION: &str = "authorization";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Request body as handed to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpBody {
    /// Serialized JSON document.
    Json(String),
    /// `application/x-www-form-urlencoded` pairs, already encoded.
    Form(String),
    Multipart(MultipartForm),
}

impl HttpBody {
    /// Text of a JSON or form body.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            HttpBody::Json(s) | HttpBody::Form(s) => Some(s),
            HttpBody::Multipart(_) => None,
        }
    }
}

/// Ordered multipart/form-data fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    pub parts: Vec<MultipartPart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.parts.push(MultipartPart {
            name: name.to_string(),
            content: PartContent::Text(value.into()),
        });
        self
    }

    pub fn file(
        mut self,
        name: &str,
        filename: impl Into<String>,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(MultipartPart {
            name: name.to_string(),
            content: PartContent::File {
                filename: filename.into(),
                content_type,
                bytes,
            },
        });
        self
    }

    pub fn get(&self, name: &str) -> Option<&PartContent> {
        self.parts.iter().find(|p| p.name == name).map(|p| &p.content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    pub name: String,
    pub content: PartContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartContent {
    Text(String),
    File {
        filename: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

/// An HTTP request described as plain data.
///
/// `path` is the absolute URL. Header names are lower-case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<HttpBody>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes one HTTP exchange on behalf of the core.
///
/// Implementations must return non-success statuses as an `HttpResponse`;
/// `Err` is reserved for exchanges that produced no response at all.
pub trait Transport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}
