//! Blocking reqwest implementation of the core `Transport` seam.

use reqwest::blocking::{multipart, Client};
use tripshare_core::{HttpBody, HttpMethod, HttpRequest, HttpResponse, MultipartForm, PartContent, Transport, TransportError};

/// Sends built requests over HTTP. Non-2xx statuses are returned as data, and
/// only connection-level failures become `TransportError`.
///
/// No timeout is configured: a request waits as long as the backend does.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(None::<std::time::Duration>).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match req.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.client.request(method, &req.path);
        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match req.body {
            None => builder,
            Some(HttpBody::Json(body)) | Some(HttpBody::Form(body)) => builder.body(body),
            // reqwest writes the content-type with its own boundary.
            Some(HttpBody::Multipart(form)) => builder.multipart(to_multipart(form)?),
        };

        let response = builder.send().map_err(|e| TransportError::new(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
            .collect();
        let body = response.text().map_err(|e| TransportError::new(e.to_string()))?;
        Ok(HttpResponse { status, headers, body })
    }
}

fn to_multipart(form: MultipartForm) -> Result<multipart::Form, TransportError> {
    let mut out = multipart::Form::new();
    for part in form.parts {
        out = match part.content {
            PartContent::Text(text) => out.text(part.name, text),
            PartContent::File {
                filename,
                content_type,
                bytes,
            } => {
                let mut file = multipart::Part::bytes(bytes).file_name(filename);
                if let Some(ct) = content_type {
                    file = file.mime_str(&ct).map_err(|e| TransportError::new(e.to_string()))?;
                }
                out.part(part.name, file)
            }
        };
    }
    Ok(out)
}
