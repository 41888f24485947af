//! Stateless HTTP request builder and response parser for the TripShare API.
//!
//! # Design
//! `TripShareClient` holds only a `base_url`. Each remote operation has a
//! `build_*` method producing an `HttpRequest`; every response goes through
//! `parse_response` (or `parse_login`). The session is an argument of each
//! authorized builder, never client state.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ApiError;
use crate::http::{HttpBody, HttpMethod, HttpRequest, HttpResponse, MultipartForm, AUTHORIZATION, CONTENT_TYPE};
use crate::types::{DayCount, LoginResponse, PhotoFile, Session};

/// Lifetime requested for signed photo URLs.
pub const SIGNED_URL_TTL_SECONDS: u64 = 3600;

/// Synchronous, stateless client for the TripShare API.
#[derive(Debug, Clone)]
pub struct TripShareClient {
    base_url: String,
}

impl TripShareClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // --- auth ---

    pub fn build_login(&self, email: &str, password: &str) -> HttpRequest {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("username", email)
            .append_pair("password", password)
            .finish();
        HttpRequest {
            method: HttpMethod::Post,
            path: self.url("/auth/login"),
            headers: vec![(
                CONTENT_TYPE.to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            body: Some(HttpBody::Form(body)),
        }
    }

    pub fn build_signup(&self, email: &str, password: &str) -> Result<HttpRequest, ApiError> {
        self.json_request(
            HttpMethod::Post,
            "/auth/signup",
            None,
            &json!({ "email": email, "password": password }),
        )
    }

    pub fn build_me(&self, session: &Session) -> HttpRequest {
        self.authorized(HttpMethod::Get, "/auth/me", session)
    }

    pub fn build_ping(&self) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: self.url("/ping"),
            headers: Vec::new(),
            body: None,
        }
    }

    // --- groups ---

    pub fn build_list_groups(&self, session: &Session) -> HttpRequest {
        self.authorized(HttpMethod::Get, "/groups", session)
    }

    pub fn build_create_group(
        &self,
        session: &Session,
        title: &str,
        expires_in_days: DayCount,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(
            HttpMethod::Post,
            "/groups",
            Some(session),
            &json!({ "title": title, "expires_in_days": expires_in_days }),
        )
    }

    pub fn build_join_group(&self, session: &Session, code: &str) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/groups/join", Some(session), &json!({ "code": code }))
    }

    pub fn build_get_group_details(&self, session: &Session, group_id: &str) -> HttpRequest {
        self.authorized(HttpMethod::Get, &format!("/groups/{group_id}"), session)
    }

    pub fn build_extend_group(
        &self,
        session: &Session,
        group_id: &str,
        extend_days: DayCount,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(
            HttpMethod::Post,
            &format!("/groups/{group_id}/extend"),
            Some(session),
            &json!({ "extend_days": extend_days }),
        )
    }

    pub fn build_list_members(&self, session: &Session, group_id: &str) -> HttpRequest {
        self.authorized(HttpMethod::Get, &format!("/groups/{group_id}/members"), session)
    }

    pub fn build_approve_member(
        &self,
        session: &Session,
        group_id: &str,
        member_id: &str,
        approve: bool,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(
            HttpMethod::Post,
            &format!("/groups/{group_id}/approve"),
            Some(session),
            &json!({ "member_id": member_id, "approve": approve }),
        )
    }

    pub fn build_leave_group(&self, session: &Session, group_id: &str) -> HttpRequest {
        self.authorized(HttpMethod::Post, &format!("/groups/{group_id}/leave"), session)
    }

    pub fn build_delete_group(&self, session: &Session, group_id: &str) -> HttpRequest {
        self.authorized(HttpMethod::Delete, &format!("/groups/{group_id}"), session)
    }

    // --- photos ---

    pub fn build_list_photos(&self, session: &Session, group_id: &str) -> HttpRequest {
        self.authorized(HttpMethod::Get, &format!("/photos/groups/{group_id}"), session)
    }

    pub fn build_get_signed_urls<I: AsRef<str>>(
        &self,
        session: &Session,
        photo_ids: &[I],
    ) -> Result<HttpRequest, ApiError> {
        let photo_ids: Vec<&str> = photo_ids.iter().map(AsRef::as_ref).collect();
        self.json_request(
            HttpMethod::Post,
            "/photos/signed-urls",
            Some(session),
            &json!({ "photo_ids": photo_ids, "expires_in_seconds": SIGNED_URL_TTL_SECONDS }),
        )
    }

    /// Multipart upload. No content type is set here: the transport owns the
    /// boundary.
    pub fn build_upload_photo(&self, session: &Session, group_id: &str, file: PhotoFile) -> HttpRequest {
        let form = MultipartForm::new()
            .text("group_id", group_id)
            .file("file", file.filename, file.content_type, file.bytes);
        let mut request = self.authorized(HttpMethod::Post, "/photos/upload", session);
        request.body = Some(HttpBody::Multipart(form));
        request
    }

    pub fn build_delete_photo(&self, session: &Session, photo_id: &str) -> HttpRequest {
        self.authorized(HttpMethod::Delete, &format!("/photos/{photo_id}"), session)
    }

    // --- responses ---

    /// Parse any response: 2xx bodies become the result, anything else an
    /// `ApiError::Server` carrying the server's JSON payload.
    pub fn parse_response(&self, response: HttpResponse) -> Result<Value, ApiError> {
        let status = response.status;
        let body: Value = serde_json::from_str(&response.body).map_err(|e| ApiError::MalformedBody {
            status,
            reason: e.to_string(),
        })?;
        if response.is_success() {
            Ok(body)
        } else {
            debug!(status, "server rejected request");
            Err(ApiError::Server { status, payload: body })
        }
    }

    pub fn parse_login(&self, response: HttpResponse) -> Result<LoginResponse, ApiError> {
        let status = response.status;
        let body = self.parse_response(response)?;
        serde_json::from_value(body).map_err(|e| ApiError::MalformedBody {
            status,
            reason: e.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, method: HttpMethod, path: &str, session: &Session) -> HttpRequest {
        HttpRequest {
            method,
            path: self.url(path),
            headers: vec![(AUTHORIZATION.to_string(), session.bearer())],
            body: None,
        }
    }

    fn json_request<B: Serialize>(
        &self,
        method: HttpMethod,
        path: &str,
        session: Option<&Session>,
        body: &B,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut headers = vec![(CONTENT_TYPE.to_string(), "application/json".to_string())];
        if let Some(session) = session {
            headers.push((AUTHORIZATION.to_string(), session.bearer()));
        }
        Ok(HttpRequest {
            method,
            path: self.url(path),
            headers,
            body: Some(HttpBody::Json(body)),
        })
    }
}
