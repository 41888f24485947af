//! Executing API handle: build, send through the host transport, parse.

use serde_json::Value;
use tracing::debug;

use crate::client::TripShareClient;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::types::{DayCount, LoginResponse, PhotoFile, Session};

/// One method per remote operation, bound to a session.
///
/// Every call is a single attempt: no retry, no caching.
pub struct Api<'a, T: ?Sized> {
    client: &'a TripShareClient,
    transport: &'a T,
    session: &'a Session,
}

impl<'a, T: Transport + ?Sized> Api<'a, T> {
    pub fn new(client: &'a TripShareClient, transport: &'a T, session: &'a Session) -> Self {
        Self {
            client,
            transport,
            session,
        }
    }

    pub fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let response = self.send(self.client.build_login(email, password))?;
        self.client.parse_login(response)
    }

    pub fn signup(&self, email: &str, password: &str) -> Result<Value, ApiError> {
        self.call(self.client.build_signup(email, password)?)
    }

    pub fn me(&self) -> Result<Value, ApiError> {
        self.call(self.client.build_me(self.session))
    }

    pub fn ping(&self) -> Result<Value, ApiError> {
        self.call(self.client.build_ping())
    }

    pub fn list_groups(&self) -> Result<Value, ApiError> {
        self.call(self.client.build_list_groups(self.session))
    }

    pub fn create_group(&self, title: &str, expires_in_days: impl Into<DayCount>) -> Result<Value, ApiError> {
        self.call(
            self.client
                .build_create_group(self.session, title, expires_in_days.into())?,
        )
    }

    pub fn join_group(&self, code: &str) -> Result<Value, ApiError> {
        self.call(self.client.build_join_group(self.session, code)?)
    }

    pub fn get_group_details(&self, group_id: &str) -> Result<Value, ApiError> {
        self.call(self.client.build_get_group_details(self.session, group_id))
    }

    pub fn extend_group(&self, group_id: &str, days: impl Into<DayCount>) -> Result<Value, ApiError> {
        self.call(
            self.client
                .build_extend_group(self.session, group_id, days.into())?,
        )
    }

    pub fn list_members(&self, group_id: &str) -> Result<Value, ApiError> {
        self.call(self.client.build_list_members(self.session, group_id))
    }

    pub fn approve_member(&self, group_id: &str, member_id: &str, approve: bool) -> Result<Value, ApiError> {
        self.call(
            self.client
                .build_approve_member(self.session, group_id, member_id, approve)?,
        )
    }

    pub fn leave_group(&self, group_id: &str) -> Result<Value, ApiError> {
        self.call(self.client.build_leave_group(self.session, group_id))
    }

    pub fn delete_group(&self, group_id: &str) -> Result<Value, ApiError> {
        self.call(self.client.build_delete_group(self.session, group_id))
    }

    pub fn list_photos(&self, group_id: &str) -> Result<Value, ApiError> {
        self.call(self.client.build_list_photos(self.session, group_id))
    }

    pub fn get_signed_urls<I: AsRef<str>>(&self, photo_ids: &[I]) -> Result<Value, ApiError> {
        self.call(self.client.build_get_signed_urls(self.session, photo_ids)?)
    }

    pub fn upload_photo(&self, group_id: &str, file: PhotoFile) -> Result<Value, ApiError> {
        self.call(self.client.build_upload_photo(self.session, group_id, file))
    }

    pub fn delete_photo(&self, photo_id: &str) -> Result<Value, ApiError> {
        self.call(self.client.build_delete_photo(self.session, photo_id))
    }

    fn call(&self, request: HttpRequest) -> Result<Value, ApiError> {
        let response = self.send(request)?;
        self.client.parse_response(response)
    }

    fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(method = request.method.as_str(), path = %request.path, "sending request");
        let response = self.transport.execute(request)?;
        debug!(status = response.status, "received response");
        Ok(response)
    }
}
