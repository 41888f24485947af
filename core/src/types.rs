//! Domain values exchanged with the TripShare API.
//!
//! # Design
//! Groups, photos and users are server-defined records the client never
//! interprets, so they stay `serde_json::Value`. Only the values the client
//! must build itself get types: the session, the day count sent when creating
//! or extending a group, the login/signup forms and the uploaded file.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// The currently authenticated user and credential.
///
/// `user` and `token` are normally both set or both absent, but either may be
/// missing on its own. Authentication is decided by `user` alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user: Option<Value>,
    pub token: Option<String>,
}

impl Session {
    pub fn new(user: Value, token: impl Into<String>) -> Self {
        Self {
            user: Some(user),
            token: Some(token.into()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// The user's `id` field, rendered as text.
    pub fn user_id(&self) -> Option<String> {
        match self.user.as_ref()?.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// `Authorization` header value. The user id doubles as the bearer
    /// credential; with no user the credential is empty but the header is
    /// still produced.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.user_id().unwrap_or_default())
    }
}

/// A day count coerced to an integer before transmission.
///
/// Strings keep their leading integer (`"7"`, `" 7days"`, `"7.9"` all give 7);
/// input without one becomes `null` on the wire. Values outside the `i64`
/// range also become `null`, from strings and floats alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DayCount(Option<i64>);

impl DayCount {
    pub fn value(self) -> Option<i64> {
        self.0
    }
}

impl From<i64> for DayCount {
    fn from(days: i64) -> Self {
        Self(Some(days))
    }
}

impl From<i32> for DayCount {
    fn from(days: i32) -> Self {
        Self(Some(i64::from(days)))
    }
}

impl From<u32> for DayCount {
    fn from(days: u32) -> Self {
        Self(Some(i64::from(days)))
    }
}

impl From<f64> for DayCount {
    fn from(days: f64) -> Self {
        // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
        let days = days.trunc();
        let in_range = days.is_finite() && days >= i64::MIN as f64 && days < i64::MAX as f64;
        Self(in_range.then_some(days as i64))
    }
}

impl From<&str> for DayCount {
    fn from(days: &str) -> Self {
        Self(parse_leading_int(days))
    }
}

impl From<String> for DayCount {
    fn from(days: String) -> Self {
        Self::from(days.as_str())
    }
}

impl fmt::Display for DayCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(days) => write!(f, "{days}"),
            None => write!(f, "NaN"),
        }
    }
}

impl Serialize for DayCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DayCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => match n.as_i64() {
                Some(i) => DayCount::from(i),
                None => DayCount::from(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => DayCount::from(s.as_str()),
            _ => DayCount(None),
        })
    }
}

/// Leading-integer parse: optional whitespace and sign, then digits.
fn parse_leading_int(input: &str) -> Option<i64> {
    let trimmed = input.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Credentials captured from the login form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Fields captured from the signup form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
}

/// Successful `/auth/login` answer. Unknown fields are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub user: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LoginResponse {
    pub fn into_session(self) -> Session {
        Session {
            user: self.user.filter(Value::is_object),
            token: self.access_token,
        }
    }
}

/// A photo file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl PhotoFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        let content_type = guess_mime_type(&filename).map(str::to_string);
        Self {
            filename,
            content_type,
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(filename, bytes))
    }
}

fn guess_mime_type(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
