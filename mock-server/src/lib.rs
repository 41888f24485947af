use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, FromRequestParts, Multipart, Path, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Form, Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
pub const ALLOWED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];
pub const DEFAULT_EXPIRY_DAYS: i64 = 7;
pub const DEFAULT_SIGNED_URL_TTL: i64 = 3600;
const STORAGE_BASE_URL: &str = "https://storage.tripshare.local/storage/v1";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    #[serde(skip)]
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub code: String,
    pub owner_user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub group_id: Uuid,
    pub user_id: String,
    pub approved: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Photo {
    pub id: Uuid,
    pub group_id: Uuid,
    pub uploader_id: String,
    pub storage_path: String,
    pub filename: String,
    pub mime_type: String,
    pub size: usize,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct Backend {
    pub users: HashMap<String, User>,
    pub groups: HashMap<Uuid, Group>,
    pub members: Vec<Member>,
    pub photos: HashMap<Uuid, Photo>,
}

impl Backend {
    fn membership(&self, group_id: Uuid, user_id: &str) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| m.group_id == group_id && m.user_id == user_id)
    }

    fn is_approved_member(&self, group_id: Uuid, user_id: &str) -> bool {
        self.membership(group_id, user_id).is_some_and(|m| m.approved)
    }

    fn unique_code(&self) -> String {
        loop {
            let code = Uuid::new_v4().simple().to_string()[..6].to_ascii_uppercase();
            if !self.groups.values().any(|g| g.code == code) {
                return code;
            }
        }
    }
}

pub type Db = Arc<RwLock<Backend>>;

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct CreateGroup {
    pub title: String,
    #[serde(default)]
    pub expires_in_days: Option<i64>,
}

#[derive(Deserialize)]
pub struct JoinGroup {
    pub code: String,
}

#[derive(Deserialize)]
pub struct ExtendGroup {
    pub extend_days: i64,
}

#[derive(Deserialize)]
pub struct ApproveMember {
    pub member_id: Uuid,
    pub approve: bool,
}

#[derive(Deserialize)]
pub struct SignedUrlRequest {
    pub photo_ids: Vec<String>,
    #[serde(default)]
    pub expires_in_seconds: Option<i64>,
}

/// Error answer, rendered as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    detail: String,
}

impl ApiFailure {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiFailure>;

/// Caller resolved from `Authorization: Bearer <user id>`.
pub struct CurrentUser(pub User);

impl FromRequestParts<Db> for CurrentUser {
    type Rejection = ApiFailure;

    async fn from_request_parts(parts: &mut Parts, db: &Db) -> Result<Self, Self::Rejection> {
        let credential = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer"))
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ApiFailure::new(StatusCode::UNAUTHORIZED, "Not authenticated"))?;
        db.read()
            .await
            .users
            .get(credential)
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| ApiFailure::new(StatusCode::UNAUTHORIZED, "Could not validate credentials"))
    }
}

pub fn app() -> Router {
    app_with_state(Db::default())
}

pub fn app_with_state(db: Db) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/ping", get(ping))
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/groups", get(list_groups).post(create_group))
        .route("/groups/join", post(join_group))
        .route("/groups/{id}", get(get_group).delete(delete_group))
        .route("/groups/{id}/extend", post(extend_group))
        .route("/groups/{id}/members", get(list_members))
        .route("/groups/{id}/approve", post(approve_member))
        .route("/groups/{id}/leave", post(leave_group))
        .route("/photos/upload", post(upload_photo))
        .route("/photos/signed-urls", post(signed_urls))
        .route("/photos/groups/{group_id}", get(list_photos))
        .route("/photos/{photo_id}", delete(delete_photo))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

// --- misc ---

async fn root() -> Json<Value> {
    Json(json!({ "project": "TripShare", "status": "active" }))
}

async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok", "message": "TripShare backend running" }))
}

// --- auth ---

async fn signup(State(db): State<Db>, Json(input): Json<SignupRequest>) -> ApiResult<Json<User>> {
    if !input.email.contains('@') {
        return Err(ApiFailure::new(StatusCode::BAD_REQUEST, "Invalid email address"));
    }
    if input.password.len() < 6 {
        return Err(ApiFailure::new(
            StatusCode::BAD_REQUEST,
            "Password should be at least 6 characters",
        ));
    }
    let mut backend = db.write().await;
    if backend
        .users
        .values()
        .any(|u| u.email.eq_ignore_ascii_case(&input.email))
    {
        return Err(ApiFailure::new(StatusCode::BAD_REQUEST, "User already registered"));
    }
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: input.email,
        username: input.username,
        password: input.password,
    };
    backend.users.insert(user.id.clone(), user.clone());
    info!(user_id = %user.id, "user signed up");
    Ok(Json(user))
}

async fn login(State(db): State<Db>, Form(input): Form<LoginRequest>) -> ApiResult<Json<Value>> {
    let backend = db.read().await;
    let user = backend
        .users
        .values()
        .find(|u| u.email.eq_ignore_ascii_case(&input.username) && u.password == input.password)
        .ok_or_else(|| ApiFailure::new(StatusCode::UNAUTHORIZED, "Invalid credentials"))?;
    Ok(Json(json!({
        "access_token": user.id,
        "token_type": "bearer",
        "user": user,
    })))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

// --- groups ---

fn parse_group_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiFailure::new(StatusCode::NOT_FOUND, "Group not found"))
}

fn group_mut<'a>(backend: &'a mut Backend, raw_id: &str) -> ApiResult<&'a mut Group> {
    let id = parse_group_id(raw_id)?;
    backend
        .groups
        .get_mut(&id)
        .ok_or_else(|| ApiFailure::new(StatusCode::NOT_FOUND, "Group not found"))
}

fn owned_group_mut<'a>(
    backend: &'a mut Backend,
    raw_id: &str,
    user: &User,
    denied: &str,
) -> ApiResult<&'a mut Group> {
    let group = group_mut(backend, raw_id)?;
    if group.owner_user_id != user.id {
        return Err(ApiFailure::new(StatusCode::FORBIDDEN, denied));
    }
    Ok(group)
}

async fn list_groups(State(db): State<Db>, CurrentUser(user): CurrentUser) -> Json<Vec<Group>> {
    let backend = db.read().await;
    let mut groups: Vec<Group> = backend
        .groups
        .values()
        .filter(|g| backend.is_approved_member(g.id, &user.id))
        .cloned()
        .collect();
    groups.sort_by_key(|g| g.created_at);
    Json(groups)
}

async fn create_group(
    State(db): State<Db>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateGroup>,
) -> ApiResult<Json<Value>> {
    let days = input.expires_in_days.unwrap_or(DEFAULT_EXPIRY_DAYS);
    let now = Utc::now();
    let expires_at = Duration::try_days(days)
        .and_then(|d| now.checked_add_signed(d))
        .ok_or_else(|| ApiFailure::new(StatusCode::BAD_REQUEST, "expires_in_days out of range"))?;

    let mut backend = db.write().await;
    let group = Group {
        id: Uuid::new_v4(),
        code: backend.unique_code(),
        owner_user_id: user.id.clone(),
        title: input.title,
        created_at: now,
        expires_at,
    };
    backend.members.push(Member {
        id: Uuid::new_v4(),
        group_id: group.id,
        user_id: user.id,
        approved: true,
    });
    backend.groups.insert(group.id, group.clone());
    info!(group_id = %group.id, code = %group.code, "group created");
    Ok(Json(json!({
        "id": group.id,
        "code": group.code,
        "created_at": group.created_at,
    })))
}

async fn join_group(
    State(db): State<Db>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<JoinGroup>,
) -> ApiResult<Json<Value>> {
    let mut backend = db.write().await;
    let code = input.code.trim();
    let group_id = backend
        .groups
        .values()
        .find(|g| g.code.eq_ignore_ascii_case(code))
        .map(|g| g.id)
        .ok_or_else(|| ApiFailure::new(StatusCode::NOT_FOUND, "Invalid group code"))?;
    if backend.membership(group_id, &user.id).is_some() {
        return Ok(Json(json!({ "message": "Already a member", "status": "exists" })));
    }
    backend.members.push(Member {
        id: Uuid::new_v4(),
        group_id,
        user_id: user.id,
        approved: false,
    });
    Ok(Json(json!({ "message": "Join request sent", "status": "pending" })))
}

async fn get_group(
    State(db): State<Db>,
    CurrentUser(_): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Group>> {
    let id = parse_group_id(&id)?;
    db.read()
        .await
        .groups
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiFailure::new(StatusCode::NOT_FOUND, "Group not found"))
}

async fn extend_group(
    State(db): State<Db>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<ExtendGroup>,
) -> ApiResult<Json<Group>> {
    let mut backend = db.write().await;
    let group = owned_group_mut(&mut backend, &id, &user, "Only owner can extend group")?;
    group.expires_at = Duration::try_days(input.extend_days)
        .and_then(|d| group.expires_at.checked_add_signed(d))
        .ok_or_else(|| ApiFailure::new(StatusCode::BAD_REQUEST, "extend_days out of range"))?;
    Ok(Json(group.clone()))
}

async fn list_members(
    State(db): State<Db>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Value>>> {
    let group_id = parse_group_id(&id)?;
    let backend = db.read().await;
    if !backend.is_approved_member(group_id, &user.id) {
        return Err(ApiFailure::new(StatusCode::FORBIDDEN, "Not authorized to view members"));
    }
    let members = backend
        .members
        .iter()
        .filter(|m| m.group_id == group_id)
        .map(|m| {
            let username = backend.users.get(&m.user_id).and_then(|u| u.username.clone());
            json!({
                "id": m.id,
                "user_id": m.user_id,
                "username": username,
                "approved": m.approved,
            })
        })
        .collect();
    Ok(Json(members))
}

async fn approve_member(
    State(db): State<Db>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<ApproveMember>,
) -> ApiResult<Json<Value>> {
    let mut backend = db.write().await;
    let group_id = owned_group_mut(&mut backend, &id, &user, "Only owner can approve members")?.id;
    let member = backend
        .members
        .iter_mut()
        .find(|m| m.id == input.member_id && m.group_id == group_id)
        .ok_or_else(|| ApiFailure::new(StatusCode::NOT_FOUND, "Member not found"))?;
    member.approved = input.approve;
    Ok(Json(json!({ "message": "Member updated" })))
}

async fn leave_group(
    State(db): State<Db>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let group_id = parse_group_id(&id)?;
    db.write()
        .await
        .members
        .retain(|m| !(m.group_id == group_id && m.user_id == user.id));
    Ok(Json(json!({ "message": "Left group" })))
}

async fn delete_group(
    State(db): State<Db>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let mut backend = db.write().await;
    let group_id = owned_group_mut(&mut backend, &id, &user, "Only owner can delete group")?.id;
    backend.groups.remove(&group_id);
    backend.members.retain(|m| m.group_id != group_id);
    backend.photos.retain(|_, p| p.group_id != group_id);
    info!(%group_id, "group deleted");
    Ok(Json(json!({ "message": "Group deleted" })))
}

// --- photos ---

/// `photos/<group>/<uploader>/<unix ts>_<sanitized filename>`
pub fn storage_path(group_id: Uuid, uploader_id: &str, filename: &str, at: DateTime<Utc>) -> String {
    let safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    format!("photos/{group_id}/{uploader_id}/{}_{safe}", at.timestamp())
}

fn multipart_error(err: impl std::fmt::Display) -> ApiFailure {
    ApiFailure::new(StatusCode::BAD_REQUEST, err.to_string())
}

async fn upload_photo(
    State(db): State<Db>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> ApiResult<Json<Photo>> {
    let mut group_id = None;
    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "group_id" => group_id = Some(field.text().await.map_err(multipart_error)?),
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((filename, mime_type, bytes));
            }
            _ => {}
        }
    }
    let group_id = group_id
        .as_deref()
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .ok_or_else(|| ApiFailure::new(StatusCode::UNPROCESSABLE_ENTITY, "group_id must be a UUID"))?;
    let (filename, mime_type, bytes) =
        file.ok_or_else(|| ApiFailure::new(StatusCode::UNPROCESSABLE_ENTITY, "file is required"))?;

    let mut backend = db.write().await;
    if !backend.is_approved_member(group_id, &user.id) {
        return Err(ApiFailure::new(
            StatusCode::FORBIDDEN,
            "Not authorized to upload to this group",
        ));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ApiFailure::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("File too large. Max size is {}MB", MAX_UPLOAD_BYTES / (1024 * 1024)),
        ));
    }
    if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(ApiFailure::new(
            StatusCode::BAD_REQUEST,
            format!("Invalid file type. Allowed: {}", ALLOWED_MIME_TYPES.join(", ")),
        ));
    }

    let now = Utc::now();
    let photo = Photo {
        id: Uuid::new_v4(),
        group_id,
        uploader_id: user.id.clone(),
        storage_path: storage_path(group_id, &user.id, &filename, now),
        filename,
        mime_type,
        size: bytes.len(),
        uploaded_at: now,
    };
    backend.photos.insert(photo.id, photo.clone());
    info!(photo_id = %photo.id, %group_id, size = photo.size, "photo uploaded");
    Ok(Json(photo))
}

async fn list_photos(
    State(db): State<Db>,
    CurrentUser(user): CurrentUser,
    Path(group_id): Path<String>,
) -> ApiResult<Json<Vec<Value>>> {
    let group_id = Uuid::parse_str(&group_id)
        .map_err(|_| ApiFailure::new(StatusCode::UNPROCESSABLE_ENTITY, "group_id must be a UUID"))?;
    let backend = db.read().await;
    if !backend.is_approved_member(group_id, &user.id) {
        return Err(ApiFailure::new(StatusCode::FORBIDDEN, "Not authorized to view photos"));
    }
    let mut photos: Vec<&Photo> = backend
        .photos
        .values()
        .filter(|p| p.group_id == group_id)
        .collect();
    photos.sort_by_key(|p| p.uploaded_at);
    Ok(Json(
        photos
            .into_iter()
            .map(|p| {
                json!({
                    "id": p.id,
                    "filename": p.filename,
                    "mime_type": p.mime_type,
                    "size": p.size,
                    "uploaded_at": p.uploaded_at,
                    "thumbnail_url": null,
                })
            })
            .collect(),
    ))
}

async fn signed_urls(
    State(db): State<Db>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<SignedUrlRequest>,
) -> ApiResult<Json<Vec<Value>>> {
    let ttl = input.expires_in_seconds.unwrap_or(DEFAULT_SIGNED_URL_TTL);
    let expires_at = Duration::try_seconds(ttl)
        .and_then(|d| Utc::now().checked_add_signed(d))
        .ok_or_else(|| ApiFailure::new(StatusCode::BAD_REQUEST, "expires_in_seconds out of range"))?;
    let backend = db.read().await;
    let urls = input
        .photo_ids
        .iter()
        .filter_map(|raw| Uuid::parse_str(raw).ok())
        .filter_map(|id| backend.photos.get(&id))
        .filter(|p| backend.is_approved_member(p.group_id, &user.id))
        .map(|p| {
            let token = Uuid::new_v4().simple();
            json!({
                "photo_id": p.id,
                "signed_url": format!(
                    "{STORAGE_BASE_URL}/object/sign/{}?token={token}&expires_in={ttl}",
                    p.storage_path
                ),
                "expires_at": expires_at,
            })
        })
        .collect();
    Ok(Json(urls))
}

async fn delete_photo(
    State(db): State<Db>,
    CurrentUser(user): CurrentUser,
    Path(photo_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let not_found = || ApiFailure::new(StatusCode::NOT_FOUND, "Photo not found");
    let photo_id = Uuid::parse_str(&photo_id).map_err(|_| not_found())?;
    let mut backend = db.write().await;
    let photo = backend.photos.get(&photo_id).ok_or_else(not_found)?;
    let is_uploader = photo.uploader_id == user.id;
    let is_owner = backend
        .groups
        .get(&photo.group_id)
        .is_some_and(|g| g.owner_user_id == user.id);
    if !(is_uploader || is_owner) {
        return Err(ApiFailure::new(
            StatusCode::FORBIDDEN,
            "Not authorized to delete this photo",
        ));
    }
    backend.photos.remove(&photo_id);
    Ok(Json(json!({ "message": "Photo deleted" })))
}
