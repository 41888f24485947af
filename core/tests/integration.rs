//! End-to-end flows against the live mock backend.
//!
//! # Design
//! Starts the mock server on a random port, then drives the facade and every
//! API operation over real HTTP using a blocking reqwest transport. Validates
//! that request building, session handling and response parsing agree with
//! the actual server.

use reqwest::blocking::multipart;
use serde_json::Value;
use tripshare_core::{
    ApiError, App, Config, ErrorKind, FileStore, HttpBody, HttpMethod, HttpRequest, HttpResponse, LoginForm,
    MemoryStore, PartContent, Page, PhotoFile, RuntimeEnv, Session, SessionStore, Shell, SignupForm, Transport,
    TransportError,
};

/// Execute an `HttpRequest` with reqwest. Non-2xx statuses come back as data.
struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
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
        for (key, value) in &req.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder = match req.body {
            None => builder,
            Some(HttpBody::Json(body)) | Some(HttpBody::Form(body)) => builder.body(body),
            Some(HttpBody::Multipart(form)) => {
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
                builder.multipart(out)
            }
        };
        let response = builder.send().map_err(|e| TransportError::new(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| TransportError::new(e.to_string()))?;
        Ok(HttpResponse {
            status,
            headers: Vec::new(),
            body,
        })
    }
}

#[derive(Default)]
struct RecordingShell {
    page: Option<Page>,
    navigations: Vec<Page>,
    notices: Vec<String>,
}

impl Shell for RecordingShell {
    fn current_page(&self) -> Page {
        self.page.clone().unwrap_or(Page::Entry)
    }

    fn navigate(&mut self, page: Page) {
        self.page = Some(page.clone());
        self.navigations.push(page);
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}

fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn config(base_url: &str) -> Config {
    Config::resolve(Some(&RuntimeEnv::with_api_url(base_url)))
}

fn signup_and_login<S: tripshare_core::KeyValueStore>(
    app: &mut App<ReqwestTransport, S, RecordingShell>,
    email: &str,
) {
    let user = app
        .signup(&SignupForm {
            email: email.to_string(),
            password: "secret1".to_string(),
        })
        .expect("signup failed");
    assert_eq!(user["email"], email);
    assert!(app.login(&LoginForm {
        email: email.to_string(),
        password: "secret1".to_string(),
    }));
}

#[test]
fn trip_lifecycle() {
    let base_url = start_server();
    let mut app = App::new(
        &config(&base_url),
        ReqwestTransport::new(),
        MemoryStore::new(),
        RecordingShell::default(),
    );

    // Step 1: the backend is up and the dashboard is guarded.
    assert_eq!(app.api().ping().unwrap()["status"], "ok");
    app.shell_mut().page = Some(Page::Dashboard);
    assert!(!app.require_auth());
    assert_eq!(app.shell().navigations, vec![Page::Entry]);

    // Step 2: sign up and log in.
    signup_and_login(&mut app, "owner@trip.test");
    assert_eq!(app.shell().navigations.last(), Some(&Page::Dashboard));
    assert!(app.require_auth());
    let owner_id = app.session().user_id().unwrap();
    assert_eq!(app.session().token.as_deref(), Some(owner_id.as_str()));
    assert_eq!(app.api().me().unwrap()["id"], owner_id.as_str());

    // Step 3: create and inspect a group.
    assert_eq!(app.api().list_groups().unwrap(), Value::Array(Vec::new()));
    let created = app.api().create_group("Trip", "7").unwrap();
    let group_id = created["id"].as_str().unwrap().to_string();
    let code = created["code"].as_str().unwrap().to_string();
    let details = app.api().get_group_details(&group_id).unwrap();
    assert_eq!(details["title"], "Trip");
    let groups = app.api().list_groups().unwrap();
    assert_eq!(groups.as_array().unwrap().len(), 1);

    // Step 4: extending by "5" and by 5 move expiry by the same amount.
    let extended = app.api().extend_group(&group_id, "5").unwrap();
    assert_ne!(extended["expires_at"], details["expires_at"]);
    app.api().extend_group(&group_id, 5).unwrap();

    // Step 5: upload a photo, list it, sign it.
    let upload = app
        .api()
        .upload_photo(&group_id, PhotoFile::new("beach.png", b"\x89PNG not really".to_vec()))
        .unwrap();
    let photo_id = upload["id"].as_str().unwrap().to_string();
    assert_eq!(upload["mime_type"], "image/png");
    let photos = app.api().list_photos(&group_id).unwrap();
    assert_eq!(photos[0]["id"], photo_id.as_str());
    let urls = app.api().get_signed_urls(&[photo_id.as_str()]).unwrap();
    assert_eq!(urls[0]["photo_id"], photo_id.as_str());

    // Step 6: server errors carry the payload verbatim.
    let err = app.api().join_group("NOPE00").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Api);
    assert!(matches!(err, ApiError::Server { status: 404, .. }));
    app.report_error(&err, "Could not join");
    assert_eq!(app.shell().notices.last().map(String::as_str), Some("Invalid group code"));

    // Step 7: a second traveller joins and waits for approval.
    let guest_dir = tempfile::tempdir().unwrap();
    let guest_store = FileStore::open(guest_dir.path().join("session.json")).unwrap();
    let mut guest = App::new(
        &config(&base_url),
        ReqwestTransport::new(),
        guest_store,
        RecordingShell::default(),
    );
    signup_and_login(&mut guest, "guest@trip.test");
    assert_eq!(guest.api().join_group(&code).unwrap()["status"], "pending");
    let err = guest.api().list_photos(&group_id).unwrap_err();
    assert_eq!(err.status(), Some(403));

    let members = app.api().list_members(&group_id).unwrap();
    let guest_id = guest.session().user_id().unwrap();
    let member_id = members
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["user_id"] == guest_id.as_str())
        .and_then(|m| m["id"].as_str())
        .unwrap()
        .to_string();
    app.api().approve_member(&group_id, &member_id, true).unwrap();
    assert_eq!(guest.api().list_photos(&group_id).unwrap().as_array().unwrap().len(), 1);

    // The guest session survives a restart through the file store.
    let reopened = SessionStore::new(FileStore::open(guest_dir.path().join("session.json")).unwrap());
    assert_eq!(reopened.load(), guest.session().clone());

    // Step 8: only the owner may delete.
    assert_eq!(guest.api().delete_group(&group_id).unwrap_err().status(), Some(403));
    guest.api().leave_group(&group_id).unwrap();
    app.api().delete_photo(&photo_id).unwrap();
    app.api().delete_group(&group_id).unwrap();
    assert_eq!(app.api().get_group_details(&group_id).unwrap_err().status(), Some(404));

    // Step 9: logout wipes the session; anonymous calls are rejected.
    app.logout().unwrap();
    assert_eq!(app.session(), &Session::default());
    assert_eq!(app.store().load(), Session::default());
    assert_eq!(app.shell().navigations.last(), Some(&Page::Entry));
    let err = app.api().list_groups().unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[test]
fn wrong_password_is_reported() {
    let base_url = start_server();
    let mut app = App::new(
        &config(&base_url),
        ReqwestTransport::new(),
        MemoryStore::new(),
        RecordingShell::default(),
    );
    app.signup(&SignupForm {
        email: "a@b.com".to_string(),
        password: "secret1".to_string(),
    })
    .unwrap();

    assert!(!app.login(&LoginForm {
        email: "a@b.com".to_string(),
        password: "wrong".to_string(),
    }));
    assert_eq!(app.shell().notices, vec!["Invalid credentials".to_string()]);
    assert!(app.shell().navigations.is_empty());
    assert!(!app.is_authenticated());
}

#[test]
fn unreachable_backend_is_a_transport_failure() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let mut app = App::new(
        &config(&format!("http://{addr}")),
        ReqwestTransport::new(),
        MemoryStore::new(),
        RecordingShell::default(),
    );

    let err = app.api().list_groups().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);

    assert!(!app.login(&LoginForm {
        email: "a@b.com".to_string(),
        password: "x".to_string(),
    }));
    assert_eq!(app.shell().notices.len(), 1);
    assert!(!app.shell().notices[0].is_empty());
}
