//! Application facade: session state and high-level user actions.
//!
//! # Design
//! `App` owns the live session for the current page together with the client,
//! the host transport, the session store and a `Shell` (the page: where we
//! are, where to go next, how to show a message). Actions translate shell
//! events into client calls and session updates. The facade is the only layer
//! that turns errors into user-visible text.
//!
//! "Authenticated" means exactly "a user record is present". `require_auth`
//! is an advisory redirect; the server enforces real authorization.

use serde_json::Value;
use tracing::{info, warn};

use crate::api::Api;
use crate::client::TripShareClient;
use crate::config::Config;
use crate::error::{ApiError, StorageError};
use crate::http::Transport;
use crate::session::SessionStore;
use crate::storage::KeyValueStore;
use crate::types::{LoginForm, Session, SignupForm};

pub const LOGIN_FAILED: &str = "Login failed";
pub const SIGNUP_FAILED: &str = "Signup failed";

/// Pages the facade navigates between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    /// `index.html`, the login page.
    Entry,
    /// `dashboard.html`, the landing page after login.
    Dashboard,
    Other(String),
}

impl Page {
    pub fn path(&self) -> &str {
        match self {
            Page::Entry => "index.html",
            Page::Dashboard => "dashboard.html",
            Page::Other(path) => path,
        }
    }
}

/// The page hosting the facade.
pub trait Shell {
    fn current_page(&self) -> Page;
    fn navigate(&mut self, page: Page);
    fn notify(&mut self, message: &str);
}

pub struct App<T, S, H> {
    client: TripShareClient,
    transport: T,
    store: SessionStore<S>,
    shell: H,
    session: Session,
}

impl<T: Transport, S: KeyValueStore, H: Shell> App<T, S, H> {
    /// Build the facade and load the persisted session.
    pub fn new(config: &Config, transport: T, storage: S, shell: H) -> Self {
        let store = SessionStore::new(storage);
        let session = store.load();
        Self {
            client: TripShareClient::new(config.api_base_url()),
            transport,
            store,
            shell,
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// API handle bound to the live session.
    pub fn api(&self) -> Api<'_, T> {
        Api::new(&self.client, &self.transport, &self.session)
    }

    pub fn shell(&self) -> &H {
        &self.shell
    }

    pub fn shell_mut(&mut self) -> &mut H {
        &mut self.shell
    }

    pub fn store(&self) -> &SessionStore<S> {
        &self.store
    }

    /// Submit the login form. On success the token and user are persisted and
    /// the shell is sent to the dashboard; on failure the shell is notified
    /// and the session is left untouched.
    pub fn login(&mut self, form: &LoginForm) -> bool {
        let result = self.api().login(&form.email, &form.password);
        let session = match result {
            Ok(response) => response.into_session(),
            Err(err) => {
                warn!(error = %err, "login failed");
                self.report_error(&err, LOGIN_FAILED);
                return false;
            }
        };
        if let Err(err) = self.store.save(&session) {
            warn!(error = %err, "failed to persist session");
            self.shell.notify(&err.to_string());
            return false;
        }
        info!(user_id = %session.user_id().unwrap_or_default(), "logged in");
        self.session = session;
        self.shell.navigate(Page::Dashboard);
        true
    }

    /// Create an account. Does not log in.
    pub fn signup(&mut self, form: &SignupForm) -> Option<Value> {
        let result = self.api().signup(&form.email, &form.password);
        match result {
            Ok(user) => Some(user),
            Err(err) => {
                warn!(error = %err, "signup failed");
                self.report_error(&err, SIGNUP_FAILED);
                None
            }
        }
    }

    /// Wipe the session store and return to the entry page.
    pub fn logout(&mut self) -> Result<(), StorageError> {
        let cleared = self.store.clear();
        self.session = Session::default();
        info!("logged out");
        self.shell.navigate(Page::Entry);
        cleared
    }

    /// Redirect to the entry page when nobody is logged in. Returns whether
    /// the current page may stay.
    pub fn require_auth(&mut self) -> bool {
        if self.session.is_authenticated() || self.shell.current_page() == Page::Entry {
            return true;
        }
        self.shell.navigate(Page::Entry);
        false
    }

    /// Show `err` to the user, or `fallback` when it carries no readable text.
    pub fn report_error(&mut self, err: &ApiError, fallback: &str) {
        let message = err.user_message().unwrap_or_else(|| fallback.to_string());
        self.shell.notify(&message);
    }
}
