//! Argument parsing and command dispatch for the `tripshare` binary.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use tripshare_core::{
    Api, ApiError, App, Config, FileStore, KeyValueStore, LoginForm, Page, PhotoFile, RuntimeEnv, Shell, SignupForm,
    Transport,
};

use crate::shell::TerminalShell;
use crate::transport::ReqwestTransport;

const SESSION_FILE: &str = "session.json";
const ENV_FILE: &str = "env.toml";
const REQUEST_FAILED: &str = "Request failed";

#[derive(Parser, Debug)]
#[command(name = "tripshare", version, about = "TripShare group photo sharing from the terminal")]
pub struct Cli {
    /// Backend base URL; wins over the env file and the built-in default
    #[arg(long, env = "TRIPSHARE_API_URL", global = true)]
    pub api_url: Option<String>,

    /// TOML file carrying an `API_URL` override [default: <state dir>/env.toml]
    #[arg(long, value_name = "PATH", global = true)]
    pub env_file: Option<PathBuf>,

    /// Directory holding the persisted session [default: <data dir>/tripshare]
    #[arg(long, value_name = "DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that the backend is reachable
    Ping,
    /// Create an account (does not log in)
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TRIPSHARE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log in and persist the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TRIPSHARE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the persisted session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Manage trip groups
    Groups {
        #[command(subcommand)]
        command: GroupCommands,
    },
    /// Manage photos in a group
    Photos {
        #[command(subcommand)]
        command: PhotoCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum GroupCommands {
    /// List groups you belong to
    List,
    /// Create a group
    Create {
        title: String,
        /// Lifetime in days; only the leading integer is used
        #[arg(long, default_value = "7")]
        days: String,
    },
    /// Ask to join a group by its share code
    Join { code: String },
    /// Show one group
    Show { id: String },
    /// Push a group's expiry further out
    Extend {
        id: String,
        #[arg(long)]
        days: String,
    },
    /// List a group's members
    Members { id: String },
    /// Approve (or with --reject, refuse) a pending member
    Approve {
        group_id: String,
        member_id: String,
        #[arg(long)]
        reject: bool,
    },
    /// Leave a group
    Leave { id: String },
    /// Delete a group you own
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum PhotoCommands {
    /// List a group's photos
    List { group_id: String },
    /// Upload an image file to a group
    Upload { group_id: String, file: PathBuf },
    /// Get time-limited download URLs
    Urls {
        #[arg(required = true)]
        photo_ids: Vec<String>,
    },
    /// Delete a photo
    Delete { photo_id: String },
}

impl Commands {
    /// The page a command runs on. Anything that needs a session lives on
    /// the dashboard.
    fn page(&self) -> Page {
        match self {
            Commands::Ping | Commands::Signup { .. } | Commands::Login { .. } | Commands::Logout => Page::Entry,
            Commands::Whoami | Commands::Groups { .. } | Commands::Photos { .. } => Page::Dashboard,
        }
    }
}

pub fn run() -> Result<ExitCode> {
    init_tracing();
    execute(Cli::parse())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

/// Run a parsed command line. Failures the user has already been shown come
/// back as a failing exit code; setup problems come back as errors.
pub fn execute(cli: Cli) -> Result<ExitCode> {
    let state_dir = resolve_state_dir(cli.state_dir.as_deref())?;
    let overrides = runtime_env(cli.api_url, cli.env_file.as_deref(), &state_dir)?;
    let config = Config::resolve(overrides.as_ref());
    tracing::debug!(base_url = config.api_base_url(), state_dir = %state_dir.display(), "resolved configuration");

    let storage = FileStore::open(state_dir.join(SESSION_FILE)).context("failed to open session store")?;
    let transport = ReqwestTransport::new().context("failed to build HTTP client")?;
    let shell = TerminalShell::new(cli.command.page());
    let mut app = App::new(&config, transport, storage, shell);
    dispatch(&mut app, cli.command)
}

fn resolve_state_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(dir) => Ok(dir.to_path_buf()),
        None => Ok(dirs::data_dir()
            .context("could not determine a data directory; pass --state-dir")?
            .join("tripshare")),
    }
}

/// `--api-url` first, then an explicit `--env-file`, then the default env
/// file if it exists.
fn runtime_env(api_url: Option<String>, env_file: Option<&Path>, state_dir: &Path) -> Result<Option<RuntimeEnv>> {
    if let Some(url) = api_url {
        return Ok(Some(RuntimeEnv::with_api_url(url)));
    }
    if let Some(path) = env_file {
        let env = RuntimeEnv::load(path).with_context(|| format!("failed to read {}", path.display()))?;
        return Ok(Some(env));
    }
    let default = state_dir.join(ENV_FILE);
    if !default.exists() {
        return Ok(None);
    }
    let env = RuntimeEnv::load(&default).with_context(|| format!("failed to read {}", default.display()))?;
    Ok(Some(env))
}

type CliApp<T, S> = App<T, S, TerminalShell>;

fn dispatch<T: Transport, S: KeyValueStore>(app: &mut CliApp<T, S>, command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Ping => finish(app, |api| api.ping()),
        Commands::Signup { email, password } => match app.signup(&SignupForm { email, password }) {
            Some(user) => {
                print_json(&user)?;
                Ok(ExitCode::SUCCESS)
            }
            None => Ok(ExitCode::FAILURE),
        },
        Commands::Login { email, password } => {
            if !app.login(&LoginForm {
                email: email.clone(),
                password,
            }) {
                return Ok(ExitCode::FAILURE);
            }
            println!("Logged in as {email}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Logout => {
            app.logout().context("failed to clear session")?;
            println!("Logged out");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Whoami => {
            if !signed_in(app) {
                return Ok(ExitCode::FAILURE);
            }
            finish(app, |api| api.me())
        }
        Commands::Groups { command } => {
            if !signed_in(app) {
                return Ok(ExitCode::FAILURE);
            }
            groups(app, command)
        }
        Commands::Photos { command } => {
            if !signed_in(app) {
                return Ok(ExitCode::FAILURE);
            }
            photos(app, command)
        }
    }
}

fn signed_in<T: Transport, S: KeyValueStore>(app: &mut CliApp<T, S>) -> bool {
    if app.require_auth() {
        return true;
    }
    app.shell_mut().notify("Not logged in. Run `tripshare login` first.");
    false
}

fn groups<T: Transport, S: KeyValueStore>(app: &mut CliApp<T, S>, command: GroupCommands) -> Result<ExitCode> {
    match command {
        GroupCommands::List => finish(app, |api| api.list_groups()),
        GroupCommands::Create { title, days } => finish(app, |api| api.create_group(&title, days.as_str())),
        GroupCommands::Join { code } => finish(app, |api| api.join_group(&code)),
        GroupCommands::Show { id } => finish(app, |api| api.get_group_details(&id)),
        GroupCommands::Extend { id, days } => finish(app, |api| api.extend_group(&id, days.as_str())),
        GroupCommands::Members { id } => finish(app, |api| api.list_members(&id)),
        GroupCommands::Approve {
            group_id,
            member_id,
            reject,
        } => finish(app, |api| api.approve_member(&group_id, &member_id, !reject)),
        GroupCommands::Leave { id } => finish(app, |api| api.leave_group(&id)),
        GroupCommands::Delete { id } => finish(app, |api| api.delete_group(&id)),
    }
}

fn photos<T: Transport, S: KeyValueStore>(app: &mut CliApp<T, S>, command: PhotoCommands) -> Result<ExitCode> {
    match command {
        PhotoCommands::List { group_id } => finish(app, |api| api.list_photos(&group_id)),
        PhotoCommands::Upload { group_id, file } => {
            let photo = PhotoFile::from_path(&file).with_context(|| format!("failed to read {}", file.display()))?;
            finish(app, move |api| api.upload_photo(&group_id, photo))
        }
        PhotoCommands::Urls { photo_ids } => finish(app, |api| api.get_signed_urls(photo_ids.as_slice())),
        PhotoCommands::Delete { photo_id } => finish(app, |api| api.delete_photo(&photo_id)),
    }
}

/// Run one API call, print its JSON on success, report through the shell on
/// failure.
fn finish<T, S>(
    app: &mut CliApp<T, S>,
    call: impl FnOnce(&Api<'_, T>) -> Result<Value, ApiError>,
) -> Result<ExitCode>
where
    T: Transport,
    S: KeyValueStore,
{
    let result = call(&app.api());
    match result {
        Ok(value) => {
            print_json(&value)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            app.report_error(&err, REQUEST_FAILED);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("tripshare").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn global_flags_apply_after_the_subcommand() {
        let cli = parse(&["groups", "list", "--api-url", "http://x", "--state-dir", "/tmp/t"]);
        assert_eq!(cli.api_url.as_deref(), Some("http://x"));
        assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/t")));
        assert!(matches!(
            cli.command,
            Commands::Groups {
                command: GroupCommands::List
            }
        ));
    }

    #[test]
    fn create_defaults_to_a_week() {
        let cli = parse(&["groups", "create", "Lisbon"]);
        let Commands::Groups {
            command: GroupCommands::Create { title, days },
        } = cli.command
        else {
            panic!("expected groups create");
        };
        assert_eq!(title, "Lisbon");
        assert_eq!(days, "7");
    }

    #[test]
    fn urls_needs_at_least_one_id() {
        assert!(Cli::try_parse_from(["tripshare", "photos", "urls"]).is_err());
    }

    #[test]
    fn protected_commands_run_on_the_dashboard() {
        assert_eq!(parse(&["whoami"]).command.page(), Page::Dashboard);
        assert_eq!(parse(&["photos", "list", "g"]).command.page(), Page::Dashboard);
        assert_eq!(parse(&["logout"]).command.page(), Page::Entry);
    }

    #[test]
    fn api_url_flag_beats_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join("custom.toml");
        std::fs::write(&env_file, "API_URL = \"http://from-file\"\n").unwrap();

        let env = runtime_env(Some("http://flag".to_string()), Some(&env_file), dir.path()).unwrap();
        assert_eq!(Config::resolve(env.as_ref()).api_base_url(), "http://flag");

        let env = runtime_env(None, Some(&env_file), dir.path()).unwrap();
        assert_eq!(Config::resolve(env.as_ref()).api_base_url(), "http://from-file");
    }

    #[test]
    fn missing_default_env_file_means_no_override() {
        let dir = tempfile::tempdir().unwrap();
        assert!(runtime_env(None, None, dir.path()).unwrap().is_none());

        std::fs::write(dir.path().join(ENV_FILE), "API_URL = \"http://state\"\n").unwrap();
        let env = runtime_env(None, None, dir.path()).unwrap();
        assert_eq!(Config::resolve(env.as_ref()).api_base_url(), "http://state");
    }

    #[test]
    fn explicit_env_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(runtime_env(None, Some(&dir.path().join("nope.toml")), dir.path()).is_err());
    }
}
