use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

use portal_auth::config::{ConfigError, PortalConfig};
use portal_auth::error::AuthError;
use portal_auth::net::types::RegistrationRequest;
use portal_auth::services::auth::{AuthApi, AuthService};
use portal_auth::state::session::{SessionContext, SessionState};
use portal_auth::storage::{FileStorage, MemoryStorage, TokenStore};

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Auth(#[from] AuthError),
    #[error("not signed in")]
    NotSignedIn,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "portal-auth", about = "Member and admin portal session CLI")]
struct Cli {
    #[arg(long, env = "PORTAL_API_BASE_URL")]
    base_url: Option<String>,

    /// File backing remembered sessions.
    #[arg(long, env = "PORTAL_STORAGE_PATH")]
    storage_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Member login with an email address or phone number.
    Login {
        identifier: String,
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
        /// Save the session to the storage file. Without it the session
        /// lives only for this process and later commands start signed out.
        #[arg(long, default_value_t = false)]
        remember_me: bool,
    },
    AdminLogin {
        email: String,
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
        /// Save the session to the storage file. Without it the session
        /// lives only for this process and later commands start signed out.
        #[arg(long, default_value_t = false)]
        remember_me: bool,
    },
    Logout,
    /// Print the resolved session.
    Whoami,
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        other_names: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone_number: String,
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
        /// Extra registration fields as a JSON object.
        #[arg(long)]
        extra: Option<String>,
    },
    ForgotPassword {
        identifier: String,
    },
    ResetPassword {
        token: String,
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Exchange the stored refresh token for a new access token.
    Refresh,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = PortalConfig::from_env()?;
    if let Some(base_url) = cli.base_url.as_deref() {
        config.base_url = PortalConfig::new(base_url)?.base_url;
    }
    if let Some(path) = cli.storage_path {
        config.storage_path = path;
    }

    let tokens = Arc::new(TokenStore::new(
        Arc::new(FileStorage::new(config.storage_path.clone())),
        Arc::new(MemoryStorage::new()),
    ));
    let auth = Arc::new(AuthService::from_config(&config, tokens)?);
    let session = SessionContext::new(auth);
    session.initialize().await;

    match cli.command {
        Command::Login { identifier, password, remember_me } => {
            session.login(&identifier, &password, remember_me).await?;
            warn_if_transient(remember_me);
            print_json(&session_json(&session.snapshot()))
        }
        Command::AdminLogin { email, password, remember_me } => {
            session.admin_login(&email, &password, remember_me).await?;
            warn_if_transient(remember_me);
            print_json(&session_json(&session.snapshot()))
        }
        Command::Logout => {
            session.logout().await;
            print_json(&session_json(&session.snapshot()))
        }
        Command::Whoami => run_whoami(&session.snapshot()),
        Command::Register { first_name, last_name, other_names, email, phone_number, password, extra } => {
            let extra = match extra {
                Some(raw) => serde_json::from_str::<Map<String, Value>>(&raw)?,
                None => Map::new(),
            };
            let data = RegistrationRequest { first_name, last_name, other_names, email, phone_number, password, extra };
            let json = session.register(data).await?;
            print_json(&json)
        }
        Command::ForgotPassword { identifier } => {
            let json = session.auth().forgot_password(&identifier).await?;
            print_json(&json)
        }
        Command::ResetPassword { token, password } => {
            let json = session.auth().reset_password(&token, &password).await?;
            print_json(&json)
        }
        Command::Refresh => {
            session.auth().refresh().await?;
            println!("ok");
            Ok(())
        }
    }
}

fn warn_if_transient(remember_me: bool) {
    if !remember_me {
        tracing::warn!("session not saved; pass --remember-me to keep it for later commands");
    }
}

fn run_whoami(state: &SessionState) -> Result<(), CliError> {
    if !state.is_authenticated {
        return Err(CliError::NotSignedIn);
    }
    print_json(&session_json(state))
}

fn session_json(state: &SessionState) -> Value {
    json!({
        "isAuthenticated": state.is_authenticated,
        "isAdmin": state.is_admin,
        "user": state.user,
        "error": state.error,
    })
}

fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
