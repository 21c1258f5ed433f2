//! CLI commands

use actalog_client::routes::{self, Navigation};
use actalog_client::types::{RegisterRequest, UpdateProfileRequest};
use actalog_client::{ApiRequest, ClientConfig, FileStorage, Gateway, SessionStore, User};
use anyhow::{Result, anyhow, bail};
use clap::Subcommand;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config;
use crate::navigator::TerminalNavigator;

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the session
    Login {
        email: String,

        #[arg(long, env = "ACTALOG_PASSWORD", hide_env_values = true)]
        password: String,

        /// Keep the session renewable with a refresh token
        #[arg(long)]
        remember_me: bool,
    },

    /// Create an account and log in as it
    Register {
        name: String,

        email: String,

        #[arg(long, env = "ACTALOG_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Revoke the refresh token and forget the session
    Logout,

    /// Exchange the stored refresh token for a new access token
    Refresh,

    /// Show the locally stored session
    Whoami,

    /// Show the profile, or update it when any field is given
    Profile {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        /// Birthday as YYYY-MM-DD
        #[arg(long)]
        birthday: Option<String>,
    },

    /// Request a password reset email
    ForgotPassword { email: String },

    /// Set a new password using the token from a reset email
    ResetPassword {
        token: String,

        #[arg(long, env = "ACTALOG_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Confirm an email address
    VerifyEmail { token: String },

    /// Send the verification email again
    ResendVerification { email: String },

    /// GET an API path with the stored session and print the JSON response
    Get {
        /// Path such as /api/workouts
        path: String,
    },

    /// Check whether the stored session may open an application route
    Route { path: String },
}

impl Commands {
    pub async fn execute(self, client_config: &ClientConfig, state_dir: &Path) -> Result<()> {
        let storage = FileStorage::open(config::session_path(state_dir))?;
        let gateway = Gateway::builder()
            .config(client_config)
            .storage(Arc::new(storage))
            .navigator(Arc::new(TerminalNavigator))
            .build()?;
        let store = SessionStore::init(gateway.clone()).await;

        match self {
            Self::Login {
                email,
                password,
                remember_me,
            } => {
                let ok = store.login(&email, &password, remember_me).await;
                succeeded(&store, ok, "Login failed")?;
                print_greeting(&store);
                if remember_me {
                    println!("Session will be renewed automatically");
                }
                Ok(())
            }
            Self::Register {
                name,
                email,
                password,
            } => {
                let request = RegisterRequest {
                    name,
                    email,
                    password,
                };
                let ok = store.register(&request).await;
                succeeded(&store, ok, "Registration failed")?;
                print_greeting(&store);
                Ok(())
            }
            Self::Logout => {
                store.logout().await;
                println!("Logged out");
                Ok(())
            }
            Self::Refresh => {
                if store.refresh_token().is_none() {
                    bail!("No refresh token stored; log in with --remember-me");
                }
                let ok = store.refresh_access_token().await;
                succeeded(&store, ok, "Refresh failed")?;
                println!("Access token renewed");
                Ok(())
            }
            Self::Whoami => {
                match store.user().filter(|_| store.is_authenticated()) {
                    Some(user) => print_user(&user),
                    None => println!("Not logged in"),
                }
                Ok(())
            }
            Self::Profile {
                name,
                email,
                birthday,
            } => {
                let updates = UpdateProfileRequest {
                    name,
                    email,
                    birthday,
                };
                let ok = if updates.is_empty() {
                    store.fetch_profile().await
                } else {
                    store.update_profile(&updates).await
                };
                succeeded(&store, ok, "Profile request failed")?;
                if let Some(user) = store.user() {
                    print_user(&user);
                }
                Ok(())
            }
            Self::ForgotPassword { email } => {
                let response = gateway.forgot_password(&email).await?;
                println!("{}", response.message);
                Ok(())
            }
            Self::ResetPassword { token, password } => {
                let response = gateway.reset_password(&token, &password).await?;
                println!("{}", response.message);
                Ok(())
            }
            Self::VerifyEmail { token } => {
                let response = gateway.verify_email(&token).await?;
                println!("{}", response.message);
                Ok(())
            }
            Self::ResendVerification { email } => {
                let response = gateway.resend_verification(&email).await?;
                println!("{}", response.message);
                Ok(())
            }
            Self::Get { path } => {
                info!(path = %path, "Fetching");
                let value: serde_json::Value = gateway.execute(ApiRequest::get(path)).await?;
                println!("{}", serde_json::to_string_pretty(&value)?);
                Ok(())
            }
            Self::Route { path } => {
                match routes::guard(&path, store.is_authenticated()) {
                    Navigation::Proceed(route) => println!("{path}: open ({})", route.name),
                    Navigation::Redirect(target) => println!("{path}: redirect to {target}"),
                }
                Ok(())
            }
        }
    }
}

/// Turn a store operation's outcome into a result carrying its message
fn succeeded(store: &SessionStore, ok: bool, fallback: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(anyhow!(store.error().unwrap_or_else(|| fallback.to_string())))
    }
}

fn print_greeting(store: &SessionStore) {
    if let Some(user) = store.user() {
        println!("Logged in as {}", user.display_name());
    }
}

fn print_user(user: &User) {
    println!("{} (id {})", user.display_name(), user.id);
    if let Some(email) = &user.email {
        let verified = match user.email_verified {
            Some(true) => " (verified)",
            Some(false) => " (unverified)",
            None => "",
        };
        println!("email: {email}{verified}");
    }
    if let Some(role) = &user.role {
        println!("role: {role}");
    }
    if let Some(birthday) = &user.birthday {
        println!("birthday: {birthday}");
    }
}
