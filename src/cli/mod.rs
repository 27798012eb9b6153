//! CLI for the taskr command-line interface.
//!
//! With no subcommand the binary starts the server; subcommands act as
//! a client against a running server:
//! - `signup` / `login` / `logout` - manage the stored session
//! - `todos list|add|edit|done|rm` - work with your task list
//! - `profile update` - change name, email, or password

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::client::{ApiClient, StoredSession};
use crate::db::{
    CreateTodoRequest, SigninRequest, SignupRequest, UpdateProfileRequest, UpdateTodoRequest,
};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "taskr")]
#[command(author, version, about = "A small self-hosted to-do list server", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "taskr.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// API URL to connect to (client subcommands only)
    #[arg(long, env = "TASKR_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an account and sign in
    Signup {
        /// Display name
        #[arg(long)]
        name: String,
        /// Email address
        #[arg(long)]
        email: String,
        /// Password (can also be set via TASKR_PASSWORD env var)
        #[arg(long, env = "TASKR_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign in and store the session locally
    Login {
        /// Email address
        #[arg(long)]
        email: String,
        /// Password (can also be set via TASKR_PASSWORD env var)
        #[arg(long, env = "TASKR_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Remove the stored session
    Logout,

    /// Task management commands
    #[command(subcommand)]
    Todos(TodosCommands),

    /// Profile management commands
    #[command(subcommand)]
    Profile(ProfileCommands),
}

/// Todos subcommands
#[derive(Subcommand, Debug)]
pub enum TodosCommands {
    /// List your todos
    List,
    /// Add a new todo
    Add {
        /// Todo title
        title: String,
        /// Optional description
        #[arg(short, long)]
        description: Option<String>,
        /// Initial status (pending, in progress, done, completed)
        #[arg(short, long, default_value = "pending")]
        status: String,
    },
    /// Edit fields of a todo
    Edit {
        /// Todo ID
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(short, long)]
        description: Option<String>,
        /// New status (pending, in progress, done, completed)
        #[arg(short, long)]
        status: Option<String>,
    },
    /// Mark a todo as done
    Done {
        /// Todo ID
        id: String,
    },
    /// Delete a todo
    Rm {
        /// Todo ID
        id: String,
    },
}

/// Profile subcommands
#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// Update name, email, or password
    Update {
        /// New display name
        #[arg(long)]
        name: Option<String>,
        /// New email address
        #[arg(long)]
        email: Option<String>,
        /// New password
        #[arg(long)]
        password: Option<String>,
    },
}

/// Run a CLI command
pub async fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Signup {
            name,
            email,
            password,
        }) => cmd_signup(cli, name, email, password).await,
        Some(Commands::Login { email, password }) => cmd_login(cli, email, password).await,
        Some(Commands::Logout) => cmd_logout(),
        Some(Commands::Todos(cmd)) => cmd_todos(cli, cmd).await,
        Some(Commands::Profile(ProfileCommands::Update {
            name,
            email,
            password,
        })) => cmd_profile_update(cli, name, email, password).await,
        None => {
            // No subcommand means start the server - this is handled in main.rs
            Ok(())
        }
    }
}

/// Load the stored session, failing with a pointer to `login` when it
/// is missing or expired
fn require_session() -> Result<StoredSession> {
    let session = match StoredSession::load()? {
        Some(session) => session,
        None => bail!("Not signed in. Run `taskr login` first."),
    };

    if !session.is_valid() {
        bail!("Session expired. Run `taskr login` again.");
    }

    Ok(session)
}

fn authed_client(cli: &Cli) -> Result<ApiClient> {
    let session = require_session()?;
    ApiClient::new(&cli.api_url, Some(&session.token))
}

async fn cmd_signup(cli: &Cli, name: &str, email: &str, password: &str) -> Result<()> {
    let client = ApiClient::new(&cli.api_url, None)?;

    let auth = client
        .signup(&SignupRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        })
        .await?;

    StoredSession {
        token: auth.token,
        expires_at: auth.expires_at.clone(),
    }
    .save()?;

    println!("[OK] Signed up as {} ({})", auth.user.name, auth.user.email);
    println!("Session valid until {}", auth.expires_at);
    Ok(())
}

async fn cmd_login(cli: &Cli, email: &str, password: &str) -> Result<()> {
    let client = ApiClient::new(&cli.api_url, None)?;

    let auth = client
        .signin(&SigninRequest {
            email: email.to_string(),
            password: password.to_string(),
        })
        .await?;

    StoredSession {
        token: auth.token,
        expires_at: auth.expires_at.clone(),
    }
    .save()?;

    println!("[OK] Signed in as {} ({})", auth.user.name, auth.user.email);
    println!("Session valid until {}", auth.expires_at);
    Ok(())
}

fn cmd_logout() -> Result<()> {
    StoredSession::clear().context("Failed to remove stored session")?;
    println!("Signed out.");
    Ok(())
}

async fn cmd_todos(cli: &Cli, cmd: &TodosCommands) -> Result<()> {
    let client = authed_client(cli)?;

    match cmd {
        TodosCommands::List => {
            let todos = client.list_todos().await?;

            if todos.is_empty() {
                println!("No todos found.");
                return Ok(());
            }

            println!();
            println!(
                "{:<36}  {:<40}  {:<12}  {:<25}",
                "ID", "TITLE", "STATUS", "UPDATED"
            );
            println!("{}", "-".repeat(119));

            for todo in todos {
                println!(
                    "{:<36}  {:<40}  {:<12}  {:<25}",
                    todo.id,
                    truncate(&todo.title, 40),
                    todo.status,
                    truncate(&todo.updated_at, 25)
                );
            }

            println!();
        }
        TodosCommands::Add {
            title,
            description,
            status,
        } => {
            let todo = client
                .create_todo(&CreateTodoRequest {
                    title: title.clone(),
                    description: description.clone(),
                    status: status.clone(),
                })
                .await?;
            println!("[OK] Created todo {} ({})", todo.id, todo.title);
        }
        TodosCommands::Edit {
            id,
            title,
            description,
            status,
        } => {
            if title.is_none() && description.is_none() && status.is_none() {
                bail!("Nothing to update. Pass --title, --description, or --status.");
            }
            let todo = client
                .update_todo(
                    id,
                    &UpdateTodoRequest {
                        title: title.clone(),
                        description: description.clone(),
                        status: status.clone(),
                    },
                )
                .await?;
            println!("[OK] Updated todo {} ({})", todo.id, todo.status);
        }
        TodosCommands::Done { id } => {
            let todo = client
                .update_todo(
                    id,
                    &UpdateTodoRequest {
                        status: Some("done".to_string()),
                        ..Default::default()
                    },
                )
                .await?;
            println!("[OK] Marked todo {} as done", todo.id);
        }
        TodosCommands::Rm { id } => {
            client.delete_todo(id).await?;
            println!("[OK] Deleted todo {}", id);
        }
    }

    Ok(())
}

async fn cmd_profile_update(
    cli: &Cli,
    name: &Option<String>,
    email: &Option<String>,
    password: &Option<String>,
) -> Result<()> {
    if name.is_none() && email.is_none() && password.is_none() {
        bail!("Nothing to update. Pass --name, --email, or --password.");
    }

    let client = authed_client(cli)?;

    let user = client
        .update_profile(&UpdateProfileRequest {
            name: name.clone(),
            email: email.clone(),
            password: password.clone(),
        })
        .await?;

    println!("[OK] Profile updated for {} ({})", user.name, user.email);
    Ok(())
}

/// Truncate a string for fixed-width table output
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
