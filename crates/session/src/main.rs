//! Operator CLI for the back-office session.

#[cfg(feature = "http")]
use std::sync::Arc;

#[cfg(feature = "http")]
use anyhow::Context;
#[cfg(feature = "http")]
use backoffice_session::{
    GateOutcome, HttpAuthTransport, MatchMode, Permission, SessionConfig, SessionManager,
};
#[cfg(feature = "http")]
use clap::{Parser, Subcommand};

#[cfg(feature = "http")]
#[derive(Debug, Parser)]
#[command(name = "backoffice-session", version, about = "Sign in to the back-office API and inspect the stored session")]
struct Cli {
    /// Emit JSON logs instead of human-readable text.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[cfg(feature = "http")]
#[derive(Debug, Subcommand)]
enum Command {
    /// Exchange credentials for a session and store it.
    Login {
        identifier: String,
        #[arg(long, env = "BACKOFFICE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Clear the stored session and revoke it server-side.
    Logout,
    /// Restore the stored session and print who is signed in.
    Status,
    /// Ask the API to send a password reset email.
    ForgotPassword { email: String },
    /// Check whether the stored session holds the given capabilities.
    Check {
        #[arg(required = true)]
        capabilities: Vec<String>,
        /// Require any one capability instead of all of them.
        #[arg(long)]
        any: bool,
    },
}

#[cfg(feature = "http")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json_logs {
        backoffice_observability::LogFormat::Json
    } else {
        backoffice_observability::LogFormat::Text
    };
    backoffice_observability::init_with(format);

    let config = SessionConfig::from_env().context("invalid session configuration")?;
    let transport = HttpAuthTransport::from_config(&config).context("failed to build HTTP client")?;
    let manager = Arc::new(
        SessionManager::from_config(&config, Arc::new(transport)).with_context(|| {
            format!("failed to open credential store at {:?}", config.store_path)
        })?,
    );

    match cli.command {
        Command::Login { identifier, password } => {
            let user = manager.login(&identifier, &password).await?;
            println!("Signed in as {} <{}>", user.full_name, user.email);
            print_permissions(&manager.permissions().into_iter().collect::<Vec<_>>());
        }
        Command::Logout => {
            manager.logout().await;
            println!("Signed out");
        }
        Command::Status => match manager.restore_session().await {
            Some(session) => {
                println!(
                    "Signed in as {} <{}> (login: {}, id: {})",
                    session.user.full_name, session.user.email, session.user.login, session.user.id
                );
                print_permissions(&session.permissions.into_iter().collect::<Vec<_>>());
            }
            None => println!("Not signed in"),
        },
        Command::ForgotPassword { email } => {
            manager.request_password_reset(&email).await?;
            println!("If {email} belongs to an account, a reset link is on its way");
        }
        Command::Check { capabilities, any } => {
            manager.restore_session().await;

            let required: Vec<Permission> = capabilities.into_iter().map(Permission::from).collect();
            let mode = if any { MatchMode::Any } else { MatchMode::All };

            match manager.guard(&required, mode) {
                GateOutcome::Granted => println!("Granted"),
                GateOutcome::Denied { missing, .. } => {
                    let missing: Vec<String> = missing.iter().map(|p| p.to_string()).collect();
                    println!("Denied: missing {}", missing.join(", "));
                    std::process::exit(2);
                }
                GateOutcome::Redirect { to } => {
                    println!("Not signed in (entry point: {to})");
                    std::process::exit(3);
                }
                GateOutcome::Pending => {
                    println!("Session not resolved");
                    std::process::exit(3);
                }
            }
        }
    }

    Ok(())
}

#[cfg(feature = "http")]
fn print_permissions(permissions: &[Permission]) {
    if permissions.is_empty() {
        println!("Permissions: (none)");
        return;
    }

    println!("Permissions:");
    for permission in permissions {
        println!("  {permission}");
    }
}

#[cfg(not(feature = "http"))]
fn main() {
    eprintln!("This binary requires the 'http' feature to be enabled.");
    eprintln!("Build with: cargo build -p backoffice-session --features http");
    std::process::exit(1);
}
