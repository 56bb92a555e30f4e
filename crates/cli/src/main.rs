//! Wellspring CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run migrations (application schema and session store)
//! ws-cli migrate
//!
//! # Create an admin, or promote and reset an existing account
//! ws-cli admin create -e admin@example.com -n "Admin Name" -p 'long passphrase'
//!
//! # Print or reset the store settings
//! ws-cli settings show
//! ws-cli settings reset
//!
//! # Run the cleanup job once
//! ws-cli cleanup
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ws-cli")]
#[command(author, version, about = "Wellspring CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Inspect or reset store settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Cancel stale orders, expire promo codes, prune tracker logs and
    /// place due subscription orders
    Cleanup,
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create an admin user, or promote an existing one
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,

        /// Login password
        #[arg(short, long)]
        password: String,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings as JSON
    Show,
    /// Restore the default settings
    Reset,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                name,
                password,
            } => {
                commands::admin::create_user(&email, &name, &password).await?;
            }
        },
        Commands::Settings { action } => match action {
            SettingsAction::Show => commands::settings::show().await?,
            SettingsAction::Reset => commands::settings::reset().await?,
        },
        Commands::Cleanup => commands::cleanup::run().await?,
    }
    Ok(())
}
