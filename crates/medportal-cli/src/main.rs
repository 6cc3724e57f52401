use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

/// MedPortal CLI: sign in to the patient, doctor, laboratory and admin portals
#[derive(Parser)]
#[command(name = "medportal", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// API server URL (overrides MEDPORTAL_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Where the session is persisted (default: ~/.medportal/session.json)
    #[arg(long, global = true, env = "MEDPORTAL_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login(commands::login::LoginArgs),

    /// Create an account for a portal
    Register(commands::register::RegisterArgs),

    /// Submit the role profile of a newly registered account
    CompleteProfile(commands::complete_profile::CompleteProfileArgs),

    /// Show the current session and the screen it routes to
    Status(commands::status::StatusArgs),

    /// Fetch the role profile again
    Reload,

    /// Sign out and remove the persisted session
    Logout,
}

#[tokio::main]
async fn main() {
    medportal_session::env::init_logger();
    let cli = Cli::parse();
    let ctx = commands::Context::open(cli.api_url, cli.session_file);

    let result = match cli.command {
        Commands::Login(args) => commands::login::run(&ctx, args).await,
        Commands::Register(args) => commands::register::run(&ctx, args).await,
        Commands::CompleteProfile(args) => commands::complete_profile::run(&ctx, args).await,
        Commands::Status(args) => commands::status::run(&ctx, args).await,
        Commands::Reload => commands::reload::run(&ctx).await,
        Commands::Logout => commands::logout::run(&ctx).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", colored::Colorize::red("error:"), e);
        std::process::exit(1);
    }
}
