// `medportal login`: email/password sign-in into one of the portals.

use clap::Args;
use colored::Colorize;
use medportal_session::Portal;

use super::{print_outcome, CommandResult, Context};

#[derive(Args)]
pub struct LoginArgs {
    /// Account email
    #[arg(long)]
    email: String,

    /// Account password (prompted when omitted)
    #[arg(long, env = "MEDPORTAL_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Portal to enter: admin, patient, doctor or lab
    #[arg(long, default_value = "patient")]
    portal: Portal,

    /// Sign in again without asking when a session already exists
    #[arg(short, long)]
    yes: bool,
}

pub async fn run(ctx: &Context, args: LoginArgs) -> CommandResult {
    println!();
    println!("{}", format!("🔐 MedPortal {} sign-in", args.portal).bold());
    println!();

    if !args.yes && ctx.session.store().read_all().await.token.is_some() {
        let reauth = dialoguer::Confirm::new()
            .with_prompt("You're already signed in. Do you want to sign in again?")
            .default(false)
            .interact()?;

        if !reauth {
            println!("Login cancelled.");
            return Ok(());
        }
    }

    let password = match args.password {
        Some(password) => password,
        None => dialoguer::Password::new()
            .with_prompt("Password")
            .interact()?,
    };

    if let Err(e) = ctx.session.login(&args.email, &password, args.portal).await {
        return Err(ctx.failure(e).await);
    }

    print_outcome(&ctx.session.snapshot().await);
    Ok(())
}
