// `medportal register`: create a bridge account destined for a portal.

use clap::Args;
use colored::Colorize;
use medportal_session::{Portal, RegistrationForm};

use super::{print_outcome, CommandResult, Context};

#[derive(Args)]
pub struct RegisterArgs {
    #[arg(long)]
    email: String,

    #[arg(long)]
    first_name: String,

    #[arg(long)]
    last_name: String,

    #[arg(long)]
    phone: String,

    #[arg(long)]
    country: Option<String>,

    /// Account password (prompted twice when omitted)
    #[arg(long, env = "MEDPORTAL_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Portal the account is for: patient, doctor or lab
    #[arg(long, default_value = "patient")]
    portal: Portal,
}

impl RegisterArgs {
    fn form(&self, password: String) -> RegistrationForm {
        RegistrationForm {
            email: self.email.clone(),
            password,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            country: self.country.clone().filter(|c| !c.trim().is_empty()),
        }
    }
}

pub async fn run(ctx: &Context, args: RegisterArgs) -> CommandResult {
    println!();
    println!("{}", format!("📝 MedPortal {} registration", args.portal).bold());
    println!();

    if !args.portal.is_registrable() {
        return Err(format!("accounts cannot be registered into the {} space", args.portal).into());
    }

    let password = match args.password.clone() {
        Some(password) => password,
        None => dialoguer::Password::new()
            .with_prompt("Password")
            .with_confirmation("Repeat password", "Passwords don't match")
            .interact()?,
    };

    let form = args.form(password);
    if let Err(e) = ctx.session.register(&form, args.portal).await {
        return Err(ctx.failure(e).await);
    }

    print_outcome(&ctx.session.snapshot().await);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use medportal_session::{route, Endpoint, Screen};
    use medportal_test_utils::{fixtures, ScriptedApi};
    use std::sync::Arc;

    fn args(portal: Portal) -> RegisterArgs {
        RegisterArgs {
            email: "j@x.com".into(),
            first_name: "J".into(),
            last_name: "D".into(),
            phone: "+1".into(),
            country: Some(" ".into()),
            password: Some("pw".into()),
            portal,
        }
    }

    #[test]
    fn test_blank_country_is_dropped() {
        let form = args(Portal::Patient).form("pw".into());
        assert_eq!(form.country, None);
        assert_eq!(form.password, "pw");
    }

    #[tokio::test]
    async fn test_registration_awaits_completion() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new());
        api.respond_ok(Endpoint::Register, fixtures::register_response("tok-r", "j@x.com"));
        let ctx = Context::with_api(api.clone(), dir.path().join("session.json"));

        run(&ctx, args(Portal::Lab)).await.unwrap();

        let snapshot = ctx.session.snapshot().await;
        assert_eq!(route(&snapshot), Screen::ProfileCompletion(Portal::Lab));
        assert_eq!(api.profile_calls(), 0);
    }

    #[tokio::test]
    async fn test_admin_registration_is_refused_locally() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(ScriptedApi::new());
        let ctx = Context::with_api(api.clone(), dir.path().join("session.json"));

        assert!(run(&ctx, args(Portal::Admin)).await.is_err());
        assert!(api.requests().is_empty());
    }
}
