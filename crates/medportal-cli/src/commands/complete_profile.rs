// `medportal complete-profile`: submit the role profile of a new account.

use clap::Args;
use medportal_session::{Portal, ProfileCompletion};
use serde_json::{Map, Value};

use super::{print_outcome, CommandResult, Context};

#[derive(Args)]
pub struct CompleteProfileArgs {
    /// Portal whose profile to submit (defaults to the pending one)
    #[arg(long)]
    portal: Option<Portal>,

    /// Profile field, repeatable (e.g. `--field blood_type=O+`)
    #[arg(short, long = "field", value_name = "KEY=VALUE")]
    fields: Vec<String>,
}

/// Parse `key=value` pairs into a JSON object of strings.
fn parse_fields(raw: &[String]) -> Result<Map<String, Value>, String> {
    raw.iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("invalid field '{}', expected KEY=VALUE", pair))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(format!("invalid field '{}', empty key", pair));
            }
            Ok((key.to_string(), Value::String(value.trim().to_string())))
        })
        .collect()
}

pub async fn run(ctx: &Context, args: CompleteProfileArgs) -> CommandResult {
    ctx.require_session().await?;
    let snapshot = ctx.session.snapshot().await;

    let current_role = snapshot.role();
    let portal = args
        .portal
        .or(snapshot.pending_role)
        .or_else(|| Portal::ALL.into_iter().find(|p| Some(&p.role()) == current_role))
        .ok_or("no profile is pending; pass --portal")?;

    let fields = parse_fields(&args.fields)?;
    let completion = ProfileCompletion::from_fields(portal, fields)?;
    if let Err(e) = ctx.session.complete_profile(&completion).await {
        return Err(ctx.failure(e).await);
    }

    print_outcome(&ctx.session.snapshot().await);
    Ok(())
}
