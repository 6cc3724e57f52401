// `medportal status`: show the persisted session and where it routes.

use std::path::Path;

use clap::Args;
use colored::Colorize;
use medportal_session::{route, RoleProfile, Screen, SessionPhase, SessionSnapshot};
use serde::Serialize;
use serde_json::Value;

use super::{screen_label, CommandResult, Context};

#[derive(Args)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(short, long)]
    json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport<'a> {
    session_file: &'a Path,
    authenticated: bool,
    phase: &'static str,
    email: Option<&'a str>,
    name: Option<String>,
    role: Option<String>,
    screen: String,
    pending_role: Option<String>,
    needs_profile_completion: bool,
    profile: Option<Value>,
    medical_records: usize,
    error: Option<&'a str>,
}

fn phase_label(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Empty => "signed out",
        SessionPhase::Authenticating => "authenticating",
        SessionPhase::Loading => "loading",
        SessionPhase::Ready => "ready",
    }
}

fn profile_json(profile: &RoleProfile) -> Option<Value> {
    let value = match profile {
        RoleProfile::Patient(p) => serde_json::to_value(p),
        RoleProfile::Doctor(p) => serde_json::to_value(p),
        RoleProfile::Laboratory(p) => serde_json::to_value(p),
    };
    value.ok()
}

fn report<'a>(snapshot: &'a SessionSnapshot, screen: &Screen, session_file: &'a Path) -> StatusReport<'a> {
    let user = snapshot.user.as_ref();
    StatusReport {
        session_file,
        authenticated: snapshot.is_authenticated(),
        phase: phase_label(snapshot.phase),
        email: user.map(|u| u.email.as_str()),
        name: user.map(|u| u.full_name()).filter(|n| !n.is_empty()),
        role: user.map(|u| u.role.to_string()),
        screen: screen_label(screen),
        pending_role: snapshot.pending_role.map(|p| p.to_string()),
        needs_profile_completion: snapshot.needs_profile_completion,
        profile: snapshot.role_profile().and_then(profile_json),
        medical_records: snapshot.medical_records.len(),
        error: snapshot.error.as_deref(),
    }
}

pub async fn run(ctx: &Context, args: StatusArgs) -> CommandResult {
    ctx.session.restore().await;
    let snapshot = ctx.session.snapshot().await;
    let screen = route(&snapshot);
    let report = report(&snapshot, &screen, &ctx.session_file);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!("{}", "MedPortal session".bold());
    println!("  Session file:   {}", report.session_file.display().to_string().dimmed());
    println!("  Status:         {}", report.phase);
    if let Some(email) = report.email {
        println!("  Email:          {}", email.bold());
    }
    if let Some(name) = &report.name {
        println!("  Name:           {}", name);
    }
    if let Some(role) = &report.role {
        println!("  Role:           {}", role);
    }
    if let Some(pending) = &report.pending_role {
        let state = if report.needs_profile_completion {
            "needs profile completion".yellow()
        } else {
            "completed".green()
        };
        println!("  Pending portal: {} ({})", pending, state);
    }
    if report.profile.is_some() {
        println!("  Records:        {}", report.medical_records);
    }
    println!("  Screen:         {}", report.screen.cyan());
    if let Some(error) = report.error {
        println!("  Last error:     {}", error.red());
    }
    println!();
    Ok(())
}
