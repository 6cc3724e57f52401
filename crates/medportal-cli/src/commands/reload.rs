// `medportal reload`: force a fresh fetch of the role profile.

use colored::Colorize;

use super::{print_outcome, CommandResult, Context};

pub async fn run(ctx: &Context) -> CommandResult {
    ctx.require_session().await?;
    ctx.session.load_profile(true).await;

    let snapshot = ctx.session.snapshot().await;
    if snapshot.token.is_none() {
        return Err("the session is no longer valid; sign in again".into());
    }

    print_outcome(&snapshot);
    if !snapshot.medical_records.is_empty() {
        println!();
        println!("{}", "Medical records".bold());
        for record in &snapshot.medical_records {
            println!(
                "  {:<12} {:<28} {}",
                record.date.as_deref().unwrap_or("-").dimmed(),
                record.title.as_deref().unwrap_or("(untitled)"),
                record.record_type.as_deref().unwrap_or("").dimmed()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use medportal_session::{ClientError, Endpoint, Portal};
    use medportal_test_utils::{fixtures, ScriptedApi};
    use std::sync::Arc;

    fn signed_in_api() -> Arc<ScriptedApi> {
        let api = Arc::new(ScriptedApi::new());
        api.respond_ok(
            Endpoint::Authenticate,
            fixtures::login_response("tok", "p@x.com", "patient"),
        )
        .respond_ok(Endpoint::PatientProfile, fixtures::patient_profile())
        .respond_ok(Endpoint::MedicalRecords, fixtures::medical_records());
        api
    }

    #[tokio::test]
    async fn test_reload_fetches_once_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("session.json");
        let api = signed_in_api();
        Context::with_api(api.clone(), file.clone())
            .session
            .login("p@x.com", "pw", Portal::Patient)
            .await
            .unwrap();

        run(&Context::with_api(api.clone(), file)).await.unwrap();
        assert_eq!(api.calls(Endpoint::PatientProfile), 2);
    }

    #[tokio::test]
    async fn test_reload_with_dead_server_signs_out() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("session.json");
        let api = signed_in_api();
        Context::with_api(api.clone(), file.clone())
            .session
            .login("p@x.com", "pw", Portal::Patient)
            .await
            .unwrap();

        api.respond(Endpoint::PatientProfile, Err(ClientError::Network("refused".into())));
        let ctx = Context::with_api(api, file);
        assert!(run(&ctx).await.is_err());
        assert!(ctx.session.store().read_all().await.token.is_none());
    }
}
