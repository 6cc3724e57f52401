//! Screen selection from hand-built session snapshots.

use medportal_session::*;
use serde_json::json;

fn signed_out() -> SessionSnapshot {
    SessionSnapshot {
        phase: SessionPhase::Empty,
        token: None,
        user: None,
        profile: None,
        medical_records: Vec::new(),
        is_loading_profile: false,
        has_loaded_once: false,
        error: None,
        success: None,
        fatal_error: None,
        pending_role: None,
        needs_profile_completion: false,
        completion_request: None,
    }
}

fn signed_in(role: &str, role_profile: Option<RoleProfile>) -> SessionSnapshot {
    let user: UserRecord =
        serde_json::from_value(json!({"id": 1, "email": "a@b.com", "role": role})).unwrap();
    SessionSnapshot {
        phase: SessionPhase::Ready,
        token: Some("tok".into()),
        profile: Some(CombinedProfile {
            user: user.clone(),
            role_profile,
        }),
        user: Some(user),
        has_loaded_once: true,
        ..signed_out()
    }
}

fn fatal(message: &str) -> FatalError {
    FatalError {
        kind: FatalErrorKind::Application,
        message: message.into(),
    }
}

#[test]
fn signed_out_shows_auth_flow() {
    assert_eq!(route(&signed_out()), Screen::AuthFlow);
}

#[test]
fn identity_without_token_shows_auth_flow() {
    let mut snap = signed_in("patient", Some(RoleProfile::Patient(PatientProfile::default())));
    snap.token = None;
    assert_eq!(route(&snap), Screen::AuthFlow);
}

#[test]
fn dashboards_follow_role_and_profile() {
    let cases = [
        (
            "patient",
            RoleProfile::Patient(PatientProfile::default()),
            Screen::PatientDashboard,
        ),
        (
            "doctor",
            RoleProfile::Doctor(DoctorProfile::default()),
            Screen::DoctorDashboard,
        ),
        (
            "laboratory",
            RoleProfile::Laboratory(LaboratoryProfile::default()),
            Screen::LaboratoryDashboard,
        ),
    ];
    for (role, profile, screen) in cases {
        assert_eq!(route(&signed_in(role, Some(profile))), screen, "role {}", role);
    }
    assert_eq!(route(&signed_in("admin", None)), Screen::AdminDashboard);
}

#[test]
fn missing_profile_shows_prompt_for_the_role() {
    assert_eq!(
        route(&signed_in("patient", None)),
        Screen::ProfileRequired(Portal::Patient)
    );
    assert_eq!(
        route(&signed_in("doctor", None)),
        Screen::ProfileRequired(Portal::Doctor)
    );
    assert_eq!(
        route(&signed_in("laboratory", None)),
        Screen::ProfileRequired(Portal::Lab)
    );
}

#[test]
fn mismatched_profile_is_treated_as_missing() {
    let snap = signed_in("doctor", Some(RoleProfile::Patient(PatientProfile::default())));
    assert_eq!(route(&snap), Screen::ProfileRequired(Portal::Doctor));
}

#[test]
fn unknown_roles_fall_back_to_pending_portal() {
    assert_eq!(
        route(&signed_in("nurse", None)),
        Screen::ProfileRequired(Portal::Patient)
    );

    let mut snap = signed_in("user", None);
    snap.pending_role = Some(Portal::Lab);
    assert_eq!(route(&snap), Screen::ProfileRequired(Portal::Lab));
}

#[test]
fn bridge_flags_route_to_completion() {
    let mut snap = signed_in("user", None);
    snap.needs_profile_completion = true;
    snap.pending_role = Some(Portal::Doctor);
    assert_eq!(route(&snap), Screen::ProfileCompletion(Portal::Doctor));
}

#[test]
fn completion_flag_without_pending_role_is_ignored() {
    let mut snap = signed_in("user", None);
    snap.needs_profile_completion = true;
    assert_eq!(route(&snap), Screen::ProfileRequired(Portal::Patient));
}

#[test]
fn completion_request_needs_a_token() {
    let mut snap = signed_in("patient", None);
    snap.completion_request = Some(Portal::Patient);
    assert_eq!(route(&snap), Screen::ProfileCompletion(Portal::Patient));

    let mut snap = signed_out();
    snap.completion_request = Some(Portal::Patient);
    assert_eq!(route(&snap), Screen::AuthFlow);
}

#[test]
fn loading_wins_over_everything() {
    let mut snap = signed_in("patient", None);
    snap.is_loading_profile = true;
    snap.fatal_error = Some(fatal("boom"));
    snap.needs_profile_completion = true;
    snap.pending_role = Some(Portal::Patient);
    assert_eq!(route(&snap), Screen::Loading);
}

#[test]
fn loading_flag_without_token_is_not_loading() {
    let mut snap = signed_out();
    snap.is_loading_profile = true;
    assert_eq!(route(&snap), Screen::AuthFlow);
}

#[test]
fn fatal_error_wins_over_completion_and_dashboards() {
    let mut snap = signed_in("admin", None);
    snap.fatal_error = Some(fatal("storage unavailable"));
    snap.needs_profile_completion = true;
    snap.pending_role = Some(Portal::Patient);
    assert_eq!(route(&snap), Screen::Error(fatal("storage unavailable")));

    let mut snap = signed_out();
    snap.fatal_error = Some(FatalError {
        kind: FatalErrorKind::Auth,
        message: "session expired".into(),
    });
    assert!(matches!(route(&snap), Screen::Error(FatalError { kind: FatalErrorKind::Auth, .. })));
}

#[test]
fn completion_wins_over_dashboards() {
    let mut snap = signed_in("patient", Some(RoleProfile::Patient(PatientProfile::default())));
    snap.needs_profile_completion = true;
    snap.pending_role = Some(Portal::Patient);
    assert_eq!(route(&snap), Screen::ProfileCompletion(Portal::Patient));
}

#[test]
fn bridge_flags_without_a_token_show_auth_flow() {
    let mut snap = signed_out();
    snap.needs_profile_completion = true;
    snap.pending_role = Some(Portal::Patient);
    assert_eq!(route(&snap), Screen::AuthFlow);
}
