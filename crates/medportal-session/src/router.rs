//! Top-level screen selection.
//!
//! [`route`] is a pure function of a [`SessionSnapshot`]; call it again
//! whenever the session broadcast fires.

use crate::role::{Portal, Role};
use crate::session::{FatalError, SessionSnapshot};

/// The top-level screen to mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Loading,
    Error(FatalError),
    ProfileCompletion(Portal),
    AuthFlow,
    PatientDashboard,
    DoctorDashboard,
    LaboratoryDashboard,
    AdminDashboard,
    /// The account's role profile is missing. The prompt's action is
    /// [`SessionManager::request_profile_completion`](crate::SessionManager::request_profile_completion)
    /// with this portal.
    ProfileRequired(Portal),
}

pub fn route(session: &SessionSnapshot) -> Screen {
    if session.is_loading_profile && session.token.is_some() {
        return Screen::Loading;
    }

    if let Some(fatal) = &session.fatal_error {
        return Screen::Error(fatal.clone());
    }

    if let Some(portal) = completion_target(session) {
        return Screen::ProfileCompletion(portal);
    }

    let Some(user) = session.user.as_ref().filter(|_| session.token.is_some()) else {
        return Screen::AuthFlow;
    };

    let profile = session.profile.as_ref();
    match &user.role {
        Role::Patient if profile.and_then(|p| p.patient()).is_some() => Screen::PatientDashboard,
        Role::Patient => Screen::ProfileRequired(Portal::Patient),
        Role::Doctor if profile.and_then(|p| p.doctor()).is_some() => Screen::DoctorDashboard,
        Role::Doctor => Screen::ProfileRequired(Portal::Doctor),
        Role::Laboratory if profile.and_then(|p| p.laboratory()).is_some() => {
            Screen::LaboratoryDashboard
        }
        Role::Laboratory => Screen::ProfileRequired(Portal::Lab),
        Role::Admin => Screen::AdminDashboard,
        Role::User | Role::Other(_) => {
            Screen::ProfileRequired(session.pending_role.unwrap_or(Portal::Patient))
        }
    }
}

fn completion_target(session: &SessionSnapshot) -> Option<Portal> {
    session.token.as_ref()?;
    if session.needs_profile_completion {
        if let Some(pending) = session.pending_role {
            return Some(pending);
        }
    }
    session.completion_request
}

/// Unauthenticated navigation: `RoleSelection → Login ⇄ Register`.
///
/// Transitions happen only on explicit user navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthFlow {
    #[default]
    RoleSelection,
    Login(Portal),
    Register(Portal),
}

impl AuthFlow {
    pub fn select_portal(self, portal: Portal) -> Self {
        match self {
            Self::RoleSelection => Self::Login(portal),
            other => other,
        }
    }

    pub fn show_register(self) -> Self {
        match self {
            Self::Login(portal) if portal.is_registrable() => Self::Register(portal),
            other => other,
        }
    }

    pub fn show_login(self) -> Self {
        match self {
            Self::Register(portal) => Self::Login(portal),
            other => other,
        }
    }

    pub fn back(self) -> Self {
        Self::RoleSelection
    }

    pub fn portal(&self) -> Option<Portal> {
        match self {
            Self::RoleSelection => None,
            Self::Login(portal) | Self::Register(portal) => Some(*portal),
        }
    }
}
