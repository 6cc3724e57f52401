//! Account roles and login portals.
//!
//! The backend reports a user's role as a free-form string. It is parsed into
//! [`Role`] exactly once, when the identity payload is deserialized, so the
//! rest of the crate never compares raw strings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role carried by a user account on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Patient,
    Doctor,
    Laboratory,
    Admin,
    /// Bridge role: the account exists but has not completed a role profile yet.
    User,
    /// Any role string this client does not recognize.
    Other(String),
}

impl Role {
    /// Parse a backend role string. Never fails; unknown values become [`Role::Other`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "patient" => Self::Patient,
            "doctor" => Self::Doctor,
            "laboratory" | "lab" => Self::Laboratory,
            "admin" => Self::Admin,
            "user" => Self::User,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
            Self::Laboratory => "laboratory",
            Self::Admin => "admin",
            Self::User => "user",
            Self::Other(raw) => raw,
        }
    }

    /// Whether accounts with this role own a role-specific profile.
    pub fn has_profile(&self) -> bool {
        matches!(self, Self::Patient | Self::Doctor | Self::Laboratory)
    }

    pub fn is_bridge(&self) -> bool {
        matches!(self, Self::User)
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The space a user picks before logging in or registering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Portal {
    Admin,
    Patient,
    Doctor,
    Lab,
}

/// Outcome of checking a portal against the role the backend reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalAccess {
    /// The account's role is the portal's role.
    Direct,
    /// The account still holds the bridge role and must complete a profile
    /// for the given portal.
    Bridge(Portal),
}

impl Portal {
    pub const ALL: [Portal; 4] = [Portal::Admin, Portal::Patient, Portal::Doctor, Portal::Lab];

    /// String form used for the persisted `pendingRole` key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Patient => "patient",
            Self::Doctor => "doctor",
            Self::Lab => "laboratory",
        }
    }

    /// Parse a stored `pendingRole` value or a command-line portal name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "patient" => Some(Self::Patient),
            "doctor" => Some(Self::Doctor),
            "laboratory" | "lab" => Some(Self::Lab),
            _ => None,
        }
    }

    /// The account role a completed profile in this portal results in.
    pub fn role(&self) -> Role {
        match self {
            Self::Admin => Role::Admin,
            Self::Patient => Role::Patient,
            Self::Doctor => Role::Doctor,
            Self::Lab => Role::Laboratory,
        }
    }

    /// Whether an account can be registered into this portal.
    pub fn is_registrable(&self) -> bool {
        !matches!(self, Self::Admin)
    }

    /// Check the portal chosen at login against the account's actual role.
    ///
    /// Only the patient portal accepts bridge accounts; doctor and laboratory
    /// bridging happens through registration.
    pub fn accepts(&self, actual: &Role) -> Option<PortalAccess> {
        match (self, actual) {
            (Self::Admin, Role::Admin)
            | (Self::Patient, Role::Patient)
            | (Self::Doctor, Role::Doctor)
            | (Self::Lab, Role::Laboratory) => Some(PortalAccess::Direct),
            (Self::Patient, Role::User) => Some(PortalAccess::Bridge(Self::Patient)),
            _ => None,
        }
    }
}

impl fmt::Display for Portal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Portal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown portal '{}'", s))
    }
}
