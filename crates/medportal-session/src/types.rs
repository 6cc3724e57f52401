//! Request and response types exchanged with the REST collaborator.
//!
//! Identity and profile payloads keep unknown fields in an `extra` map so
//! that data round-trips through the session store without loss.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::role::{Portal, Role};

/// Field names that may carry the bearer token in an authentication response.
const TOKEN_FIELDS: [&str; 5] = ["token", "accessToken", "access_token", "access", "key"];

/// Accept ids sent either as JSON strings or numbers.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accept text sent as a string, number or boolean. `null` reads as empty.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

/// Accept `true`/`false`, `"true"`/`"false"` or `1`/`0`. Anything else reads as false.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    })
}

/// A missing, `null` or non-string role is unrecognized.
fn lenient_role<'de, D>(deserializer: D) -> Result<Role, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Role::parse(&s),
        _ => unrecognized_role(),
    })
}

fn unrecognized_role() -> Role {
    Role::Other(String::new())
}

/// Unwrap a `{ "data": resource }` envelope. Any other value is returned as is.
pub fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.len() == 1 && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

// ─── Authentication ─────────────────────────────────────────────────

/// Request body for `POST /jwt/auth`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// What a user fills in on the registration screen.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub country: Option<String>,
}

/// Request body for `POST /jwt/register`.
///
/// The role is always the bridge role; see [`RegisterRequest::from_form`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl RegisterRequest {
    pub fn from_form(form: &RegistrationForm) -> Self {
        Self {
            email: form.email.clone(),
            password: form.password.clone(),
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
            phone: form.phone.clone(),
            role: Role::User,
            country: form.country.clone(),
        }
    }
}

/// Identity payload of an account, as last reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub first_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone: String,
    #[serde(default = "unrecognized_role", deserialize_with = "lenient_role")]
    pub role: Role,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_verified: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Build the identity from an authentication response.
    ///
    /// Looks for a nested `user` object, then a `data` envelope (itself
    /// possibly holding `user`), and finally falls back to the response's
    /// top-level fields.
    pub fn from_auth_response(response: &Value) -> Self {
        let candidates = [
            response.get("user"),
            response.get("data").and_then(|d| d.get("user")),
            response.get("data"),
        ];
        let nested = candidates
            .into_iter()
            .flatten()
            .find(|v| v.is_object() && (v.get("email").is_some() || v.get("role").is_some()));

        let source = nested.unwrap_or(response);
        let mut user: UserRecord = match serde_json::from_value(source.clone()) {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!("authentication response carries no usable identity: {}", e);
                UserRecord::empty()
            }
        };
        for field in TOKEN_FIELDS {
            user.extra.remove(field);
        }
        user.extra.remove("user");
        user.extra.remove("data");
        user
    }

    fn empty() -> Self {
        Self {
            id: None,
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            phone: String::new(),
            role: unrecognized_role(),
            is_active: false,
            is_verified: false,
            extra: Map::new(),
        }
    }
}

/// Find the bearer token in an authentication response.
///
/// Checks the top level first, then a `data` envelope.
pub fn extract_token(response: &Value) -> Option<String> {
    let scopes = [Some(response), response.get("data")];
    scopes.into_iter().flatten().find_map(|scope| {
        TOKEN_FIELDS.iter().find_map(|field| {
            scope
                .get(*field)
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        })
    })
}

/// Value persisted under the `authData` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthData {
    pub token: String,
    pub user: UserRecord,
}

// ─── Role profiles ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoctorProfile {
    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaboratoryProfile {
    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Role-specific extension of an identity.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleProfile {
    Patient(PatientProfile),
    Doctor(DoctorProfile),
    Laboratory(LaboratoryProfile),
}

impl RoleProfile {
    pub fn role(&self) -> Role {
        match self {
            Self::Patient(_) => Role::Patient,
            Self::Doctor(_) => Role::Doctor,
            Self::Laboratory(_) => Role::Laboratory,
        }
    }
}

/// Identity plus at most one role profile, as published to consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedProfile {
    pub user: UserRecord,
    pub role_profile: Option<RoleProfile>,
}

impl CombinedProfile {
    /// Identity only, no role profile.
    pub fn bare(user: UserRecord) -> Self {
        Self {
            user,
            role_profile: None,
        }
    }

    pub fn patient(&self) -> Option<&PatientProfile> {
        match &self.role_profile {
            Some(RoleProfile::Patient(p)) => Some(p),
            _ => None,
        }
    }

    pub fn doctor(&self) -> Option<&DoctorProfile> {
        match &self.role_profile {
            Some(RoleProfile::Doctor(p)) => Some(p),
            _ => None,
        }
    }

    pub fn laboratory(&self) -> Option<&LaboratoryProfile> {
        match &self.role_profile {
            Some(RoleProfile::Laboratory(p)) => Some(p),
            _ => None,
        }
    }
}

/// One entry of a patient's medical history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalRecord {
    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Role-specific data submitted on the profile-completion screen.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileCompletion {
    Patient(PatientProfile),
    Doctor(DoctorProfile),
    Laboratory(LaboratoryProfile),
}

impl ProfileCompletion {
    pub fn portal(&self) -> Portal {
        match self {
            Self::Patient(_) => Portal::Patient,
            Self::Doctor(_) => Portal::Doctor,
            Self::Laboratory(_) => Portal::Lab,
        }
    }

    /// Build a completion for `portal` from loose fields, e.g. `key=value`
    /// pairs collected on a command line.
    pub fn from_fields(portal: Portal, fields: Map<String, Value>) -> Result<Self, serde_json::Error> {
        let value = Value::Object(fields);
        Ok(match portal {
            Portal::Doctor => Self::Doctor(serde_json::from_value(value)?),
            Portal::Lab => Self::Laboratory(serde_json::from_value(value)?),
            Portal::Patient => Self::Patient(serde_json::from_value(value)?),
            Portal::Admin => {
                return Err(serde::de::Error::custom("admin accounts have no role profile"))
            }
        })
    }

    pub fn to_body(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Patient(p) => serde_json::to_value(p),
            Self::Doctor(p) => serde_json::to_value(p),
            Self::Laboratory(p) => serde_json::to_value(p),
        }
    }
}
