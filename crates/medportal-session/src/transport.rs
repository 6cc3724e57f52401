//! The REST collaborator seam.
//!
//! Everything the session core needs from the backend goes through
//! [`ApiTransport::send`]. [`HttpApi`](crate::HttpApi) implements it over
//! HTTP; tests substitute a scripted implementation.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ClientError;

/// HTTP method of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
        }
    }
}

/// Every collaborator call made by the session core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Authenticate,
    Register,
    PatientProfile,
    DoctorProfile,
    LaboratoryProfile,
    MedicalRecords,
    UpdatePatientProfile,
    UpdateDoctorProfile,
    UpdateLaboratoryProfile,
}

impl Endpoint {
    pub fn method(&self) -> HttpMethod {
        match self {
            Self::Authenticate | Self::Register => HttpMethod::Post,
            Self::PatientProfile
            | Self::DoctorProfile
            | Self::LaboratoryProfile
            | Self::MedicalRecords => HttpMethod::Get,
            Self::UpdatePatientProfile
            | Self::UpdateDoctorProfile
            | Self::UpdateLaboratoryProfile => HttpMethod::Put,
        }
    }

    /// Path relative to the API base path.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Authenticate => "/jwt/auth",
            Self::Register => "/jwt/register",
            Self::PatientProfile => "/patients/profile",
            Self::DoctorProfile => "/doctors/profile/me",
            Self::LaboratoryProfile => "/laboratories/profile/me",
            Self::MedicalRecords => "/patients/medical-records",
            Self::UpdatePatientProfile => "/patients/profile/me",
            Self::UpdateDoctorProfile => "/doctors/profile/me",
            Self::UpdateLaboratoryProfile => "/laboratories/profile/me",
        }
    }
}

/// A single call to the collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub endpoint: Endpoint,
    /// Bearer token, sent as `Authorization: Bearer <token>`.
    pub token: Option<String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            token: None,
            body: None,
        }
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Transport to the REST collaborator.
///
/// Implementations return the decoded JSON body on success and a typed
/// [`ClientError`] for every non-success status or transport failure.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<Value, ClientError>;
}
