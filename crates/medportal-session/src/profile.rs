//! Role profile resolution.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{ClientError, ProfileFetchError};
use crate::role::Role;
use crate::transport::{ApiRequest, ApiTransport, Endpoint};
use crate::types::{
    unwrap_data, DoctorProfile, LaboratoryProfile, MedicalRecord, PatientProfile, RoleProfile,
};

/// Fetches role-specific profiles and a patient's medical records.
///
/// A profile that does not exist yet (404) or that the backend refuses to
/// serve (403) resolves to `Ok(None)`; every other failure is an error.
#[derive(Clone)]
pub struct ProfileLoader {
    api: Arc<dyn ApiTransport>,
}

impl ProfileLoader {
    pub fn new(api: Arc<dyn ApiTransport>) -> Self {
        Self { api }
    }

    /// Resolve the profile of `role`. Admin and bridge accounts have none
    /// and never cause a request.
    pub async fn fetch_role_profile(
        &self,
        token: &str,
        role: &Role,
    ) -> Result<Option<RoleProfile>, ProfileFetchError> {
        match self.try_fetch(token, role).await {
            Err(e) if e.is_access_denied() => {
                tracing::debug!(role = %role, "no {} profile yet: {}", role, e);
                Ok(None)
            }
            other => other,
        }
    }

    /// Like [`fetch_role_profile`](Self::fetch_role_profile) but reports
    /// 403/404 as errors.
    pub async fn try_fetch(
        &self,
        token: &str,
        role: &Role,
    ) -> Result<Option<RoleProfile>, ProfileFetchError> {
        let endpoint = match role {
            Role::Patient => Endpoint::PatientProfile,
            Role::Doctor => Endpoint::DoctorProfile,
            Role::Laboratory => Endpoint::LaboratoryProfile,
            Role::Admin | Role::User | Role::Other(_) => return Ok(None),
        };

        let body = self
            .api
            .send(ApiRequest::new(endpoint).bearer(token))
            .await
            .map_err(ProfileFetchError::from)?;
        let body = unwrap_data(body);
        if body.is_null() {
            return Err(ProfileFetchError::NotFound);
        }
        if !body.is_object() {
            return Err(ProfileFetchError::Malformed(format!(
                "expected a {} profile object",
                role
            )));
        }

        let malformed = |e: serde_json::Error| ProfileFetchError::Malformed(e.to_string());
        let profile = match role {
            Role::Patient => {
                RoleProfile::Patient(serde_json::from_value::<PatientProfile>(body).map_err(malformed)?)
            }
            Role::Doctor => {
                RoleProfile::Doctor(serde_json::from_value::<DoctorProfile>(body).map_err(malformed)?)
            }
            _ => RoleProfile::Laboratory(
                serde_json::from_value::<LaboratoryProfile>(body).map_err(malformed)?,
            ),
        };
        Ok(Some(profile))
    }

    /// Fetch the current patient's medical records, in server order.
    ///
    /// Records are supplementary: any failure is logged and yields an empty list.
    pub async fn fetch_medical_records(&self, token: &str) -> Vec<MedicalRecord> {
        match self.try_fetch_medical_records(token).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("failed to load medical records: {}", e);
                Vec::new()
            }
        }
    }

    async fn try_fetch_medical_records(&self, token: &str) -> Result<Vec<MedicalRecord>, ClientError> {
        let body = self
            .api
            .send(ApiRequest::new(Endpoint::MedicalRecords).bearer(token))
            .await?;
        let list = match unwrap_data(body) {
            Value::Null => return Ok(Vec::new()),
            // Paginated responses carry the page under `results`.
            Value::Object(mut map) if map.contains_key("results") => {
                map.remove("results").unwrap_or(Value::Null)
            }
            other => other,
        };
        serde_json::from_value(list).map_err(|e| ClientError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers every request with the same result and records endpoints.
    struct FixedApi {
        result: Result<Value, ClientError>,
        calls: Mutex<Vec<Endpoint>>,
    }

    impl FixedApi {
        fn new(result: Result<Value, ClientError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ApiTransport for FixedApi {
        async fn send(&self, request: ApiRequest) -> Result<Value, ClientError> {
            self.calls.lock().unwrap().push(request.endpoint);
            self.result.clone()
        }
    }

    #[tokio::test]
    async fn admin_and_bridge_roles_do_not_fetch() {
        let api = FixedApi::new(Ok(json!({})));
        let loader = ProfileLoader::new(api.clone());
        assert_eq!(loader.fetch_role_profile("t", &Role::Admin).await.unwrap(), None);
        assert_eq!(loader.fetch_role_profile("t", &Role::User).await.unwrap(), None);
        assert!(api.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn enveloped_doctor_profile() {
        let api = FixedApi::new(Ok(json!({"data": {"id": 3, "specialty": "cardiology"}})));
        let loader = ProfileLoader::new(api.clone());
        let profile = loader.fetch_role_profile("t", &Role::Doctor).await.unwrap();
        match profile {
            Some(RoleProfile::Doctor(d)) => {
                assert_eq!(d.id.as_deref(), Some("3"));
                assert_eq!(d.specialty.as_deref(), Some("cardiology"));
            }
            other => panic!("unexpected profile: {:?}", other),
        }
        assert_eq!(*api.calls.lock().unwrap(), vec![Endpoint::DoctorProfile]);
    }

    #[tokio::test]
    async fn missing_profile_is_none() {
        for status in [403, 404] {
            let api = FixedApi::new(Err(ClientError::from_status(status, None, None)));
            let loader = ProfileLoader::new(api);
            assert_eq!(loader.fetch_role_profile("t", &Role::Laboratory).await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn try_fetch_reports_missing_profile() {
        let api = FixedApi::new(Err(ClientError::from_status(404, None, None)));
        let err = ProfileLoader::new(api)
            .try_fetch("t", &Role::Patient)
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileFetchError::NotFound));
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let api = FixedApi::new(Err(ClientError::Network("connection refused".into())));
        let err = ProfileLoader::new(api)
            .fetch_role_profile("t", &Role::Patient)
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileFetchError::Transport(_)));
        assert!(!err.is_access_denied());
    }

    #[tokio::test]
    async fn non_object_profile_is_malformed() {
        let api = FixedApi::new(Ok(json!(["unexpected"])));
        let err = ProfileLoader::new(api)
            .fetch_role_profile("t", &Role::Patient)
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileFetchError::Malformed(_)));
    }

    #[tokio::test]
    async fn medical_records_shapes() {
        let api = FixedApi::new(Ok(json!([{"id": 1, "title": "Checkup"}, {"id": 2}])));
        let records = ProfileLoader::new(api).fetch_medical_records("t").await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title.as_deref(), Some("Checkup"));

        let api = FixedApi::new(Ok(json!({"data": {"results": [{"id": 9}]}})));
        let records = ProfileLoader::new(api).fetch_medical_records("t").await;
        assert_eq!(records[0].id.as_deref(), Some("9"));
    }

    #[tokio::test]
    async fn medical_records_failure_is_empty() {
        let api = FixedApi::new(Err(ClientError::from_status(500, None, None)));
        assert!(ProfileLoader::new(api).fetch_medical_records("t").await.is_empty());
    }
}
