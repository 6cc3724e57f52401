// Scripted REST collaborator.
//
// Each endpoint has a queue of one-shot responses and an optional sticky
// response used once the queue is drained. Requests are recorded when they
// arrive, before any configured latency elapses, so in-flight calls count.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use medportal_session::{ApiRequest, ApiTransport, ClientError, Endpoint};
use serde_json::Value;

#[derive(Debug, Default)]
struct Script {
    queued: VecDeque<Result<Value, ClientError>>,
    sticky: Option<Result<Value, ClientError>>,
    latency: Option<Duration>,
}

/// In-memory [`ApiTransport`] for tests.
#[derive(Debug, Default)]
pub struct ScriptedApi {
    scripts: Mutex<HashMap<Endpoint, Script>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_script(&self, endpoint: Endpoint, f: impl FnOnce(&mut Script)) -> &Self {
        let mut scripts = self.scripts.lock().unwrap();
        f(scripts.entry(endpoint).or_default());
        self
    }

    /// Answer every call to `endpoint` with `result` (after queued responses).
    pub fn respond(&self, endpoint: Endpoint, result: Result<Value, ClientError>) -> &Self {
        self.with_script(endpoint, |s| s.sticky = Some(result))
    }

    pub fn respond_ok(&self, endpoint: Endpoint, body: Value) -> &Self {
        self.respond(endpoint, Ok(body))
    }

    /// Answer every call to `endpoint` with the error for an HTTP status.
    pub fn respond_status(&self, endpoint: Endpoint, status: u16) -> &Self {
        self.respond(endpoint, Err(ClientError::from_status(status, None, None)))
    }

    /// Answer the next call to `endpoint` with `result`, once.
    pub fn enqueue(&self, endpoint: Endpoint, result: Result<Value, ClientError>) -> &Self {
        self.with_script(endpoint, |s| s.queued.push_back(result))
    }

    /// Delay every response from `endpoint`.
    pub fn latency(&self, endpoint: Endpoint, delay: Duration) -> &Self {
        self.with_script(endpoint, |s| s.latency = Some(delay))
    }

    /// Number of calls made to `endpoint`.
    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.endpoint == endpoint)
            .count()
    }

    /// Number of calls to any role-profile endpoint.
    pub fn profile_calls(&self) -> usize {
        self.calls(Endpoint::PatientProfile)
            + self.calls(Endpoint::DoctorProfile)
            + self.calls(Endpoint::LaboratoryProfile)
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self, endpoint: Endpoint) -> Option<ApiRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.endpoint == endpoint)
            .cloned()
    }
}

#[async_trait]
impl ApiTransport for ScriptedApi {
    async fn send(&self, request: ApiRequest) -> Result<Value, ClientError> {
        let endpoint = request.endpoint;
        tracing::debug!(?endpoint, "scripted request");
        self.requests.lock().unwrap().push(request);

        let (result, latency) = {
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts.entry(endpoint).or_default();
            let result = script.queued.pop_front().or_else(|| script.sticky.clone());
            (result, script.latency)
        };

        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }

        result.unwrap_or_else(|| {
            Err(ClientError::Server {
                status: 501,
                message: format!("no scripted response for {} {}", endpoint.method(), endpoint.path()),
            })
        })
    }
}
