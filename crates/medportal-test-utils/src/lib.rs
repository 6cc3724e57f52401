// medportal-test-utils
//
// Test infrastructure for session flows:
// - `ScriptedApi`, an in-memory REST collaborator with per-endpoint scripted
//   responses, artificial latency and request recording
// - JSON fixtures shaped like the backend's payloads
// - `harness`, a session manager wired to both over memory storage

pub mod fixtures;
pub mod scripted_api;

pub use scripted_api::ScriptedApi;

use std::sync::Arc;

use medportal_session::{MemoryStorage, SessionManager, SessionStore};

/// A session manager backed by `api` and a fresh in-memory store.
///
/// The storage is returned as well so tests can inspect or corrupt raw keys.
pub fn harness(api: Arc<ScriptedApi>) -> (SessionManager, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let manager = SessionManager::new(api, SessionStore::new(storage.clone()));
    (manager, storage)
}
