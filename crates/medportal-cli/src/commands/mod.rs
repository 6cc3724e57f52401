pub mod complete_profile;
pub mod login;
pub mod logout;
pub mod register;
pub mod reload;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use medportal_session::{
    route, ApiTransport, ClientOptions, FileStorage, HttpApi, Screen, SessionError,
    SessionManager, SessionSnapshot, SessionStore,
};

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Get the config directory for the session file.
fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".medportal")
}

pub fn default_session_file() -> PathBuf {
    config_dir().join("session.json")
}

/// Everything a command needs: a session manager over the session file.
pub struct Context {
    pub session: SessionManager,
    pub session_file: PathBuf,
}

impl Context {
    pub fn open(api_url: Option<String>, session_file: Option<PathBuf>) -> Self {
        let mut options = ClientOptions::from_env();
        if let Some(url) = api_url {
            options.base_url = url;
        }
        tracing::debug!(base_url = %options.base_url, "using API");
        let session_file = session_file.unwrap_or_else(default_session_file);
        Self::with_api(Arc::new(HttpApi::new(options)), session_file)
    }

    pub fn with_api(api: Arc<dyn ApiTransport>, session_file: PathBuf) -> Self {
        let storage = Arc::new(FileStorage::new(session_file.clone()));
        Self {
            session: SessionManager::new(api, SessionStore::new(storage)),
            session_file,
        }
    }

    /// Turn a failed operation into the message the session published for it.
    pub async fn failure(&self, err: SessionError) -> Box<dyn std::error::Error> {
        tracing::debug!("session operation failed: {:?}", err);
        match self.session.snapshot().await.error {
            Some(message) => message.into(),
            None => err.into(),
        }
    }

    /// Rehydrate the persisted session or fail with a hint to sign in.
    pub async fn require_session(&self) -> CommandResult {
        if self.session.rehydrate().await {
            Ok(())
        } else {
            Err("not signed in; run `medportal login` first".into())
        }
    }
}

pub fn screen_label(screen: &Screen) -> String {
    match screen {
        Screen::Loading => "loading".into(),
        Screen::Error(fatal) => format!("error: {}", fatal.message),
        Screen::ProfileCompletion(portal) => format!("{} profile completion", portal),
        Screen::AuthFlow => "sign in".into(),
        Screen::PatientDashboard => "patient dashboard".into(),
        Screen::DoctorDashboard => "doctor dashboard".into(),
        Screen::LaboratoryDashboard => "laboratory dashboard".into(),
        Screen::AdminDashboard => "admin dashboard".into(),
        Screen::ProfileRequired(portal) => format!("{} profile required", portal),
    }
}

/// Print the success message and where the session now lands.
pub fn print_outcome(snapshot: &SessionSnapshot) {
    if let Some(success) = &snapshot.success {
        println!("{}", format!("✅ {}", success).green().bold());
    }
    if let Some(user) = &snapshot.user {
        println!("  Signed in as {} ({})", user.email.bold(), user.role);
    }

    let screen = route(snapshot);
    println!("  Screen:       {}", screen_label(&screen).cyan());
    match screen {
        Screen::ProfileCompletion(portal) | Screen::ProfileRequired(portal) => {
            println!();
            println!(
                "{}",
                format!(
                    "Complete your profile with `medportal complete-profile --portal {} --field key=value`",
                    portal
                )
                .dimmed()
            );
        }
        Screen::AuthFlow => {
            println!();
            println!("{}", "Sign in with `medportal login`".dimmed());
        }
        _ => {}
    }
}
