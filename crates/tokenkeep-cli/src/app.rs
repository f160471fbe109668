//! Command handling for the tokenkeep CLI.
//!
//! `App` wires the configured credential service and token store into a
//! `SessionManager`, hydrates it, and then runs one command against it.

use anyhow::{Context, Result};
use serde_json::json;
use tracing::debug;

use tokenkeep_core::{
    AccessDecision, AccessRequirement, ApiClient, AuthError, Config, FailureKind, FileTokenStore,
    KeyringTokenStore, LoginRequest, ProfileUpdate, RegisterRequest, Session, SessionManager,
    StoreBackend, TokenStore, User,
};

use crate::cli::Commands;

pub type Manager = SessionManager<ApiClient, Box<dyn TokenStore>>;

pub struct App {
    session: Manager,
}

impl App {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_store(config, open_store(config)?)
    }

    /// Build against an already opened token store.
    pub fn with_store(config: &Config, store: Box<dyn TokenStore>) -> Result<Self> {
        let api = ApiClient::from_config(config).context("Failed to create API client")?;
        debug!(api = %api.base_url(), store = ?config.store, "Session manager configured");

        Ok(Self {
            session: SessionManager::new(api, store),
        })
    }

    pub async fn run(&self, command: Commands) -> Result<()> {
        // Nothing may trust the session before hydration has finished.
        self.session.initialize().await;

        match command {
            Commands::Status { json } => self.status(json),
            Commands::Login { email } => {
                let password = prompt_password("Password: ")?;
                let user = self
                    .session
                    .login(&LoginRequest::new(email, password))
                    .await
                    .map_err(failure)?;
                println!("Logged in as {}", describe_user(&user));
                Ok(())
            }
            Commands::Register { username, email } => {
                let password = prompt_new_password("Password: ")?;
                let user = self
                    .session
                    .register(&RegisterRequest::new(username, email, password))
                    .await
                    .map_err(failure)?;
                println!("Registered and logged in as {}", describe_user(&user));
                Ok(())
            }
            Commands::Logout => {
                self.session.logout();
                println!("Logged out");
                Ok(())
            }
            Commands::Refresh => {
                self.session.refresh_access_token().await.map_err(failure)?;
                println!("Session refreshed");
                Ok(())
            }
            Commands::Passwd => {
                self.require_login()?;
                let old_password = prompt_password("Current password: ")?;
                let new_password = prompt_new_password("New password: ")?;
                self.session
                    .change_password(&old_password, &new_password)
                    .await
                    .map_err(failure)?;
                println!("Password changed");
                Ok(())
            }
            Commands::Profile { username, email } => {
                let update = ProfileUpdate {
                    username,
                    email,
                    role: None,
                };
                if update.is_empty() {
                    return Err(anyhow::anyhow!("Nothing to update: pass --username or --email"));
                }
                self.require_login()?;
                let user = self
                    .session
                    .update_profile(update)
                    .ok_or_else(|| failure(AuthError::Unauthenticated))?;
                println!("{}", describe_user(&user));
                eprintln!("Note: profile edits are local to this process and are not sent to the server.");
                Ok(())
            }
        }
    }

    fn status(&self, as_json: bool) -> Result<()> {
        let session = self.session.snapshot();
        if as_json {
            println!("{}", serde_json::to_string_pretty(&session_json(&session))?);
        } else {
            match session.user() {
                Some(user) => println!("Logged in as {}", describe_user(user)),
                None => println!("Not logged in"),
            }
        }
        Ok(())
    }

    fn require_login(&self) -> Result<()> {
        match self.session.snapshot().access(AccessRequirement::Authenticated) {
            AccessDecision::Granted => Ok(()),
            _ => Err(anyhow::anyhow!("Not logged in. Run `tokenkeep login` first.")),
        }
    }
}

fn open_store(config: &Config) -> Result<Box<dyn TokenStore>> {
    Ok(match config.store {
        StoreBackend::File => {
            let dir = config.data_dir().context("Could not locate token store")?;
            Box::new(FileTokenStore::new(dir))
        }
        StoreBackend::Keyring => Box::new(KeyringTokenStore::new(config.keyring_service())?),
    })
}

fn prompt_password(label: &str) -> Result<String> {
    let password = rpassword::prompt_password(label)?;
    if password.is_empty() {
        return Err(anyhow::anyhow!("Password required"));
    }
    Ok(password)
}

fn prompt_new_password(label: &str) -> Result<String> {
    let password = prompt_password(label)?;
    let confirm = prompt_password(&format!("Confirm {}", label.to_lowercase()))?;
    if password != confirm {
        return Err(anyhow::anyhow!("Passwords do not match"));
    }
    Ok(password)
}

fn describe_user(user: &User) -> String {
    format!("{} <{}> ({})", user.username, user.email, user.role)
}

fn session_json(session: &Session) -> serde_json::Value {
    json!({
        "phase": format!("{:?}", session.phase()),
        "initialized": session.is_initialized(),
        "user": session.user(),
    })
}

/// Turn a session failure into a message fit for the terminal.
fn user_message(err: &AuthError) -> String {
    match err.failure_kind() {
        Some(FailureKind::Unauthorized) => format!("Authentication failed: {}", err.user_message()),
        Some(FailureKind::Forbidden) => format!("Permission denied: {}", err.user_message()),
        Some(FailureKind::NotFound) => "The requested resource does not exist".to_string(),
        Some(FailureKind::RateLimited) => "Too many requests. Please wait and try again.".to_string(),
        Some(FailureKind::Server) => "Internal server error. Please try again later.".to_string(),
        Some(FailureKind::Network) => {
            "Unable to connect to server. Check your network connection.".to_string()
        }
        Some(FailureKind::InvalidResponse) => format!("Unexpected server response: {}", err.user_message()),
        None => err.user_message(),
    }
}

fn failure(err: AuthError) -> anyhow::Error {
    anyhow::anyhow!(user_message(&err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tokenkeep_core::{ApiError, StorageKey};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn user_json(id: &str) -> Value {
        json!({"id": id, "username": "alice", "email": "a@b.com", "role": "user"})
    }

    fn app_for(server: &MockServer, dir: &std::path::Path) -> App {
        let config = Config {
            api_base_url: format!("{}/api", server.uri()),
            ..Config::default()
        };
        App::with_store(&config, Box::new(FileTokenStore::new(dir))).unwrap()
    }

    fn persisted(dir: &std::path::Path, access: &str, refresh: &str) {
        let store = FileTokenStore::new(dir);
        store.set(StorageKey::AccessToken, access).unwrap();
        store.set(StorageKey::RefreshToken, refresh).unwrap();
    }

    #[tokio::test]
    async fn test_run_refresh_rotates_persisted_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/profile"))
            .and(header("authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json("u1")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/auth/refresh"))
            .and(body_json(json!({"refresh_token": "R1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "T2",
                "refresh_token": "R2",
                "user": user_json("u1")
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        persisted(dir.path(), "T1", "R1");

        let app = app_for(&server, dir.path());
        app.run(Commands::Refresh).await.unwrap();

        let session = app.session.snapshot();
        assert_eq!(session.user().unwrap().id, "u1");
        assert_eq!(session.access_token().unwrap().as_str(), "T2");

        let reopened = FileTokenStore::new(dir.path());
        assert_eq!(reopened.get(StorageKey::AccessToken).unwrap().as_deref(), Some("T2"));
        assert_eq!(reopened.get(StorageKey::RefreshToken).unwrap().as_deref(), Some("R2"));
    }

    #[tokio::test]
    async fn test_run_logout_clears_persisted_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json("u1")))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        persisted(dir.path(), "T1", "R1");

        let app = app_for(&server, dir.path());
        app.run(Commands::Logout).await.unwrap();

        assert!(!app.session.snapshot().is_authenticated());
        assert!(!FileTokenStore::new(dir.path()).path().exists());
    }

    #[tokio::test]
    async fn test_run_anonymous_commands() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let app = app_for(&server, dir.path());

        app.run(Commands::Status { json: true }).await.unwrap();
        assert!(app.session.snapshot().is_initialized());

        let err = app.run(Commands::Refresh).await.unwrap_err();
        assert!(err.to_string().contains("Not authenticated"));

        let err = app
            .run(Commands::Profile {
                username: Some("alice2".to_string()),
                email: None,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Not logged in"));

        // No persisted tokens: nothing reached the service
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[test]
    fn test_user_message_by_kind() {
        let network = AuthError::from(ApiError::NetworkError("connection refused".to_string()));
        assert!(user_message(&network).contains("Unable to connect"));

        let rejected = AuthError::from(ApiError::Unauthorized("Check your login details".to_string()));
        assert_eq!(
            user_message(&rejected),
            "Authentication failed: Check your login details"
        );

        let server = AuthError::from(ApiError::ServerError("stack trace".to_string()));
        assert!(!user_message(&server).contains("stack trace"));

        assert!(user_message(&AuthError::Unauthenticated).contains("Not authenticated"));
    }

    #[test]
    fn test_session_json_anonymous() {
        let value = session_json(&Session::default());
        assert_eq!(value["phase"], "Uninitialized");
        assert_eq!(value["initialized"], false);
        assert!(value["user"].is_null());
    }
}
