use std::error::Error;
use std::sync::Arc;

use crate::api::{Backend, BackendClient};
use crate::auth::store::token_from_env;
use crate::auth::{
    AuthError, AuthManager, KeyringTokenStore, MemoryTokenStore, SessionMarker, TokenStore,
};
use crate::cli::Args;
use crate::core::chat::ChatService;
use crate::core::config::{Config, Settings};

const SESSION_FILE: &str = "session.json";

/// Everything a backend-facing command needs, wired from config,
/// environment and flags.
pub struct Context {
    pub settings: Settings,
    pub auth: Arc<AuthManager>,
    pub chats: ChatService,
}

impl Context {
    pub fn load(args: &Args) -> Result<Self, Box<dyn Error>> {
        let config = Config::load_from_path(&Config::config_path()?)?;
        let env_backend_url = Settings::backend_url_from_env();
        let settings = Settings::resolve(
            &config,
            args.backend_url.as_deref(),
            env_backend_url.as_deref(),
        );

        let client = BackendClient::new(&settings.backend_url)?;
        let account = client.endpoints().origin();
        let backend: Arc<dyn Backend> = Arc::new(client);
        let tokens: Arc<dyn TokenStore> = if args.no_keyring {
            Arc::new(MemoryTokenStore::new())
        } else {
            Arc::new(KeyringTokenStore::new())
        };
        let marker = SessionMarker::new(Config::data_dir()?.join(SESSION_FILE));

        let auth = Arc::new(
            AuthManager::new(
                backend.clone(),
                tokens,
                marker,
                account,
                settings.redirect_uri.clone(),
            )
            .with_env_token(token_from_env()),
        );
        let chats = ChatService::new(backend, auth.clone());

        Ok(Self {
            settings,
            auth,
            chats,
        })
    }

    /// Commands that talk to the backend on the user's behalf need both the
    /// marker and a token.
    pub fn require_session(&self) -> Result<(), AuthError> {
        if self.auth.is_logged_in()? {
            Ok(())
        } else {
            Err(AuthError::NotAuthenticated)
        }
    }
}
