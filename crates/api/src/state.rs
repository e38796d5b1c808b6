//! Application state

use std::sync::Arc;

use crate::{
    auth::{AuthState, CredentialStore, JwtManager},
    config::Config,
    temperature::TemperatureGateway,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub credentials: CredentialStore,
    pub jwt_manager: JwtManager,
    /// Retrieval strategy is fixed for the life of the process
    pub gateway: TemperatureGateway,
}

impl AppState {
    /// Build state from configuration and an already-connected credential store
    pub fn new(config: Config, credentials: CredentialStore) -> Result<Self, reqwest::Error> {
        let jwt_manager = JwtManager::new(&config.jwt_secret, config.session_ttl);
        let gateway = TemperatureGateway::from_config(&config)?;

        tracing::info!(
            source = gateway.source_name(),
            session_ttl_secs = config.session_ttl.as_secs(),
            "Application state initialized"
        );

        Ok(Self::from_parts(config, credentials, jwt_manager, gateway))
    }

    pub fn from_parts(
        config: Config,
        credentials: CredentialStore,
        jwt_manager: JwtManager,
        gateway: TemperatureGateway,
    ) -> Self {
        Self {
            config: Arc::new(config),
            credentials,
            jwt_manager,
            gateway,
        }
    }

    /// State handed to the auth middleware
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            jwt_manager: self.jwt_manager.clone(),
        }
    }
}
