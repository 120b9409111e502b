//! Builds the OneEntry client for [`SessionClient`](crate::session::SessionClient).

use async_trait::async_trait;

use super::{Markers, OneEntryClient};
use crate::config::BackendConfig;
use crate::session::{BootstrapError, ClientBootstrap, ClientOptions};

/// Constructs a [`OneEntryClient`] and exchanges the stored credential.
#[derive(Debug, Clone)]
pub struct OneEntryBootstrap {
    http: reqwest::Client,
    markers: Markers,
}

impl OneEntryBootstrap {
    /// Bootstrap using the markers from `config`.
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        Self::with_http(reqwest::Client::new(), config)
    }

    /// Bootstrap with a caller-provided HTTP client.
    #[must_use]
    pub fn with_http(http: reqwest::Client, config: &BackendConfig) -> Self {
        Self {
            http,
            markers: Markers::from(config),
        }
    }
}

#[async_trait]
impl ClientBootstrap for OneEntryBootstrap {
    type Client = OneEntryClient;

    async fn bootstrap(&self, options: ClientOptions) -> Result<OneEntryClient, BootstrapError> {
        let refresh_token = options.auth.refresh_token.clone();
        let custom_auth = options.auth.custom_auth;
        let client = OneEntryClient::new(self.http.clone(), options, self.markers.clone());

        if let Some(credential) = refresh_token
            && !custom_auth
        {
            client.exchange(&credential).await?;
            tracing::debug!("refresh credential exchanged during bootstrap");
        }

        Ok(client)
    }
}
