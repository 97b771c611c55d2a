//! # Source Authentication
//!
//! Logs the hub on to a backend before an adapter talks to it. Static API
//! keys need no round trip; OAuth2 grants exchange the configured
//! credentials for a bearer token at the source's token endpoint.

use capi_core::source::TokenRequest;
use capi_core::{AuthenticationData, SourceDefinition};
use reqwest::RequestBuilder;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint answered {0} without an access token")]
    Rejected(u16),
    #[error("token request has no address")]
    MissingAddress,
}

impl AuthError {
    /// Every logon failure surfaces to callers as unauthorized.
    pub fn status(&self) -> u16 {
        401
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

pub struct SourceLogon {
    client: reqwest::Client,
}

impl SourceLogon {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// `(status, token)`: 200 with an optional bearer token, or 401.
    pub async fn authenticate(&self, source: &SourceDefinition) -> (u16, Option<String>) {
        match self.token_for(source).await {
            Ok(token) => (200, token),
            Err(e) => {
                tracing::warn!(source = %source.code, "Logon failed: {}", e);
                (e.status(), None)
            }
        }
    }

    pub async fn token_for(&self, source: &SourceDefinition) -> Result<Option<String>, AuthError> {
        let (grant, request) = match &source.authentication_data {
            AuthenticationData::None | AuthenticationData::ApiKey(_) => return Ok(None),
            AuthenticationData::OAuthPasswordTokenRequest(r) => ("password", r),
            AuthenticationData::OAuthClientCredentialsTokenRequest(r) => ("client_credentials", r),
            AuthenticationData::OAuthDeviceTokenRequest(r) => {
                ("urn:ietf:params:oauth:grant-type:device_code", r)
            }
            AuthenticationData::OAuthAuthorizationTokenRequest(r) => ("authorization_code", r),
        };
        self.request_token(grant, request).await.map(Some)
    }

    async fn request_token(&self, grant: &str, request: &TokenRequest) -> Result<String, AuthError> {
        if request.address.is_empty() {
            return Err(AuthError::MissingAddress);
        }
        let response = self
            .client
            .post(&request.address)
            .form(&token_form(grant, request))
            .send()
            .await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(AuthError::Rejected(status));
        }
        let body: TokenResponse = response.json().await?;
        body.access_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Rejected(status))
    }
}

fn token_form(grant: &str, request: &TokenRequest) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("grant_type", grant.to_string()),
        ("client_id", request.client_id.clone()),
    ];
    let optional = [
        ("client_secret", &request.client_secret),
        ("scope", &request.scope),
        ("username", &request.user_name),
        ("password", &request.password),
        ("device_code", &request.device_code),
        ("code", &request.code),
        ("redirect_uri", &request.redirect_uri),
        ("code_verifier", &request.code_verifier),
    ];
    form.extend(
        optional
            .into_iter()
            .filter_map(|(key, value)| value.clone().map(|v| (key, v))),
    );
    form
}

/// Attach the source's credentials to an outgoing request.
pub fn apply_credentials(
    source: &SourceDefinition,
    builder: RequestBuilder,
    token: Option<&str>,
) -> RequestBuilder {
    match (&source.authentication_data, token) {
        (AuthenticationData::None, _) => builder,
        (AuthenticationData::ApiKey(key), _) => builder.header(key.header.as_str(), key.key.as_str()),
        (_, Some(token)) => builder.bearer_auth(token),
        (_, None) => builder,
    }
}
