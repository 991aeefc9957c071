//! The request builder.
//!
//! [`ApiClient::build`] reads the store's current session snapshot and
//! stamps the call with:
//!
//! - `x-db-name: <tenant name>`
//! - one credential header, per [`CredentialScheme`]
//! - `user-id: <id>` when the session knows one
//! - `content-type: application/json`
//!
//! Standalone bearer tokens are fetched from the [`TokenSource`] on every
//! call and never cached. Embedded sessions use the token the host handed
//! over.

use std::sync::Arc;

use authsync_session::{AuthSession, NoTokenSource, SessionMode, TokenSource};
use authsync_store::SessionWatch;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;

use crate::{
    ApiConfig, ApiResponse, CredentialScheme, DebugRecord, RequestDescriptor, RequestError,
    RequestOptions,
};

/// Tenant scope header.
pub const TENANT_HEADER: &str = "x-db-name";
/// Static deployment key header.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Known user id header.
pub const USER_ID_HEADER: &str = "user-id";

/// Builds and sends tenant-scoped, authenticated API calls.
///
/// Bound to one session store: calls in flight when the store shuts down
/// resolve to [`RequestError::Cancelled`].
pub struct ApiClient<T: TokenSource = NoTokenSource> {
    http: reqwest::Client,
    config: ApiConfig,
    session: SessionWatch,
    tokens: Arc<T>,
}

impl ApiClient<NoTokenSource> {
    /// A client without a token source, for embedded sessions or the
    /// API-key scheme.
    ///
    /// # Errors
    /// `RequestError::Configuration` if the HTTP client can't be built.
    pub fn embedded(config: ApiConfig, session: SessionWatch) -> Result<Self, RequestError> {
        Self::new(config, session, Arc::new(NoTokenSource))
    }
}

impl<T: TokenSource> ApiClient<T> {
    /// # Errors
    /// `RequestError::Configuration` if the HTTP client can't be built.
    pub fn new(config: ApiConfig, session: SessionWatch, tokens: Arc<T>) -> Result<Self, RequestError> {
        let http = reqwest::Client::builder().build().map_err(|e| {
            RequestError::configuration(
                format!("failed to build HTTP client: {e}"),
                DebugRecord::for_url(&config.base_url),
            )
        })?;
        Ok(Self::with_client(http, config, session, tokens))
    }

    pub fn with_client(
        http: reqwest::Client,
        config: ApiConfig,
        session: SessionWatch,
        tokens: Arc<T>,
    ) -> Self {
        Self {
            http,
            config,
            session,
            tokens,
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Resolves the URL and stamps the headers for one call.
    ///
    /// # Errors
    /// - `RequestError::Configuration` if the session has no tenant or a
    ///   caller header is invalid; no token is fetched in that case
    /// - `RequestError::Credential` if no credential is available
    pub async fn build(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<RequestDescriptor, RequestError> {
        let session = self.session.snapshot();
        let base_url = options
            .base_url
            .as_deref()
            .unwrap_or(&self.config.base_url);
        let url = format!("{base_url}{endpoint}");

        let Some(tenant) = session.tenant() else {
            return Err(RequestError::configuration(
                "No tenant information available",
                DebugRecord::for_url(url),
            ));
        };

        let mut headers = HeaderMap::new();
        for (name, value) in &options.headers {
            let (name, value) = parse_header(name, value)
                .map_err(|message| RequestError::configuration(message, DebugRecord::for_url(&url)))?;
            headers.insert(name, value);
        }
        let tenant_value = HeaderValue::from_str(&tenant.name).map_err(|_| {
            RequestError::configuration("tenant name is not a valid header value", DebugRecord::for_url(&url))
        })?;
        let user_id = session
            .user_id()
            .map(HeaderValue::from_str)
            .transpose()
            .map_err(|_| {
                RequestError::configuration("user id is not a valid header value", DebugRecord::for_url(&url))
            })?;

        let credential = tokio::select! {
            credential = self.credential(&session) => credential,
            _ = self.session.closed() => {
                return Err(RequestError::Cancelled {
                    debug: DebugRecord::capture(&url, &headers).with_error("session store shut down"),
                });
            }
        };
        let (credential_name, credential_value) = credential
            .map_err(|message| RequestError::credential(message, DebugRecord::capture(&url, &headers)))?;

        headers.remove(header::AUTHORIZATION);
        headers.remove(API_KEY_HEADER);
        headers.insert(credential_name, credential_value);
        headers.insert(TENANT_HEADER, tenant_value);
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(user_id) = user_id {
            headers.insert(USER_ID_HEADER, user_id);
        }

        let debug = DebugRecord::capture(&url, &headers);
        Ok(RequestDescriptor {
            method: options.method.unwrap_or(Method::GET),
            url,
            headers,
            body: options.body,
            debug,
        })
    }

    /// Sends a built request and decodes its JSON body. No retries.
    ///
    /// # Errors
    /// `Network`, `Api`, `Decode`, or `Cancelled` if the store shuts down
    /// first. Each carries the call's debug record.
    pub async fn send(&self, descriptor: RequestDescriptor) -> Result<ApiResponse, RequestError> {
        let RequestDescriptor {
            method,
            url,
            headers,
            body,
            debug,
        } = descriptor;

        tracing::debug!(%method, %url, "sending API request");
        let mut request = self.http.request(method, url.as_str()).headers(headers);
        if let Some(body) = &body {
            request = request.json(body);
        }

        let call = perform(request, debug.clone());
        let result = tokio::select! {
            result = call => result,
            _ = self.session.closed() => Err(RequestError::Cancelled {
                debug: debug.with_error("session store shut down"),
            }),
        };

        if let Err(e) = &result {
            tracing::warn!(%url, error = %e, "API request failed");
        }
        result
    }

    /// [`build`](Self::build) then [`send`](Self::send).
    ///
    /// # Errors
    /// Any error of either step.
    pub async fn fetch(&self, endpoint: &str, options: RequestOptions) -> Result<ApiResponse, RequestError> {
        let descriptor = self.build(endpoint, options).await?;
        self.send(descriptor).await
    }

    /// Picks the credential header for this call. Errors are messages for
    /// `RequestError::Credential`.
    async fn credential(&self, session: &AuthSession) -> Result<(HeaderName, HeaderValue), String> {
        match (session.mode(), &self.config.credential_scheme) {
            (SessionMode::Embedded, scheme) => {
                let token = session
                    .host_token()
                    .ok_or("No authentication token provided in embedded mode")?;
                match scheme {
                    CredentialScheme::Bearer => bearer(token.expose()),
                    CredentialScheme::ApiKey(key) => api_key(key),
                }
            }
            (SessionMode::Standalone, CredentialScheme::ApiKey(key)) => api_key(key),
            (SessionMode::Standalone, CredentialScheme::Bearer) => {
                match self.tokens.fresh_token().await {
                    Ok(Some(token)) => bearer(&token),
                    Ok(None) => Err("No authentication token available".into()),
                    Err(e) => Err(e.to_string()),
                }
            }
        }
    }
}

async fn perform(request: reqwest::RequestBuilder, debug: DebugRecord) -> Result<ApiResponse, RequestError> {
    let response = match request.send().await {
        Ok(response) => response,
        Err(source) => {
            return Err(RequestError::Network {
                debug: debug.with_error(source.to_string()),
                source,
            });
        }
    };

    let status = response.status();
    if !status.is_success() {
        let message = format!(
            "API call failed: {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or_default()
        )
        .trim_end()
        .to_string();
        return Err(RequestError::Api {
            status: status.as_u16(),
            debug: debug.with_error(message.clone()),
            message,
        });
    }

    match response.json::<serde_json::Value>().await {
        Ok(data) => Ok(ApiResponse { data, debug }),
        Err(source) => Err(RequestError::Decode {
            debug: debug.with_error(source.to_string()),
            source,
        }),
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), String> {
    let parsed_name =
        HeaderName::from_bytes(name.as_bytes()).map_err(|_| format!("invalid header name {name:?}"))?;
    let parsed_value =
        HeaderValue::from_str(value).map_err(|_| format!("invalid value for header {name:?}"))?;
    Ok((parsed_name, parsed_value))
}

fn bearer(token: &str) -> Result<(HeaderName, HeaderValue), String> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| "token is not a valid header value".to_string())?;
    value.set_sensitive(true);
    Ok((header::AUTHORIZATION, value))
}

fn api_key(key: &str) -> Result<(HeaderName, HeaderValue), String> {
    let mut value =
        HeaderValue::from_str(key).map_err(|_| "API key is not a valid header value".to_string())?;
    value.set_sensitive(true);
    Ok((HeaderName::from_static(API_KEY_HEADER), value))
}
