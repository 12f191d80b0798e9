//! reqwest implementation of [`TransmissionApi`].

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::HeaderValue};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use std::sync::{Arc, Once};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use super::models::{
    FreeSpaceArguments, FreeSpaceResponse, METHOD_FREE_SPACE, METHOD_PORT_TEST, METHOD_SESSION_GET,
    METHOD_SESSION_STATS, PortTestResponse, RESULT_SUCCESS, RpcRequest, RpcResponse, SESSION_FIELDS,
    SessionGetArguments, SessionResponse, SessionStatsResponse,
};
use super::{FreeSpace, Session, SessionStats, TransmissionApi};
use crate::errors::{Error, Result};

const RPC_PATH: &str = "/transmission/rpc";
const SESSION_ID_HEADER: &str = "X-Transmission-Session-Id";

/// HTTP basic auth credentials for the RPC endpoint.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Client for a single Transmission daemon.
///
/// Safe to share between collectors. The CSRF session id the daemon hands out is stored
/// lock-free and picked up by every subsequent call.
pub struct TransmissionClient {
    http: Client,
    endpoint: Url,
    credentials: Option<Credentials>,
    session_id: ArcSwapOption<HeaderValue>,
    next_tag: AtomicU64,
}

static CRYPTO_PROVIDER: Once = Once::new();

/// Make aws-lc-rs the process-wide rustls provider, unless the embedding binary already chose one.
///
/// reqwest is built without a bundled provider and refuses to build a client until one is set.
pub fn install_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        if rustls::crypto::CryptoProvider::get_default().is_none() {
            // Losing a race to another installer is fine; any provider will do
            let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        }
    });
}

/// Appends the RPC path to whatever path the base URL already has.
fn rpc_endpoint(base_url: &Url) -> Url {
    let mut endpoint = base_url.clone();
    let path = format!("{}{}", base_url.path().trim_end_matches('/'), RPC_PATH);
    endpoint.set_path(&path);
    endpoint
}

impl TransmissionClient {
    pub fn new(base_url: &Url, credentials: Option<Credentials>, request_timeout: Duration) -> Result<Self> {
        install_crypto_provider();
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            endpoint: rpc_endpoint(base_url),
            credentials,
            session_id: ArcSwapOption::empty(),
            next_tag: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Issue one RPC call, renegotiating the session id once if the daemon asks for it.
    #[instrument(skip(self, arguments), err)]
    async fn call<A, R>(&self, method: &str, arguments: Option<A>) -> Result<R>
    where
        A: Serialize + Send + Sync,
        R: DeserializeOwned,
    {
        let body = RpcRequest {
            method,
            arguments,
            tag: self.next_tag.fetch_add(1, Ordering::Relaxed),
        };

        let mut renegotiated = false;
        loop {
            let mut request = self.http.post(self.endpoint.clone()).json(&body);
            if let Some(credentials) = &self.credentials {
                request = request.basic_auth(&credentials.username, credentials.password.as_deref());
            }
            if let Some(session_id) = self.session_id.load_full() {
                request = request.header(SESSION_ID_HEADER, session_id.as_ref().clone());
            }

            let response = request.send().await?;

            match response.status() {
                StatusCode::CONFLICT if !renegotiated => {
                    let session_id = response
                        .headers()
                        .get(SESSION_ID_HEADER)
                        .cloned()
                        .ok_or(Error::MissingSessionId)?;
                    debug!("Transmission issued a new session id, retrying {}", method);
                    self.session_id.store(Some(Arc::new(session_id)));
                    renegotiated = true;
                    continue;
                }
                StatusCode::UNAUTHORIZED => return Err(Error::Unauthorized),
                status if !status.is_success() => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::Status { status, body });
                }
                _ => {}
            }

            let bytes = response.bytes().await?;
            let envelope: RpcResponse<R> = serde_json::from_slice(&bytes).map_err(|source| Error::Decode {
                method: method.to_string(),
                source,
            })?;

            if envelope.result != RESULT_SUCCESS {
                return Err(Error::Rpc {
                    method: method.to_string(),
                    result: envelope.result,
                });
            }

            return envelope.arguments.ok_or_else(|| Error::MissingArguments {
                method: method.to_string(),
            });
        }
    }
}

#[async_trait]
impl TransmissionApi for TransmissionClient {
    async fn test_port(&self) -> Result<bool> {
        let response: PortTestResponse = self.call(METHOD_PORT_TEST, None::<()>).await?;
        Ok(response.port_is_open)
    }

    async fn session(&self) -> Result<Session> {
        let arguments = SessionGetArguments { fields: SESSION_FIELDS };
        let response: SessionResponse = self.call(METHOD_SESSION_GET, Some(arguments)).await?;
        Ok(response.into())
    }

    async fn free_space(&self, path: &str) -> Result<FreeSpace> {
        let response: FreeSpaceResponse = self.call(METHOD_FREE_SPACE, Some(FreeSpaceArguments { path })).await?;
        Ok(response.into())
    }

    async fn session_stats(&self) -> Result<SessionStats> {
        let response: SessionStatsResponse = self.call(METHOD_SESSION_STATS, None::<()>).await?;
        Ok(response.into())
    }
}
