//! Cookie-authenticated client for the iCloud+ Hide My Email web API.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{
    ACCEPT, CACHE_CONTROL, CONTENT_TYPE, COOKIE, ORIGIN, PRAGMA, REFERER, RETRY_AFTER,
};
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use super::http_client::{ClientTimeouts, build_provider_http_client};
use super::payload::{
    Envelope, GenerateRequest, GenerateResult, ListResult, ReserveRequest, ReserveResult,
    classify_failure_reason,
};
use super::{AliasProvider, Operation, ProviderError};
use crate::alias::{AliasCandidate, AliasRecord, ListedAlias, timestamp_from_millis};
use crate::auth::Session;
use crate::generate::parse_retry_after;
use crate::user_agent;

/// Production endpoint of the Hide My Email web service.
pub const DEFAULT_BASE_URL: &str = "https://p68-maildomainws.icloud.com";

const GENERATE_PATH: &str = "v1/hme/generate";
const RESERVE_PATH: &str = "v1/hme/reserve";
const LIST_PATH: &str = "v2/hme/list";

/// Web client build the API expects to be called from.
const CLIENT_BUILD_NUMBER: &str = "2206Hotfix12";
const WEB_ORIGIN: &str = "https://www.icloud.com";
const LANG_CODE: &str = "en-us";

/// HTTP statuses the provider uses to reject a session.
const SESSION_REJECTED_STATUSES: [u16; 3] = [401, 403, 421];

/// Session-authenticated Hide My Email client.
///
/// Cheap to clone; clones share the connection pool and the session.
#[derive(Debug, Clone)]
pub struct HttpSessionClient {
    client: Client,
    session: Arc<Session>,
    note: String,
}

impl HttpSessionClient {
    /// Creates a client with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::ClientBuild`] when the HTTP client cannot be built.
    pub fn new(session: Session) -> Result<Self, ProviderError> {
        Self::with_timeouts(session, ClientTimeouts::default())
    }

    /// Creates a client with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::ClientBuild`] when the HTTP client cannot be built.
    #[instrument(level = "debug", skip(session))]
    pub fn with_timeouts(session: Session, timeouts: ClientTimeouts) -> Result<Self, ProviderError> {
        let client = build_provider_http_client(timeouts)?;
        Ok(Self {
            client,
            session: Arc::new(session),
            note: user_agent::reservation_note(),
        })
    }

    /// Returns the session this client authenticates with.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Lists every alias on the account, active or not.
    ///
    /// # Errors
    ///
    /// Same taxonomy as the generation operations.
    #[instrument(skip(self))]
    pub async fn list_aliases(&self) -> Result<Vec<ListedAlias>, ProviderError> {
        let request = self.request(Method::GET, LIST_PATH);
        let result: Option<ListResult> = self.execute(Operation::List, request, None).await?;

        let aliases: Vec<ListedAlias> = result
            .map(|list| list.hme_emails)
            .unwrap_or_default()
            .into_iter()
            .map(|entry| ListedAlias {
                label: entry.label,
                address: entry.hme,
                created_at: entry.create_timestamp.and_then(timestamp_from_millis),
                active: entry.is_active,
            })
            .collect();

        info!(count = aliases.len(), "listed aliases");
        Ok(aliases)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let dsid = self.session.account_id().unwrap_or_default();
        self.client
            .request(method, self.session.endpoint(path))
            .query(&[
                ("clientBuildNumber", CLIENT_BUILD_NUMBER),
                ("clientMasteringNumber", CLIENT_BUILD_NUMBER),
                ("clientId", ""),
                ("dsid", dsid),
            ])
            .header(COOKIE, self.session.cookie_header())
            .header(ORIGIN, WEB_ORIGIN)
            .header(REFERER, format!("{WEB_ORIGIN}/"))
            .header(ACCEPT, "*/*")
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
    }

    fn post_json(
        &self,
        operation: Operation,
        path: &str,
        body: &impl Serialize,
    ) -> Result<RequestBuilder, ProviderError> {
        let body = serde_json::to_string(body).map_err(|e| {
            ProviderError::protocol(operation, format!("failed to encode request body: {e}"))
        })?;
        // The web API expects JSON sent as text/plain, like the browser does.
        Ok(self
            .request(Method::POST, path)
            .header(CONTENT_TYPE, "text/plain")
            .body(body))
    }

    /// Sends one request and unwraps the response envelope.
    ///
    /// Returns `Ok(None)` for a successful envelope without a `result`.
    async fn execute<T: DeserializeOwned>(
        &self,
        operation: Operation,
        request: RequestBuilder,
        address: Option<&str>,
    ) -> Result<Option<T>, ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(operation, &e))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after);

        if SESSION_REJECTED_STATUSES.contains(&status.as_u16()) {
            warn!(%operation, status = status.as_u16(), "provider rejected session");
            return Err(ProviderError::auth(
                operation,
                status.as_u16(),
                status.canonical_reason().unwrap_or("session rejected"),
            ));
        }

        if !status.is_success() {
            debug!(
                %operation,
                status = status.as_u16(),
                retry_after_ms = retry_after.map(|d| d.as_millis()),
                "non-success status treated as throttling"
            );
            return Err(ProviderError::rate_limited(
                operation,
                retry_after,
                format!("HTTP {status}"),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(operation, &e))?;

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            ProviderError::protocol(operation, format!("unparseable response body: {e}"))
        })?;

        if !envelope.success {
            let reason = envelope.failure_reason();
            debug!(%operation, %reason, "provider returned failure envelope");
            return Err(classify_failure_reason(
                operation,
                address,
                &reason,
                retry_after,
            ));
        }

        Ok(envelope.result)
    }
}

#[async_trait]
impl AliasProvider for HttpSessionClient {
    #[instrument(skip(self))]
    async fn generate_candidate(&self) -> Result<AliasCandidate, ProviderError> {
        let request = self.post_json(
            Operation::Generate,
            GENERATE_PATH,
            &GenerateRequest {
                lang_code: LANG_CODE,
            },
        )?;
        let result: Option<GenerateResult> =
            self.execute(Operation::Generate, request, None).await?;

        let Some(result) = result else {
            return Err(ProviderError::rate_limited(
                Operation::Generate,
                None,
                "success response without result",
            ));
        };
        let Some(address) = result.hme.filter(|hme| !hme.trim().is_empty()) else {
            return Err(ProviderError::rate_limited(
                Operation::Generate,
                None,
                "success response without candidate address",
            ));
        };

        debug!(address = %address, "generated candidate");
        let mut candidate = AliasCandidate::new(address);
        candidate.token = result.token;
        Ok(candidate)
    }

    #[instrument(skip(self, candidate), fields(address = %candidate.address))]
    async fn reserve(
        &self,
        candidate: &AliasCandidate,
        label: &str,
    ) -> Result<AliasRecord, ProviderError> {
        let request = self.post_json(
            Operation::Reserve,
            RESERVE_PATH,
            &ReserveRequest {
                hme: &candidate.address,
                label,
                note: &self.note,
                token: candidate.token.as_deref(),
            },
        )?;
        let result: Option<ReserveResult> = self
            .execute(Operation::Reserve, request, Some(&candidate.address))
            .await?;

        let reserved = result.and_then(|r| r.hme);
        if let Some(reserved) = &reserved
            && reserved.hme != candidate.address
        {
            warn!(
                requested = %candidate.address,
                returned = %reserved.hme,
                "provider echoed a different address; keeping the requested one"
            );
        }

        let created_at = reserved
            .and_then(|r| r.create_timestamp)
            .and_then(timestamp_from_millis)
            .unwrap_or_else(Utc::now);

        debug!(label, "reserved candidate");
        Ok(AliasRecord::reserved(
            candidate.address.clone(),
            label,
            created_at,
        ))
    }
}
