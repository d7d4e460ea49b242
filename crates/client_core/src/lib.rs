use std::sync::Arc;

use reqwest::{
    header::{HeaderValue, CONTENT_TYPE},
    Client, Method, RequestBuilder,
};
use serde::Serialize;
use serde_json::Value;
use shared::{
    domain::RecordId,
    error::{ApiError, ApiException},
    protocol::{
        IdOnly, IsOpenQuery, ListQuery, LoginRequest, OperatorDraft, RoleDraft, TradeFilters,
        TradeQuery, UserDraft, WithId,
    },
};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub mod cancel;
pub mod normalize;
pub mod paged_list;
pub mod pagination;
pub mod session;

pub use cancel::CancellationToken;
pub use normalize::{
    decode_list_response, parse_list_response, parse_trade_page, ListPage, TradePage,
};
pub use paged_list::{
    CancelReason, ErrorContext, ErrorSink, LoadOutcome, PageFetcher, PageRequest, PageState,
    PagedList, PagedListBuilder, PagedListController, PagedListError, DEFAULT_LOAD_TIMEOUT,
};
pub use pagination::{build_page_numbers, clamp_page, total_pages, PageSummary};
pub use session::SessionContext;

const TRADE_SUMMARY_PATH: [&str; 4] = ["es", "trades", "summary", "recent-hour"];
const TRADE_SEARCH_PATH: [&str; 2] = ["es", "trades"];

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid base url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("request cancelled")]
    Cancelled,
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Api(#[from] ApiException),
}

impl RequestError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Parses a service base URL, dropping one trailing slash so paths can be
/// appended segment by segment.
pub fn normalize_base_url(raw: &str) -> Result<Url, RequestError> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    let url = Url::parse(trimmed).map_err(|err| RequestError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(RequestError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: "url cannot carry a path".to_string(),
        });
    }
    Ok(url)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListResource {
    Users,
    Operators,
    Roles,
}

impl ListResource {
    fn path(self) -> &'static str {
        match self {
            Self::Users => "getAll",
            Self::Operators => "operators",
            Self::Roles => "roles",
        }
    }
}

/// HTTP client for the manager service (users, operators, roles) and the trade
/// service. Every call can be abandoned through its cancellation token.
pub struct AdminClient {
    http: Client,
    manager_base_url: Url,
    trade_base_url: Url,
    session: SessionContext,
}

impl AdminClient {
    pub fn new(
        manager_base_url: &str,
        trade_base_url: &str,
        session: SessionContext,
    ) -> Result<Self, RequestError> {
        Self::with_http_client(Client::new(), manager_base_url, trade_base_url, session)
    }

    pub fn with_http_client(
        http: Client,
        manager_base_url: &str,
        trade_base_url: &str,
        session: SessionContext,
    ) -> Result<Self, RequestError> {
        Ok(Self {
            http,
            manager_base_url: normalize_base_url(manager_base_url)?,
            trade_base_url: normalize_base_url(trade_base_url)?,
            session,
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn manager_base_url(&self) -> &Url {
        &self.manager_base_url
    }

    pub fn trade_base_url(&self) -> &Url {
        &self.trade_base_url
    }

    pub async fn login(
        &self,
        request: &LoginRequest,
        cancellation: &CancellationToken,
    ) -> Result<Value, RequestError> {
        let url = endpoint(&self.manager_base_url, &["login"])?;
        self.send(self.http.post(url).json(request), cancellation)
            .await
    }

    pub async fn fetch_list(
        &self,
        resource: ListResource,
        query: ListQuery,
        cancellation: &CancellationToken,
    ) -> Result<Value, RequestError> {
        let url = endpoint(&self.manager_base_url, &[resource.path()])?;
        debug!(
            resource = resource.path(),
            page = query.page,
            page_size = query.page_size,
            "admin api: fetching list page"
        );
        self.send(self.http.get(url).query(&query), cancellation)
            .await
    }

    pub async fn fetch_users(
        &self,
        query: ListQuery,
        cancellation: &CancellationToken,
    ) -> Result<Value, RequestError> {
        self.fetch_list(ListResource::Users, query, cancellation)
            .await
    }

    pub async fn add_user(
        &self,
        draft: &UserDraft,
        cancellation: &CancellationToken,
    ) -> Result<Value, RequestError> {
        self.manager_json(Method::POST, &["addNewUser"], draft, cancellation)
            .await
    }

    pub async fn update_user(
        &self,
        id: &RecordId,
        draft: &UserDraft,
        cancellation: &CancellationToken,
    ) -> Result<Value, RequestError> {
        let body = WithId { id, data: draft };
        self.manager_json(Method::POST, &["editUserInfo"], &body, cancellation)
            .await
    }

    pub async fn delete_user(
        &self,
        id: &RecordId,
        cancellation: &CancellationToken,
    ) -> Result<Value, RequestError> {
        self.manager_json(Method::POST, &["deleteUserInfo"], &IdOnly { id }, cancellation)
            .await
    }

    pub async fn fetch_operators(
        &self,
        query: ListQuery,
        cancellation: &CancellationToken,
    ) -> Result<Value, RequestError> {
        self.fetch_list(ListResource::Operators, query, cancellation)
            .await
    }

    pub async fn create_operator(
        &self,
        draft: &OperatorDraft,
        cancellation: &CancellationToken,
    ) -> Result<Value, RequestError> {
        self.manager_json(Method::POST, &["operators"], draft, cancellation)
            .await
    }

    pub async fn update_operator(
        &self,
        id: &RecordId,
        draft: &OperatorDraft,
        cancellation: &CancellationToken,
    ) -> Result<Value, RequestError> {
        let id = id.to_string();
        self.manager_json(Method::PUT, &["operators", &id], draft, cancellation)
            .await
    }

    pub async fn set_operator_is_open(
        &self,
        id: &RecordId,
        is_open: u8,
        cancellation: &CancellationToken,
    ) -> Result<Value, RequestError> {
        self.set_is_open("operators", id, is_open, cancellation)
            .await
    }

    pub async fn fetch_roles(
        &self,
        query: ListQuery,
        cancellation: &CancellationToken,
    ) -> Result<Value, RequestError> {
        self.fetch_list(ListResource::Roles, query, cancellation)
            .await
    }

    pub async fn create_role(
        &self,
        draft: &RoleDraft,
        cancellation: &CancellationToken,
    ) -> Result<Value, RequestError> {
        self.manager_json(Method::POST, &["roles"], draft, cancellation)
            .await
    }

    pub async fn update_role(
        &self,
        id: &RecordId,
        draft: &RoleDraft,
        cancellation: &CancellationToken,
    ) -> Result<Value, RequestError> {
        let id = id.to_string();
        self.manager_json(Method::PUT, &["roles", &id], draft, cancellation)
            .await
    }

    pub async fn set_role_is_open(
        &self,
        id: &RecordId,
        is_open: u8,
        cancellation: &CancellationToken,
    ) -> Result<Value, RequestError> {
        self.set_is_open("roles", id, is_open, cancellation).await
    }

    /// Trade totals for the most recent hour that has data.
    pub async fn fetch_recent_hour_trade_summary(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<Value, RequestError> {
        let url = endpoint(&self.trade_base_url, &TRADE_SUMMARY_PATH)?;
        self.send(self.http.get(url), cancellation).await
    }

    /// One page of the trade search on the trade service.
    pub async fn query_trades(
        &self,
        query: &TradeQuery,
        cancellation: &CancellationToken,
    ) -> Result<TradePage, RequestError> {
        let url = endpoint(&self.trade_base_url, &TRADE_SEARCH_PATH)?;
        debug!(
            page = query.page,
            size = query.size,
            filtered = query.notes_keyword.is_some()
                || query.trade_id.is_some()
                || query.user_id.is_some(),
            "admin api: searching trades"
        );
        let payload = self
            .send(self.http.get(url).query(query), cancellation)
            .await?;
        Ok(parse_trade_page(&payload, query.size))
    }

    /// A [`PageFetcher`] over the trade search with fixed `filters`.
    pub fn trade_fetcher(self: &Arc<Self>, filters: TradeFilters) -> impl PageFetcher {
        let client = Arc::clone(self);
        move |request: PageRequest| {
            let client = Arc::clone(&client);
            let query = TradeQuery::new(request.page, request.page_size, &filters);
            async move {
                let page = client.query_trades(&query, &request.cancellation).await?;
                Ok::<Value, anyhow::Error>(page.into_list_payload())
            }
        }
    }

    /// A [`PageFetcher`] that pages through `resource` with this client.
    pub fn list_fetcher(self: &Arc<Self>, resource: ListResource) -> impl PageFetcher {
        let client = Arc::clone(self);
        move |request: PageRequest| {
            let client = Arc::clone(&client);
            async move {
                let query = ListQuery {
                    page: request.page,
                    page_size: request.page_size,
                };
                client
                    .fetch_list(resource, query, &request.cancellation)
                    .await
                    .map_err(anyhow::Error::from)
            }
        }
    }

    async fn set_is_open(
        &self,
        collection: &str,
        id: &RecordId,
        is_open: u8,
        cancellation: &CancellationToken,
    ) -> Result<Value, RequestError> {
        let id = id.to_string();
        let url = endpoint(&self.manager_base_url, &[collection, &id, "is-open"])?;
        self.send(
            self.http.put(url).query(&IsOpenQuery { is_open }),
            cancellation,
        )
        .await
    }

    async fn manager_json<B>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
        cancellation: &CancellationToken,
    ) -> Result<Value, RequestError>
    where
        B: Serialize + ?Sized,
    {
        let url = endpoint(&self.manager_base_url, segments)?;
        self.send(self.http.request(method, url).json(body), cancellation)
            .await
    }

    /// Sends a JSON request. `Content-Type: application/json` is added unless
    /// the body already set it. The body is decoded leniently: a success
    /// without a JSON body yields `Value::Null`, a failure keeps whatever JSON
    /// came back as the error payload.
    async fn send(
        &self,
        builder: RequestBuilder,
        cancellation: &CancellationToken,
    ) -> Result<Value, RequestError> {
        let builder = match self.session.token().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };
        let mut request = builder.build()?;
        request
            .headers_mut()
            .entry(CONTENT_TYPE)
            .or_insert(HeaderValue::from_static("application/json"));

        let exchange = async {
            let response = self.http.execute(request).await?;
            let status = response.status();
            let body = response.bytes().await?;
            let payload = serde_json::from_slice::<Value>(&body).ok();

            if !status.is_success() {
                let error = ApiError::from_response(status.as_u16(), payload);
                return Err(RequestError::Api(error.into()));
            }
            Ok::<Value, RequestError>(payload.unwrap_or(Value::Null))
        };

        cancellation
            .run_until_cancelled(exchange)
            .await
            .unwrap_or_else(|| Err(RequestError::Cancelled))
    }
}

fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, RequestError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| RequestError::InvalidBaseUrl {
            url: base.to_string(),
            reason: "url cannot carry a path".to_string(),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
