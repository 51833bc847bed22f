//! Axum integration
//!
//! Provides helpers for:
//! - Attaching a request [`Scope`] with the request's resolvers to every request
//! - Extracting the scope and JSON bodies in handlers
//! - Returning responses whose deferred values are resolved before encoding
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use axum::{middleware::from_fn_with_state, routing::get, Router};
//! use lazy_resolve::{
//!     resolvers_middleware, ApiError, BoxError, Deferred, LazyJson, Resolver, ResolverFactory,
//!     Scope,
//! };
//!
//! async fn fetch_names(_scope: Scope, ids: Vec<u64>) -> Result<Vec<String>, BoxError> {
//!     Ok(ids.iter().map(|id| format!("user-{id}")).collect())
//! }
//!
//! async fn me(scope: Scope) -> Result<LazyJson<Deferred<String, u64>>, ApiError> {
//!     let users = scope.resolvers::<Resolver<String, u64>>()?;
//!     Ok(LazyJson(users.future(1)))
//! }
//!
//! let factory: ResolverFactory = Arc::new(|scope: Scope| {
//!     Ok(scope.with_resolvers(Resolver::from_fn("users", fetch_names)))
//! });
//! let app: Router = Router::new()
//!     .route("/me", get(me))
//!     .layer(from_fn_with_state(factory, resolvers_middleware));
//! ```

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::type_name;
use std::sync::Arc;
use tracing::{debug, error, info_span, Instrument};

use crate::serialize::decode_json;
use crate::{DecodeError, ResolveError, Result, Scope};

/// Builds the resolver set for a request
///
/// Receives a fresh [`Scope`] and returns it with resolvers attached
/// (usually via [`Scope::with_resolvers`]). A token passed to
/// [`Scope::with_cancellation`] here is cancelled when the request ends, so
/// hand it a child token rather than a shared one.
pub type ResolverFactory = Arc<dyn Fn(Scope) -> Result<Scope> + Send + Sync>;

/// Middleware attaching a request scope and encoding [`LazyJson`] responses
///
/// Use with [`axum::middleware::from_fn_with_state`] and a [`ResolverFactory`].
/// The scope's cancellation token fires when the request finishes or is dropped.
pub async fn resolvers_middleware(
    State(factory): State<ResolverFactory>,
    mut request: Request,
    next: Next,
) -> Response {
    let scope = match factory(Scope::new()) {
        Ok(scope) => scope,
        Err(err) => return ApiError::from(err).into_response(),
    };

    let span = info_span!("request_scope", scope_id = %scope.id());
    request.extensions_mut().insert(scope.clone());

    async move {
        let _cancel_on_exit = scope.cancellation().clone().drop_guard();
        let response = next.run(request).await;
        encode_lazy_body(&scope, response).await
    }
    .instrument(span)
    .await
}

/// Resolve the scope, then fill in the body of a [`LazyJson`] response
async fn encode_lazy_body(scope: &Scope, mut response: Response) -> Response {
    let Some(lazy) = response.extensions_mut().remove::<LazyBody>() else {
        return response;
    };

    if let Err(err) = scope.resolve_all().await {
        return ApiError::from(err).into_response();
    }

    match (lazy.encode)() {
        Ok(bytes) => {
            debug!(bytes = bytes.len(), "encoded resolved response");
            // Keep a status the handler set over the placeholder.
            if response.status() == StatusCode::INTERNAL_SERVER_ERROR {
                *response.status_mut() = lazy.status;
            }
            let headers = response.headers_mut();
            headers.remove(header::CONTENT_LENGTH);
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            *response.body_mut() = Body::from(bytes);
            response
        }
        Err(err) => ApiError::from(ResolveError::Encode(err)).into_response(),
    }
}

/// JSON response encoded only after the request's resolvers ran
///
/// Handlers may embed unresolved [`Deferred`](crate::Deferred) values anywhere
/// in `T`. Requires [`resolvers_middleware`]: without it the response stays a
/// `500` with code `resolver_scope_not_found`.
#[derive(Debug, Clone)]
pub struct LazyJson<T>(pub T);

type Encoder = Arc<dyn Fn() -> serde_json::Result<Vec<u8>> + Send + Sync>;

#[derive(Clone)]
struct LazyBody {
    status: StatusCode,
    encode: Encoder,
}

impl<T> IntoResponse for LazyJson<T>
where
    T: Serialize + Send + Sync + 'static,
{
    fn into_response(self) -> Response {
        let value = self.0;
        let missing = ApiError::from(ResolveError::ScopeNotFound {
            type_name: type_name::<Scope>(),
        });
        let mut response = (missing.status, Json(missing)).into_response();
        response.extensions_mut().insert(LazyBody {
            status: StatusCode::OK,
            encode: Arc::new(move || serde_json::to_vec(&value)),
        });
        response
    }
}

impl<S> FromRequestParts<S> for Scope
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts.extensions.get::<Scope>().cloned().ok_or_else(|| {
            ResolveError::ScopeNotFound {
                type_name: type_name::<Scope>(),
            }
            .into()
        })
    }
}

/// JSON request body extractor
///
/// Like [`axum::Json`], but rejections separate malformed shapes from
/// malformed syntax (see [`DecodeError`]).
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            ApiError::new(rejection.status(), "bad_request", rejection.body_text())
        })?;
        Ok(JsonBody(decode_json(&bytes)?))
    }
}

/// Error response with a stable code
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        let code = match &err {
            ResolveError::ScopeNotFound { .. } => "resolver_scope_not_found",
            ResolveError::NotResolved { .. } => "future_not_resolved",
            ResolveError::Fetch(_) | ResolveError::LengthMismatch { .. } => "fetch_failed",
            ResolveError::Unresolved { .. } => "unresolved_after_budget",
            ResolveError::Encode(_) => "encode_failed",
        };
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, err.to_string())
    }
}

impl From<DecodeError> for ApiError {
    fn from(err: DecodeError) -> Self {
        let code = match &err {
            DecodeError::Type { .. } => "malformed_type",
            DecodeError::Syntax { .. } => "malformed_syntax",
            DecodeError::Other(_) => "bad_request",
        };
        Self::new(StatusCode::BAD_REQUEST, code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(code = self.code, message = %self.message, "request failed");
        } else {
            debug!(code = self.code, message = %self.message, "request rejected");
        }
        (self.status, Json(self)).into_response()
    }
}
