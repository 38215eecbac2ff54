//! Context providers and the context handed to route handlers.
//!
//! Every [`Router`](crate::Router) owns one [`ContextProvider`]. For each matched request the
//! provider receives the request head and a [`Continuation`] running the rest of the pipeline
//! (decoding, handler, response). The provider builds its custom context, runs the
//! continuation with it and releases whatever it acquired once the continuation returns.
//! Because the pipeline is a future owned by the provider, the release also happens when the
//! request is cancelled and the future dropped.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use tusk::{BoxError, Continuation, RequestHead, ResponseBody};
//! use http::Response;
//!
//! #[derive(Clone)]
//! struct AppContext {
//!     token: Option<String>,
//! }
//!
//! async fn provide(req: Arc<RequestHead>, run: Continuation<AppContext>) -> Result<Response<ResponseBody>, BoxError> {
//!     let token = req.header("x-auth-token").map(str::to_string);
//!     run.run(AppContext { token }).await
//! }
//!
//! let router = tusk::Router::new(provide);
//! # drop(router);
//! ```

use crate::body::ResponseBody;
use crate::error::BoxError;
use crate::request::{RequestHead, ResponseHandle};
use async_trait::async_trait;
use futures::future::BoxFuture;
use http::Response;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// The outcome of a continuation, and so of a whole provider call.
pub type PipelineResult = Result<Response<ResponseBody>, BoxError>;

/// The remaining pipeline steps, waiting for the custom context.
pub struct Continuation<C> {
    inner: Box<dyn FnOnce(C) -> BoxFuture<'static, PipelineResult> + Send>,
}

impl<C> Continuation<C> {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: FnOnce(C) -> BoxFuture<'static, PipelineResult> + Send + 'static,
    {
        Self { inner: Box::new(f) }
    }

    /// Runs the rest of the pipeline with `ctx`.
    pub async fn run(self, ctx: C) -> PipelineResult {
        (self.inner)(ctx).await
    }
}

impl<C> fmt::Debug for Continuation<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Continuation")
    }
}

/// Supplies request scoped custom context to the handlers of one router.
///
/// Implemented for any `Fn(Arc<RequestHead>, Continuation<C>) -> impl Future<Output = PipelineResult>`.
/// A provider may reject a request without running the continuation by returning an
/// [`HttpError`](crate::HttpError); any other error becomes a 500.
#[async_trait]
pub trait ContextProvider<C>: Send + Sync
where
    C: Send + 'static,
{
    async fn provide(&self, req: Arc<RequestHead>, run: Continuation<C>) -> PipelineResult;
}

#[async_trait]
impl<C, F, Fut> ContextProvider<C> for F
where
    C: Send + 'static,
    F: Fn(Arc<RequestHead>, Continuation<C>) -> Fut + Send + Sync,
    Fut: Future<Output = PipelineResult> + Send + 'static,
{
    async fn provide(&self, req: Arc<RequestHead>, run: Continuation<C>) -> PipelineResult {
        (self)(req, run).await
    }
}

/// The default provider, handlers get `()` as custom context.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyContext;

#[async_trait]
impl ContextProvider<()> for EmptyContext {
    async fn provide(&self, _req: Arc<RequestHead>, run: Continuation<()>) -> PipelineResult {
        run.run(()).await
    }
}

/// Decoded type of a section the route declares no schema for.
#[allow(clippy::empty_structs_with_brackets, reason = "must deserialize from `{}`")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

/// Everything a handler gets: the decoded request sections plus the custom context.
///
/// `params`, `query`, `body`, `req` and `res` are fields of the context itself; the custom
/// context is reached through `Deref`. A custom context field with one of these names is
/// therefore always shadowed: `ctx.params` is the decoded path parameters, never a
/// provider's value.
#[derive(Debug)]
pub struct RouteContext<C, P = Empty, Q = Empty, B = Empty> {
    pub params: P,
    pub query: Q,
    pub body: B,
    pub req: Arc<RequestHead>,
    pub res: ResponseHandle,
    custom: C,
}

impl<C, P, Q, B> RouteContext<C, P, Q, B> {
    /// Merges the custom context with the base fields.
    pub fn compose(custom: C, base: BaseContext<P, Q, B>) -> Self {
        let BaseContext { params, query, body, req, res } = base;
        Self { params, query, body, req, res, custom }
    }

    pub fn custom(&self) -> &C {
        &self.custom
    }

    pub fn into_custom(self) -> C {
        self.custom
    }
}

impl<C, P, Q, B> Deref for RouteContext<C, P, Q, B> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        &self.custom
    }
}

impl<C, P, Q, B> DerefMut for RouteContext<C, P, Q, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.custom
    }
}

/// The framework derived part of a [`RouteContext`].
#[derive(Debug)]
pub struct BaseContext<P, Q, B> {
    pub params: P,
    pub query: Q,
    pub body: B,
    pub req: Arc<RequestHead>,
    pub res: ResponseHandle,
}
