//! Statically composed request pipelines.
//!
//! A [`Chain`] is an ordered list of [`Stage`]s. Calling [`Chain::then`] (or
//! one of its siblings) folds the list around a terminal [`Endpoint`] and
//! yields a [`Pipeline`], which is a plain `tower::Service` that can be
//! mounted on an axum router.
//!
//! Each stage receives the request, the [`RequestContext`] built so far, and
//! a [`Next`] handle for the remainder of the chain. A stage either calls
//! `next.run(..)` (optionally extending the context first and editing the
//! response afterwards) or returns its own response without calling through.
//!
//! ```text
//! stage 1 ──► stage 2 ──► … ──► endpoint
//!    ◄──────────◄──────────◄────── response
//! ```
//!
//! Building a pipeline has no side effects; all work happens per request.

mod context;

use std::convert::Infallible;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use axum::extract::Request;
use axum::handler::Handler;
use axum::response::Response;
use futures::future::BoxFuture;
use tower::{Service, ServiceExt};

pub use context::RequestContext;

/// One step of a chain.
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    /// Process `request`, calling `next.run(..)` to continue the chain.
    async fn call(&self, request: Request, ctx: RequestContext, next: Next) -> Response;
}

/// The terminal handler of a pipeline.
pub trait Endpoint: Send + Sync + 'static {
    fn call(&self, request: Request, ctx: RequestContext) -> BoxFuture<'static, Response>;
}

/// Handle to the rest of a chain, passed to every [`Stage`].
#[derive(Clone)]
pub struct Next {
    stages: Arc<[Arc<dyn Stage>]>,
    position: usize,
    endpoint: Arc<dyn Endpoint>,
}

impl Next {
    /// Run the remaining stages and the endpoint.
    pub async fn run(self, request: Request, ctx: RequestContext) -> Response {
        match self.stages.get(self.position).cloned() {
            Some(stage) => {
                let next = Self {
                    position: self.position + 1,
                    ..self
                };
                stage.call(request, ctx, next).await
            }
            None => self.endpoint.call(request, ctx).await,
        }
    }
}

/// Ordered, immutable list of stages.
#[derive(Clone, Default)]
pub struct Chain {
    stages: Vec<Arc<dyn Stage>>,
}

impl Chain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage at the end of the chain.
    #[must_use]
    pub fn with(mut self, stage: impl Stage) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// A new chain made of this chain followed by `stage`.
    ///
    /// The receiver is left as it was, so one base chain can be extended in
    /// several directions.
    #[must_use]
    pub fn append(&self, stage: impl Stage) -> Self {
        self.clone().with(stage)
    }

    /// A new chain made of this chain followed by every stage of `other`.
    #[must_use]
    pub fn extend(&self, other: &Self) -> Self {
        let mut stages = self.stages.clone();
        stages.extend(other.stages.iter().cloned());
        Self { stages }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Terminate the chain with an axum handler.
    ///
    /// The handler can take [`RequestContext`] as an extractor to read what
    /// the stages established.
    pub fn then<H, T, S>(&self, handler: H, state: S) -> Pipeline
    where
        H: Handler<T, S>,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        self.then_endpoint(HandlerEndpoint {
            handler,
            state,
            _marker: PhantomData,
        })
    }

    /// Terminate the chain with a service, typically a nested router.
    ///
    /// The context built by this chain is not forwarded; a pipeline mounted
    /// inside the service starts from an empty context.
    pub fn then_service<Svc>(&self, service: Svc) -> Pipeline
    where
        Svc: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
        Svc::Future: Send + 'static,
    {
        self.then_endpoint(ServiceEndpoint(service))
    }

    /// Terminate the chain with any [`Endpoint`].
    pub fn then_endpoint(&self, endpoint: impl Endpoint) -> Pipeline {
        Pipeline {
            entry: Next {
                stages: Arc::from(self.stages.clone()),
                position: 0,
                endpoint: Arc::new(endpoint),
            },
        }
    }
}

/// A chain folded around its endpoint.
#[derive(Clone)]
pub struct Pipeline {
    entry: Next,
}

impl Pipeline {
    /// Run one request through the pipeline with a fresh context.
    pub async fn handle(&self, request: Request) -> Response {
        self.entry
            .clone()
            .run(request, RequestContext::default())
            .await
    }
}

impl Service<Request> for Pipeline {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let entry = self.entry.clone();
        Box::pin(async move { Ok(entry.run(request, RequestContext::default()).await) })
    }
}

/// Build a stage from an async closure.
pub const fn from_fn<F, Fut>(f: F) -> FnStage<F>
where
    F: Fn(Request, RequestContext, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FnStage(f)
}

/// Stage produced by [`from_fn`].
pub struct FnStage<F>(F);

#[async_trait]
impl<F, Fut> Stage for FnStage<F>
where
    F: Fn(Request, RequestContext, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    async fn call(&self, request: Request, ctx: RequestContext, next: Next) -> Response {
        (self.0)(request, ctx, next).await
    }
}

/// Build an endpoint from an async closure.
pub const fn endpoint_fn<F, Fut>(f: F) -> FnEndpoint<F>
where
    F: Fn(Request, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FnEndpoint(f)
}

/// Endpoint produced by [`endpoint_fn`].
pub struct FnEndpoint<F>(F);

impl<F, Fut> Endpoint for FnEndpoint<F>
where
    F: Fn(Request, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, request: Request, ctx: RequestContext) -> BoxFuture<'static, Response> {
        Box::pin((self.0)(request, ctx))
    }
}

struct HandlerEndpoint<H, T, S> {
    handler: H,
    state: S,
    _marker: PhantomData<fn() -> T>,
}

impl<H, T, S> Endpoint for HandlerEndpoint<H, T, S>
where
    H: Handler<T, S>,
    T: 'static,
    S: Clone + Send + Sync + 'static,
{
    fn call(&self, mut request: Request, ctx: RequestContext) -> BoxFuture<'static, Response> {
        request.extensions_mut().insert(ctx);
        Box::pin(self.handler.clone().call(request, self.state.clone()))
    }
}

struct ServiceEndpoint<Svc>(Svc);

impl<Svc> Endpoint for ServiceEndpoint<Svc>
where
    Svc: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    Svc::Future: Send + 'static,
{
    fn call(&self, request: Request, _ctx: RequestContext) -> BoxFuture<'static, Response> {
        let service = self.0.clone();
        Box::pin(async move {
            match service.oneshot(request).await {
                Ok(response) => response,
                Err(never) => match never {},
            }
        })
    }
}
