//! Route-level layer that tags endpoints as API or MVC and runs the
//! view, exception and result stages on their responses.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::response::Response;
use http::Request;
use tower::{Layer, Service};

use crate::classify::EndpointFlavor;
use crate::context::RequestContext;
use crate::filters::{exception, result, view};
use crate::options::ProblemDetailsOptions;

/// Marks the routes it wraps with an [`EndpointFlavor`].
///
/// Apply it with `Router::route_layer` so only matched routes are tagged.
#[derive(Clone, Debug)]
pub struct EndpointLayer {
    flavor: EndpointFlavor,
    options: Arc<ProblemDetailsOptions>,
}

impl EndpointLayer {
    #[must_use]
    pub fn new(flavor: EndpointFlavor, options: Arc<ProblemDetailsOptions>) -> Self {
        Self { flavor, options }
    }

    #[must_use]
    pub fn api(options: Arc<ProblemDetailsOptions>) -> Self {
        Self::new(EndpointFlavor::Api, options)
    }

    #[must_use]
    pub fn mvc(options: Arc<ProblemDetailsOptions>) -> Self {
        Self::new(EndpointFlavor::Mvc, options)
    }
}

impl<S> Layer<S> for EndpointLayer {
    type Service = EndpointService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        EndpointService {
            inner,
            flavor: self.flavor,
            options: Arc::clone(&self.options),
        }
    }
}

/// Service produced by [`EndpointLayer`].
#[derive(Clone, Debug)]
pub struct EndpointService<S> {
    inner: S,
    flavor: EndpointFlavor,
    options: Arc<ProblemDetailsOptions>,
}

impl<S, B> Service<Request<B>> for EndpointService<S>
where
    S: Service<Request<B>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send,
    B: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let ctx = match req.extensions().get::<RequestContext>() {
            Some(ctx) => ctx.clone(),
            None => {
                let ctx = RequestContext::from_head(req.uri(), req.headers());
                req.extensions_mut().insert(ctx.clone());
                ctx
            }
        };
        ctx.set_endpoint(self.flavor);

        let options = Arc::clone(&self.options);
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let response = inner.call(req).await?;
            let response = view::apply(&ctx, &options, response);
            let response = exception::apply(&ctx, &options, response);
            Ok(result::apply(&ctx, &options, response))
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::context::HandledBy;
    use crate::error::ActionError;
    use axum::Router;
    use axum::body::Body;
    use axum::routing::get;
    use http::{StatusCode, header};
    use tower::ServiceExt;

    fn router(flavor: EndpointFlavor) -> Router {
        let options = Arc::new(ProblemDetailsOptions::default());
        Router::new()
            .route("/values", get(|| async { StatusCode::NOT_FOUND }))
            .route(
                "/timeout",
                get(|| async { Err::<(), _>(ActionError::Timeout) }),
            )
            .route(
                "/context",
                get(|ctx: RequestContext| async move {
                    match ctx.endpoint() {
                        Some(EndpointFlavor::Mvc) => "mvc",
                        Some(EndpointFlavor::Api) => "api",
                        None => "none",
                    }
                }),
            )
            .route_layer(EndpointLayer::new(flavor, options))
    }

    fn request(uri: &str, accept: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::ACCEPT, accept)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn api_endpoint_converts_bare_status() {
        let resp = router(EndpointFlavor::Api)
            .oneshot(request("/values", "application/json"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "application/problem+json"
        );
    }

    #[tokio::test]
    async fn api_endpoint_converts_raised_errors() {
        let resp = router(EndpointFlavor::Api)
            .oneshot(request("/timeout", "*/*"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "application/problem+json"
        );
    }

    #[tokio::test]
    async fn mvc_endpoint_leaves_browser_errors() {
        let resp = router(EndpointFlavor::Mvc)
            .oneshot(request("/values", "text/html,application/xhtml+xml,*/*;q=0.8"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(resp.headers().get(header::CONTENT_TYPE).is_none());
    }

    #[tokio::test]
    async fn handler_sees_the_flavor() {
        let resp = router(EndpointFlavor::Mvc)
            .oneshot(request("/context", "text/html"))
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"mvc");
    }

    #[tokio::test]
    async fn shared_context_records_the_handler() {
        let options = Arc::new(ProblemDetailsOptions::default());
        let ctx = RequestContext::from_head(
            &"/values".parse().unwrap(),
            &http::HeaderMap::new(),
        );
        let mut req = request("/values", "application/json");
        req.extensions_mut().insert(ctx.clone());

        let app = Router::new()
            .route("/values", get(|| async { StatusCode::CONFLICT }))
            .route_layer(EndpointLayer::api(options));
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(ctx.handled_by(), Some(HandledBy::ResultFilter));
        assert_eq!(ctx.endpoint(), Some(EndpointFlavor::Api));
    }
}
