//! The application: routers tried in the order they were mounted.

use crate::body::{self, RequestBody, ResponseBody};
use crate::error::BoxError;
use crate::responder;
use crate::router::Router;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Request, Response};
use http_body::Body as HttpBody;
use std::fmt;
use tracing::debug;

/// A router with its context type erased.
trait MountedRouter: Send + Sync {
    fn route_request(
        &self,
        req: Request<RequestBody>,
    ) -> Result<BoxFuture<'_, Response<ResponseBody>>, Request<RequestBody>>;
}

impl<C> MountedRouter for Router<C>
where
    C: Send + 'static,
{
    fn route_request(
        &self,
        req: Request<RequestBody>,
    ) -> Result<BoxFuture<'_, Response<ResponseBody>>, Request<RequestBody>> {
        self.try_dispatch(req)
    }
}

/// Every mounted router, in mount order.
///
/// ```
/// use tusk::{App, Router};
///
/// let app = App::new().mount(Router::default());
/// # drop(app);
/// ```
#[derive(Default)]
pub struct App {
    routers: Vec<Box<dyn MountedRouter>>,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App").field("routers", &self.routers.len()).finish()
    }
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `router`; earlier routers take precedence.
    pub fn mount<C>(mut self, router: Router<C>) -> Self
    where
        C: Send + 'static,
    {
        self.routers.push(Box::new(router));
        self
    }

    /// Answers one request. Never fails: every error ends up as a response.
    pub async fn dispatch<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let mut req = req.map(body::boxed);

        for router in &self.routers {
            match router.route_request(req) {
                Ok(response) => return response.await,
                Err(unmatched) => req = unmatched,
            }
        }

        debug!(method = %req.method(), path = req.uri().path(), "no route found");
        responder::not_found()
    }
}
