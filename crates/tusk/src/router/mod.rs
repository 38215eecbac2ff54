//! Route tables, one per context provider.
//!
//! A [`Router`] keeps its routes in registration order and resolves a request to the
//! first route whose method matches exactly and whose path template accepts the path.
//! Everything a route needs at request time is compiled when it is registered, so a
//! misconfigured route fails at startup rather than on its first request.
//!
//! # Example
//! ```
//! use serde::{Deserialize, Serialize};
//! use tusk::schema::Schema;
//! use tusk::{BoxError, Json, RouteContext, Router, Schemas};
//!
//! #[derive(Deserialize)]
//! struct Params {
//!     id: u64,
//! }
//!
//! #[derive(Serialize)]
//! struct User {
//!     id: u64,
//! }
//!
//! async fn show(ctx: RouteContext<(), Params>) -> Result<Json<User>, BoxError> {
//!     Ok(Json(User { id: ctx.params.id }))
//! }
//!
//! let mut router = Router::default();
//! router
//!     .get(
//!         "/users/:id",
//!         Schemas::new()
//!             .params(Schema::object().required("id", Schema::integer()))
//!             .returns(Schema::object().required("id", Schema::integer())),
//!         show,
//!     )
//!     .unwrap();
//! ```

mod pipeline;

use crate::body::DEFAULT_BODY_LIMIT;
use crate::context::{ContextProvider, EmptyContext};
use crate::error::RouteDefinitionError;
use crate::handler::{Endpoint, RouteHandler, TypedEndpoint};
use crate::matcher::{Matcher, PathParams};
use crate::schema::{Schema, Validator};
use http::Method;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// The schemas a route declares, all optional.
///
/// An omitted `params` or `query` schema means "no fields expected": the section decodes
/// to `{}`. An omitted `body` schema means the body is never read. A route without a
/// `returns` schema may only answer with no value (204).
#[derive(Debug, Clone, Default)]
pub struct Schemas {
    params: Option<Schema>,
    query: Option<Schema>,
    body: Option<Schema>,
    returns: Option<Schema>,
}

impl Schemas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(mut self, schema: impl Into<Schema>) -> Self {
        self.params = Some(schema.into());
        self
    }

    pub fn query(mut self, schema: impl Into<Schema>) -> Self {
        self.query = Some(schema.into());
        self
    }

    pub fn body(mut self, schema: impl Into<Schema>) -> Self {
        self.body = Some(schema.into());
        self
    }

    pub fn returns(mut self, schema: impl Into<Schema>) -> Self {
        self.returns = Some(schema.into());
        self
    }
}

/// A registered route with its compiled template and validators.
pub struct Route<C> {
    method: Method,
    matcher: Matcher,
    params: Validator,
    query: Validator,
    body: Option<Validator>,
    returns: Option<Validator>,
    endpoint: Box<dyn Endpoint<C>>,
}

impl<C> Route<C> {
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The template as registered.
    pub fn template(&self) -> &str {
        self.matcher.template()
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }
}

impl<C> fmt::Debug for Route<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("template", &self.template())
            .finish_non_exhaustive()
    }
}

/// An ordered route table sharing one context provider.
pub struct Router<C = ()>
where
    C: Send + 'static,
{
    routes: Vec<Arc<Route<C>>>,
    provider: Arc<dyn ContextProvider<C>>,
    body_limit: usize,
}

impl Default for Router<()> {
    fn default() -> Self {
        Self::new(EmptyContext)
    }
}

impl<C> fmt::Debug for Router<C>
where
    C: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field("body_limit", &self.body_limit)
            .finish_non_exhaustive()
    }
}

macro_rules! method_route {
    ($name:ident, $method:ident) => {
        #[doc = concat!("Registers a `", stringify!($method), "` route, see [`Router::register`].")]
        pub fn $name<H, P, Q, B>(
            &mut self,
            template: &str,
            schemas: Schemas,
            handler: H,
        ) -> Result<&mut Self, RouteDefinitionError>
        where
            H: RouteHandler<C, P, Q, B>,
            P: DeserializeOwned + Send + 'static,
            Q: DeserializeOwned + Send + 'static,
            B: DeserializeOwned + Send + 'static,
        {
            self.register(Method::$method, template, schemas, handler)
        }
    };
}

impl<C> Router<C>
where
    C: Send + 'static,
{
    /// Creates an empty router whose handlers get their custom context from `provider`.
    pub fn new(provider: impl ContextProvider<C> + 'static) -> Self {
        Self { routes: Vec::new(), provider: Arc::new(provider), body_limit: DEFAULT_BODY_LIMIT }
    }

    /// Largest body, in bytes, read for the routes of this router; larger bodies get a 413.
    pub fn body_limit(&mut self, limit: usize) -> &mut Self {
        self.body_limit = limit;
        self
    }

    /// Appends a route.
    ///
    /// Fails when the template's placeholders and the params schema's keys differ, when
    /// the template can not be compiled or when one of the schemas is not a valid schema.
    pub fn register<H, P, Q, B>(
        &mut self,
        method: Method,
        template: &str,
        schemas: Schemas,
        handler: H,
    ) -> Result<&mut Self, RouteDefinitionError>
    where
        H: RouteHandler<C, P, Q, B>,
        P: DeserializeOwned + Send + 'static,
        Q: DeserializeOwned + Send + 'static,
        B: DeserializeOwned + Send + 'static,
    {
        let matcher = Matcher::compile(template)?;
        check_params_symmetry(&matcher, schemas.params.as_ref())?;

        let compile = |section: &'static str, schema: &Schema| {
            Validator::compile(schema).map_err(|source| RouteDefinitionError::InvalidSchema {
                template: template.to_string(),
                section,
                source,
            })
        };
        let no_fields = Schema::object().build();

        let route = Route {
            params: compile("params", schemas.params.as_ref().unwrap_or(&no_fields))?,
            query: compile("query", schemas.query.as_ref().unwrap_or(&no_fields))?,
            body: schemas.body.as_ref().map(|schema| compile("body", schema)).transpose()?,
            returns: schemas.returns.as_ref().map(|schema| compile("returns", schema)).transpose()?,
            endpoint: Box::new(TypedEndpoint::<H, P, Q, B>::new(handler)),
            method,
            matcher,
        };

        debug!(method = %route.method, template, "route registered");
        self.routes.push(Arc::new(route));
        Ok(self)
    }

    method_route!(get, GET);
    method_route!(post, POST);
    method_route!(put, PUT);
    method_route!(patch, PATCH);
    method_route!(delete, DELETE);
    method_route!(head, HEAD);
    method_route!(options, OPTIONS);
}

impl<C> Router<C>
where
    C: Send + 'static,
{
    /// The first route, in registration order, answering `method` on `path`.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<&Route<C>> {
        self.find(method, path).map(|(route, _)| route.as_ref())
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route<C>> {
        self.routes.iter().map(AsRef::as_ref)
    }

    fn find(&self, method: &Method, path: &str) -> Option<(&Arc<Route<C>>, PathParams)> {
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| route.matcher.matches(path).map(|params| (route, params)))
    }
}

/// Every placeholder needs a params schema key and every params schema key a placeholder.
fn check_params_symmetry(matcher: &Matcher, params: Option<&Schema>) -> Result<(), RouteDefinitionError> {
    let template = || matcher.template().to_string();

    let Some(schema) = params else {
        return match matcher.names().first() {
            Some(param) => Err(RouteDefinitionError::MissingParamSchema { template: template(), param: param.clone() }),
            None => Ok(()),
        };
    };

    let Some(keys) = schema.property_names() else {
        return Err(RouteDefinitionError::InvalidParamsSchema { template: template() });
    };

    if let Some(param) = matcher.names().iter().find(|name| !keys.contains(&name.as_str())) {
        return Err(RouteDefinitionError::MissingParamSchema { template: template(), param: param.clone() });
    }

    if let Some(key) = keys.iter().find(|key| !matcher.names().iter().any(|name| name == *key)) {
        return Err(RouteDefinitionError::MissingPathParameter { template: template(), param: key.to_string() });
    }

    Ok(())
}
