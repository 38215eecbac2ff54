//! Schema validated, typed routes for JSON APIs.
//!
//! A route declares schemas for its path parameters, query, body and response. Incoming
//! sections are validated (path and query strings coerced to their declared types) before
//! the handler runs, and whatever the handler returns is checked against the response
//! schema before it is sent. Handlers receive one [`RouteContext`] holding the decoded
//! sections plus a custom context built per request by the router's [`ContextProvider`].
//!
//! # Example
//! ```no_run
//! use serde::Deserialize;
//! use serde_json::{Value, json};
//! use tusk::schema::Schema;
//! use tusk::{App, BoxError, RouteContext, Router, Schemas, Server};
//!
//! #[derive(Deserialize)]
//! struct Params {
//!     param: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct Query {
//!     message: String,
//! }
//!
//! async fn echo(ctx: RouteContext<(), Params, Query>) -> Result<Value, BoxError> {
//!     Ok(json!({"param": ctx.params.param, "query": ctx.query.message}))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BoxError> {
//!     let mut router = Router::default();
//!     router.get(
//!         "/echo/:param",
//!         Schemas::new()
//!             .params(Schema::object().required("param", Schema::string()))
//!             .query(Schema::object().required("message", Schema::string()))
//!             .returns(Schema::object().required("param", Schema::string()).required("query", Schema::string())),
//!         echo,
//!     )?;
//!
//!     let server = Server::builder().address("127.0.0.1:8080").app(App::new().mount(router)).build()?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

mod app;
mod body;
mod context;
mod error;
mod handler;
mod request;
mod responder;
mod router;
mod server;

pub mod matcher;
pub mod schema;

pub use app::App;
pub use body::{BodyError, DEFAULT_BODY_LIMIT, RequestBody, ResponseBody};
pub use context::{BaseContext, ContextProvider, Continuation, Empty, EmptyContext, PipelineResult, RouteContext};
pub use error::{BoxError, HttpError, RouteDefinitionError, RouteError};
pub use handler::{Json, Reply, RouteHandler};
pub use request::{RequestHead, ResponseHandle};
pub use responder::ErrorCategory;
pub use router::{Route, Router, Schemas};
pub use server::{Server, ServerBuildError, ServerBuilder};
