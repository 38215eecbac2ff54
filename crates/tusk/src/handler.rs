use crate::context::{BaseContext, RouteContext};
use crate::error::{BoxError, RouteError};
use crate::request::{RequestHead, ResponseHandle};
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// A route handler, taking the composed [`RouteContext`].
///
/// Implemented for async functions and closures such as
/// `async fn show(ctx: RouteContext<AppContext, UserParams>) -> Result<Json<User>, BoxError>`.
pub trait RouteHandler<C, P, Q, B>: Send + Sync + 'static {
    type Output: Reply;

    fn call(&self, ctx: RouteContext<C, P, Q, B>) -> BoxFuture<'_, Result<Self::Output, BoxError>>;
}

impl<C, P, Q, B, F, Fut, T> RouteHandler<C, P, Q, B> for F
where
    F: Fn(RouteContext<C, P, Q, B>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    T: Reply,
{
    type Output = T;

    fn call(&self, ctx: RouteContext<C, P, Q, B>) -> BoxFuture<'_, Result<Self::Output, BoxError>> {
        Box::pin((self)(ctx))
    }
}

/// What a handler returns: a JSON value, or nothing at all.
pub trait Reply: Send {
    /// `None` means "no value" and turns into a 204.
    fn into_value(self) -> Result<Option<Value>, serde_json::Error>;
}

impl Reply for () {
    fn into_value(self) -> Result<Option<Value>, serde_json::Error> {
        Ok(None)
    }
}

/// `Value::Null` counts as no value.
impl Reply for Value {
    fn into_value(self) -> Result<Option<Value>, serde_json::Error> {
        Ok(if self.is_null() { None } else { Some(self) })
    }
}

impl<T: Reply> Reply for Option<T> {
    fn into_value(self) -> Result<Option<Value>, serde_json::Error> {
        match self {
            Some(reply) => reply.into_value(),
            None => Ok(None),
        }
    }
}

/// Wraps any serializable value returned by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: Serialize + Send> Reply for Json<T> {
    fn into_value(self) -> Result<Option<Value>, serde_json::Error> {
        serde_json::to_value(self.0)?.into_value()
    }
}

/// The validated, still untyped, request sections.
#[derive(Debug)]
pub(crate) struct DecodedInput {
    pub(crate) params: Value,
    pub(crate) query: Value,
    pub(crate) body: Value,
    pub(crate) req: Arc<RequestHead>,
    pub(crate) res: ResponseHandle,
}

/// A handler with its input types erased, as stored in a route.
pub(crate) trait Endpoint<C>: Send + Sync {
    fn invoke(&self, input: DecodedInput, custom: C) -> BoxFuture<'_, Result<Option<Value>, BoxError>>;
}

pub(crate) struct TypedEndpoint<H, P, Q, B> {
    handler: H,
    _phantom: PhantomData<fn(P, Q, B)>,
}

impl<H, P, Q, B> TypedEndpoint<H, P, Q, B> {
    pub(crate) fn new(handler: H) -> Self {
        Self { handler, _phantom: PhantomData }
    }
}

fn decode<T: DeserializeOwned>(section: &'static str, value: Value) -> Result<T, RouteError> {
    serde_json::from_value(value).map_err(|source| RouteError::Decode { section, source })
}

impl<H, P, Q, B> TypedEndpoint<H, P, Q, B>
where
    P: DeserializeOwned,
    Q: DeserializeOwned,
    B: DeserializeOwned,
{
    async fn run<C>(&self, input: DecodedInput, custom: C) -> Result<Option<Value>, BoxError>
    where
        H: RouteHandler<C, P, Q, B>,
    {
        let DecodedInput { params, query, body, req, res } = input;
        let base = BaseContext {
            params: decode::<P>("params", params)?,
            query: decode::<Q>("query", query)?,
            body: decode::<B>("body", body)?,
            req,
            res,
        };

        let output = self.handler.call(RouteContext::compose(custom, base)).await?;
        Ok(output.into_value().map_err(RouteError::Serialize)?)
    }
}

impl<C, P, Q, B, H> Endpoint<C> for TypedEndpoint<H, P, Q, B>
where
    C: Send + 'static,
    P: DeserializeOwned + Send + 'static,
    Q: DeserializeOwned + Send + 'static,
    B: DeserializeOwned + Send + 'static,
    H: RouteHandler<C, P, Q, B>,
{
    fn invoke(&self, input: DecodedInput, custom: C) -> BoxFuture<'_, Result<Option<Value>, BoxError>> {
        Box::pin(self.run(input, custom))
    }
}

#[cfg(test)]
mod tests {
    use super::{DecodedInput, Endpoint, Json, Reply, RouteHandler, TypedEndpoint};
    use crate::context::{Empty, RouteContext};
    use crate::error::{BoxError, RouteError};
    use crate::request::ResponseHandle;
    use http::Request;
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};
    use std::sync::Arc;

    #[derive(Deserialize)]
    struct UserParams {
        id: u64,
    }

    #[derive(Serialize)]
    struct User {
        id: u64,
        name: String,
    }

    async fn show(ctx: RouteContext<String, UserParams>) -> Result<Json<User>, BoxError> {
        Ok(Json(User { id: ctx.params.id, name: ctx.custom().clone() }))
    }

    async fn nothing(_ctx: RouteContext<()>) -> Result<(), BoxError> {
        Ok(())
    }

    fn assert_is_handler<C, P, Q, B, H: RouteHandler<C, P, Q, B>>(_handler: &H) {
        // no op
    }

    fn input(params: Value) -> DecodedInput {
        DecodedInput {
            params,
            query: json!({}),
            body: json!({}),
            req: Arc::new(Request::get("/").body(()).unwrap().into_parts().0.into()),
            res: ResponseHandle::new(),
        }
    }

    #[test]
    fn assert_fn_is_route_handler() {
        assert_is_handler(&show);
        assert_is_handler(&nothing);
        assert_is_handler(&|_ctx: RouteContext<(), Empty, Empty, Value>| async { Ok::<_, BoxError>(Value::Null) });
    }

    #[test]
    fn test_replies() {
        assert_eq!(().into_value().unwrap(), None);
        assert_eq!(Value::Null.into_value().unwrap(), None);
        assert_eq!(None::<Json<u8>>.into_value().unwrap(), None);
        assert_eq!(Some(Json(1)).into_value().unwrap(), Some(json!(1)));
        assert_eq!(Json(json!({"a": 1})).into_value().unwrap(), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_typed_endpoint() {
        let endpoint = TypedEndpoint::new(show);
        let value = Endpoint::<String>::invoke(&endpoint, input(json!({"id": 42})), "ada".to_string()).await.unwrap();
        assert_eq!(value, Some(json!({"id": 42, "name": "ada"})));
    }

    #[tokio::test]
    async fn test_typed_endpoint_decode_failure() {
        let endpoint = TypedEndpoint::new(show);
        let err = Endpoint::<String>::invoke(&endpoint, input(json!({"id": "42"})), String::new()).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<RouteError>(), Some(RouteError::Decode { section: "params", .. })));
    }
}
