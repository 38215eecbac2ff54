use super::{Route, Router};
use crate::body::{BodyError, RequestBody, ResponseBody, read_json};
use crate::context::{Continuation, PipelineResult};
use crate::error::RouteError;
use crate::handler::DecodedInput;
use crate::matcher::PathParams;
use crate::request::{RequestHead, ResponseHandle};
use crate::responder::{self, ErrorCategory};
use crate::schema::{ValidateOptions, ValidationError};
use futures::future::BoxFuture;
use http::{Request, Response};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

impl<C> Router<C>
where
    C: Send + 'static,
{
    /// Dispatches `req` when one of the routes answers it, otherwise hands it back.
    pub(crate) fn try_dispatch(
        &self,
        req: Request<RequestBody>,
    ) -> Result<BoxFuture<'_, Response<ResponseBody>>, Request<RequestBody>> {
        let Some((route, params)) = self.find(req.method(), req.uri().path()) else {
            return Err(req);
        };
        let route = Arc::clone(route);
        Ok(Box::pin(self.dispatch(route, params, req)))
    }

    async fn dispatch(
        &self,
        route: Arc<Route<C>>,
        params: PathParams,
        req: Request<RequestBody>,
    ) -> Response<ResponseBody> {
        let (parts, body) = req.into_parts();
        let head = Arc::new(RequestHead::from(parts));

        if !head.accepts_json() {
            debug!(path = head.path(), "client does not accept json");
            return responder::not_acceptable();
        }

        let run = {
            let head = Arc::clone(&head);
            let body = LimitedBody { body, limit: self.body_limit };
            Continuation::new(move |custom: C| -> BoxFuture<'static, PipelineResult> {
                Box::pin(run_pipeline(route, params, head, body, custom))
            })
        };

        match self.provider.provide(head, run).await {
            Ok(response) => response,
            Err(e) => responder::fault_response(&e),
        }
    }
}

struct LimitedBody {
    body: RequestBody,
    limit: usize,
}

/// Everything after context acquisition: decode params, query and body, call the handler,
/// check its value against the response schema.
async fn run_pipeline<C>(
    route: Arc<Route<C>>,
    params: PathParams,
    req: Arc<RequestHead>,
    body: LimitedBody,
    custom: C,
) -> PipelineResult
where
    C: Send + 'static,
{
    let params = match route.params.validate(params.into_json(), ValidateOptions::coerce()) {
        Ok(params) => params,
        Err(errors) => return Ok(rejected(&route, ErrorCategory::InvalidParameters, &errors)),
    };

    let query = match route.query.validate(req.query_json(), ValidateOptions::coerce()) {
        Ok(query) => query,
        Err(errors) => return Ok(rejected(&route, ErrorCategory::InvalidQuery, &errors)),
    };

    let body = match &route.body {
        None => Value::Object(Map::new()),
        Some(validator) => {
            let raw = match read_json(body.body, body.limit).await {
                Ok(raw) => raw,
                Err(BodyError::Malformed(e)) => {
                    let errors = [ValidationError::invalid("body", "json", e.to_string())];
                    return Ok(rejected(&route, ErrorCategory::InvalidBody, &errors));
                }
                Err(BodyError::TooLarge { limit }) => {
                    debug!(method = %route.method, template = route.template(), limit, "request body too large");
                    return Ok(responder::payload_too_large());
                }
                Err(BodyError::Read(e)) => return Err(RouteError::ReadBody(e).into()),
            };
            match validator.validate(raw, ValidateOptions::strict()) {
                Ok(body) => body,
                Err(errors) => return Ok(rejected(&route, ErrorCategory::InvalidBody, &errors)),
            }
        }
    };

    let res = ResponseHandle::new();
    let input = DecodedInput { params, query, body, req, res: res.clone() };

    let Some(value) = route.endpoint.invoke(input, custom).await? else {
        return Ok(responder::no_content(res.take_headers()));
    };

    let Some(returns) = &route.returns else {
        let template = route.template().to_string();
        return Err(RouteError::MissingResponseSchema { method: route.method.clone(), template }.into());
    };

    let value = returns
        .validate(value, ValidateOptions::strict())
        .map_err(|errors| RouteError::InvalidResponse {
            method: route.method.clone(),
            template: route.template().to_string(),
            errors,
        })?;

    Ok(responder::json_ok(&value, res.take_headers()))
}

fn rejected<C>(route: &Route<C>, category: ErrorCategory, errors: &[ValidationError]) -> Response<ResponseBody> {
    let template = route.template();
    debug!(method = %route.method, template, %category, errors = errors.len(), "request rejected");
    responder::validation_failed(category, errors)
}
