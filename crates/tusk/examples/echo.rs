use serde::Deserialize;
use serde_json::{Value, json};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tusk::schema::Schema;
use tusk::{App, BoxError, RouteContext, Router, Schemas, Server};

#[derive(Deserialize)]
struct EchoParams {
    param: String,
}

#[derive(Deserialize)]
struct EchoQuery {
    message: String,
    times: Option<u32>,
}

// curl -v "http://127.0.0.1:8080/echo/hello%20params?message=hello%20query&times=2"
async fn echo(ctx: RouteContext<(), EchoParams, EchoQuery>) -> Result<Value, BoxError> {
    let query = ctx.query.message.repeat(ctx.query.times.unwrap_or(1) as usize);
    Ok(json!({"param": ctx.params.param, "query": query}))
}

// curl -v http://127.0.0.1:8080/health
async fn health(_ctx: RouteContext<()>) -> Result<(), BoxError> {
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut router = Router::default();
    router
        .get(
            "/echo/:param",
            Schemas::new()
                .params(Schema::object().required("param", Schema::string()))
                .query(Schema::object().required("message", Schema::string()).optional("times", Schema::integer()))
                .returns(Schema::object().required("param", Schema::string()).required("query", Schema::string())),
            echo,
        )?
        .get("/health", Schemas::new(), health)?;

    Server::builder().app(App::new().mount(router)).address("127.0.0.1:8080").build()?.start().await?;
    Ok(())
}
