//! A user API behind an `x-auth-token` header.
//!
//! The context provider checks a connection out of a small pool, resolves the token to a
//! user and hands both to the handlers. The connection goes back to the pool when the
//! request is done, whatever its outcome.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;
use tusk::schema::Schema;
use tusk::{
    App, BoxError, Continuation, Empty, HttpError, Json, PipelineResult, RequestHead, RouteContext, Router, Schemas,
    Server,
};

#[derive(Debug, Clone, Serialize)]
struct User {
    id: u64,
    name: String,
}

#[derive(Default)]
struct Store {
    users: HashMap<u64, User>,
    tokens: HashMap<String, u64>,
}

/// A pooled handle to the store, returned to the pool on drop.
struct Connection {
    store: Arc<Mutex<Store>>,
    _permit: OwnedSemaphorePermit,
}

impl Connection {
    fn with<T>(&self, f: impl FnOnce(&mut Store) -> T) -> T {
        f(&mut self.store.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[derive(Clone)]
struct Pool {
    store: Arc<Mutex<Store>>,
    permits: Arc<Semaphore>,
}

impl Pool {
    async fn connect(&self) -> Result<Connection, BoxError> {
        let permit = Arc::clone(&self.permits).acquire_owned().await?;
        Ok(Connection { store: Arc::clone(&self.store), _permit: permit })
    }
}

struct AppContext {
    db: Connection,
    user: Option<User>,
}

async fn provide(pool: Pool, req: Arc<RequestHead>, run: Continuation<AppContext>) -> PipelineResult {
    let db = pool.connect().await?;
    let user = req.header("x-auth-token").and_then(|token| {
        db.with(|store| store.tokens.get(token).and_then(|id| store.users.get(id)).cloned())
    });
    run.run(AppContext { db, user }).await
}

#[derive(Deserialize)]
struct UserParams {
    id: u64,
}

#[derive(Deserialize)]
struct NewUser {
    name: String,
}

fn user_schema() -> Schema {
    Schema::object().required("id", Schema::integer()).required("name", Schema::string()).build()
}

// curl -v -H "x-auth-token: secret" http://127.0.0.1:8080/me
async fn me(ctx: RouteContext<AppContext>) -> Result<Json<User>, BoxError> {
    ctx.user.clone().map(Json).ok_or_else(|| HttpError::unauthorized("unauthorized: no user").into())
}

// curl -v http://127.0.0.1:8080/users/1
async fn show(ctx: RouteContext<AppContext, UserParams>) -> Result<Json<User>, BoxError> {
    let id = ctx.params.id;
    ctx.db
        .with(|store| store.users.get(&id).cloned())
        .map(Json)
        .ok_or_else(|| HttpError::not_found(format!("no user {id}")).into())
}

// curl -v -H "x-auth-token: secret" -d '{"name":"grace"}' http://127.0.0.1:8080/users
async fn create(ctx: RouteContext<AppContext, Empty, Empty, NewUser>) -> Result<Json<User>, BoxError> {
    if ctx.user.is_none() {
        return Err(HttpError::unauthorized("unauthorized: no user").into());
    }
    let name = ctx.body.name.clone();
    let user = ctx.db.with(|store| {
        let id = store.users.keys().max().copied().unwrap_or_default() + 1;
        let user = User { id, name };
        store.users.insert(id, user.clone());
        user
    });
    info!(id = user.id, "user created");
    Ok(Json(user))
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut store = Store::default();
    store.users.insert(1, User { id: 1, name: "ada".to_string() });
    store.tokens.insert("secret".to_string(), 1);
    let pool = Pool { store: Arc::new(Mutex::new(store)), permits: Arc::new(Semaphore::new(4)) };

    let mut router =
        Router::new(move |req: Arc<RequestHead>, run: Continuation<AppContext>| provide(pool.clone(), req, run));
    router
        .get("/me", Schemas::new().returns(user_schema()), me)?
        .get(
            "/users/:id",
            Schemas::new().params(Schema::object().required("id", Schema::integer())).returns(user_schema()),
            show,
        )?
        .post(
            "/users",
            Schemas::new().body(Schema::object().required("name", Schema::string())).returns(user_schema()),
            create,
        )?;

    Server::builder().app(App::new().mount(router)).address("127.0.0.1:8080").build()?.start().await?;
    Ok(())
}
