//! A small user repository on top of pgmodel.
//!
//! Run with: cargo run --example users -p pgmodel
//!
//! Connection settings come from `DB_HOST`, `DB_PORT`, `DB_USERNAME`,
//! `DB_PASSWORD`, `DB_NAME` and `DB_SSLMODE` (a `.env` file works too).
//! Set `ORM_QUERY_LOG=true` and `RUST_LOG=pgmodel=debug` to see every statement.

use pgmodel::{
    DatabaseConfig, Direction, ExecContext, Fields, Orm, OrmConfig, OrmError, OrmResult,
    PgBackend, Record,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

struct CreateUser<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

struct UserRepository<'a> {
    orm: &'a Orm<PgBackend>,
}

impl<'a> UserRepository<'a> {
    fn new(orm: &'a Orm<PgBackend>) -> Self {
        Self { orm }
    }

    async fn create(&self, user: &CreateUser<'_>) -> OrmResult<Record> {
        self.orm
            .table("users")
            .create(
                Fields::new()
                    .set("username", user.username.to_string())
                    .set("email", user.email.to_string())
                    .set("password", user.password.to_string()),
            )
            .await
    }

    async fn get_by_id(&self, ctx: ExecContext, id: i64) -> OrmResult<Record> {
        self.orm
            .table("users")
            .with_context(ctx)
            .select(&["id", "username", "email", "password"])
            .and_where("id", "=", id)?
            .first()
            .await
    }

    async fn list(&self, page: u64) -> OrmResult<Vec<Record>> {
        self.orm
            .table("users")
            .select(&["id", "username", "email"])
            .order_by("id", Direction::Asc)
            .paginate(page, 10)
            .get()
            .await
    }
}

#[tokio::main]
async fn main() -> Result<(), OrmError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let backend = PgBackend::connect(&DatabaseConfig::from_env()).await?;
    let orm = Orm::new(backend, OrmConfig::from_env()?)?;

    {
        let client = orm.backend().pool().get().await?;
        client
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS users (
                    id BIGSERIAL PRIMARY KEY,
                    username TEXT NOT NULL,
                    email TEXT NOT NULL,
                    password TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL
                )",
            )
            .await?;
    }

    let users = UserRepository::new(&orm);

    let created = users
        .create(&CreateUser {
            username: "alice",
            email: "alice@example.com",
            password: "hunter2",
        })
        .await?;
    println!("created: {created:?}");

    let id = created
        .get("id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| OrmError::Other("insert returned no id".into()))?;

    let ctx = ExecContext::new().with_timeout(Duration::from_secs(2));
    match users.get_by_id(ctx, id).await {
        Ok(user) => println!("found: {user:?}"),
        Err(e) if e.is_not_found() => println!("user {id} not found"),
        Err(e) => return Err(e),
    }

    for user in users.list(1).await? {
        println!(
            "{:>4}  {}",
            user.get("id").and_then(|v| v.as_i64()).unwrap_or_default(),
            user.get("username").and_then(|v| v.as_str()).unwrap_or("-"),
        );
    }

    let removed = orm
        .table("users")
        .and_where("id", "=", id)?
        .delete()
        .await?;
    println!("deleted {removed} row(s)");

    orm.close().await
}
