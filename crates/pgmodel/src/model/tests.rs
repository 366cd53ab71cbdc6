use super::*;
use crate::backend::MemoryBackend;
use crate::config::OrmConfig;
use crate::params;
use tokio_postgres::types::Type;
use tokio_util::sync::CancellationToken;

fn orm(backend: MemoryBackend) -> Orm<MemoryBackend> {
    Orm::new(backend, OrmConfig::new()).unwrap()
}

fn row(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_default_select() {
    let orm = orm(MemoryBackend::new());
    let qb = orm.table("users");
    assert_eq!(qb.to_select_sql().sql(), "SELECT users.* FROM users");
    assert!(qb.to_select_sql().params().is_empty());
}

#[test]
fn test_table_and_columns_are_sanitized() {
    let orm = orm(MemoryBackend::new());
    let mut qb = orm.table("users; DROP TABLE users");
    qb.select(&["id", "name--"]);
    assert_eq!(
        qb.to_select_sql().sql(),
        "SELECT id, name FROM usersDROPTABLEusers"
    );
}

#[test]
fn test_where_or_where() {
    let orm = orm(MemoryBackend::new());
    let mut qb = orm.table("users");
    qb.and_where("id", "=", 1).unwrap().or_where("id", "=", 2).unwrap();
    let rendered = qb.to_select_sql();
    assert_eq!(
        rendered.sql(),
        "SELECT users.* FROM users WHERE id = $1 OR id = $2"
    );
    assert_eq!(rendered.params_debug(), vec!["1", "2"]);
}

#[test]
fn test_operator_is_case_insensitive() {
    let orm = orm(MemoryBackend::new());
    let mut qb = orm.table("users");
    qb.and_where("name", "not like", "a%")
        .unwrap()
        .and_where("email", " like ", "%@x.com")
        .unwrap();
    assert_eq!(
        qb.to_select_sql().sql(),
        "SELECT users.* FROM users WHERE name NOT LIKE $1 AND email LIKE $2"
    );
}

#[test]
fn test_invalid_operator_fails_fast() {
    let orm = orm(MemoryBackend::new());
    let mut qb = orm.table("users");
    for op in ["==", "; DROP", "BETWEEN", ""] {
        let err = qb.and_where("id", op, 1).unwrap_err();
        assert!(err.is_invalid_operator(), "{op:?} should be rejected");
        assert!(qb.or_where("id", op, 1).unwrap_err().is_invalid_operator());
    }
    assert_eq!(qb.to_select_sql().sql(), "SELECT users.* FROM users");
    assert!(orm.backend().prepared().is_empty());
}

#[test]
fn test_in_and_null_operators() {
    let orm = orm(MemoryBackend::new());
    let mut qb = orm.table("users");
    qb.and_where("role_id", "IN", vec![1i32, 2, 3])
        .unwrap()
        .and_where("deleted_at", "IS NULL", Value::Null)
        .unwrap()
        .and_where("id", "NOT IN", vec![9i64])
        .unwrap();
    let rendered = qb.to_select_sql();
    assert_eq!(
        rendered.sql(),
        "SELECT users.* FROM users WHERE role_id = ANY($1) AND deleted_at IS NULL AND id <> ALL($2)"
    );
    assert_eq!(rendered.params().len(), 2);
}

#[test]
fn test_full_select_clause_order() {
    let orm = orm(MemoryBackend::new());
    let mut qb = orm.table("orders");
    qb.select(&["user_id", "status"])
        .join("users", "users.id = orders.user_id AND users.active = $1", params![true])
        .cross_join("regions")
        .and_where("status", "<>", "void")
        .unwrap()
        .or_where("total", ">", 500i64)
        .unwrap()
        .group_by(&["user_id", "status"])
        .having("status", "<>", "draft")
        .unwrap()
        .having_raw("COUNT(*) > ?", params![2i64])
        .unwrap()
        .order_by("user_id", Direction::Desc)
        .limit(10)
        .offset(30);

    let rendered = qb.to_select_sql();
    assert_eq!(
        rendered.sql(),
        "SELECT user_id, status FROM orders \
         INNER JOIN users ON users.id = orders.user_id AND users.active = $1 \
         CROSS JOIN regions \
         WHERE status <> $2 OR total > $3 \
         GROUP BY user_id, status \
         HAVING status <> $4 AND COUNT(*) > $5 \
         ORDER BY user_id DESC LIMIT 10 OFFSET 30"
    );
    assert_eq!(
        rendered.params_debug(),
        vec!["true", "\"void\"", "500", "\"draft\"", "2"]
    );
}

#[test]
fn test_left_and_right_join() {
    let orm = orm(MemoryBackend::new());
    let mut qb = orm.table("users");
    qb.left_join("roles", "roles.id = users.role_id", params![])
        .right_join("teams", "teams.id = users.team_id", params![]);
    assert_eq!(
        qb.to_select_sql().sql(),
        "SELECT users.* FROM users LEFT JOIN roles ON roles.id = users.role_id \
         RIGHT JOIN teams ON teams.id = users.team_id"
    );
}

#[test]
fn test_having_raw_arg_mismatch() {
    let orm = orm(MemoryBackend::new());
    let mut qb = orm.table("orders");
    let err = qb
        .having_raw("SUM(total) > ? AND COUNT(*) > ?", params![1i64])
        .unwrap_err();
    assert!(err.is_invalid_argument());
    assert_eq!(qb.to_select_sql().sql(), "SELECT orders.* FROM orders");
}

#[test]
fn test_having_raw_counts_every_question_mark() {
    let orm = orm(MemoryBackend::new());
    let mut qb = orm.table("orders");
    let err = qb
        .group_by(&["customer_id"])
        .having_raw("bool_or(meta ? 'vip') AND COUNT(*) > ?", params![2i64])
        .unwrap_err();
    assert!(err.is_invalid_argument());

    qb.having_raw(
        "bool_or(jsonb_exists(meta, ?)) AND COUNT(*) > ?",
        params!["vip", 2i64],
    )
    .unwrap();
    assert_eq!(
        qb.to_select_sql().sql(),
        "SELECT orders.* FROM orders GROUP BY customer_id \
         HAVING bool_or(jsonb_exists(meta, $1)) AND COUNT(*) > $2"
    );
}

#[test]
fn test_paginate() {
    let orm = orm(MemoryBackend::new());
    let mut qb = orm.table("posts");
    qb.paginate(3, 25);
    assert_eq!(
        qb.to_select_sql().sql(),
        "SELECT posts.* FROM posts LIMIT 25 OFFSET 50"
    );
    qb.paginate(0, 10);
    assert_eq!(
        qb.to_select_sql().sql(),
        "SELECT posts.* FROM posts LIMIT 10 OFFSET 0"
    );
}

#[test]
fn test_render_is_idempotent() {
    let orm = orm(MemoryBackend::new());
    let mut qb = orm.table("users");
    qb.and_where("age", ">", 18)
        .unwrap()
        .or_where("vip", "=", true)
        .unwrap()
        .order_by("id", Direction::Asc);
    let first = qb.to_select_sql();
    let second = qb.to_select_sql();
    assert_eq!(first.sql(), second.sql());
    assert_eq!(first.params_debug(), second.params_debug());
}

#[test]
fn test_update_numbering_continues_into_where() {
    let orm = orm(MemoryBackend::new());
    let mut qb = orm.table("users");
    qb.and_where("id", "=", 1).unwrap();
    let fields = Fields::new().set("email", "new@x.com");
    let rendered = qb.to_update_sql(&fields).unwrap();
    assert_eq!(rendered.sql(), "UPDATE users SET email = $1 WHERE id = $2");
    assert_eq!(rendered.params_debug(), vec!["\"new@x.com\"", "1"]);
}

#[test]
fn test_delete_sql() {
    let orm = orm(MemoryBackend::new());
    let mut qb = orm.table("sessions");
    qb.and_where("expires_at", "<", 100i64).unwrap().limit(5);
    assert_eq!(
        qb.to_delete_sql().sql(),
        "DELETE FROM sessions WHERE expires_at < $1"
    );
}

#[tokio::test]
async fn test_get_empty_is_success_first_is_not_found() {
    let orm = orm(MemoryBackend::new());

    let rows = orm
        .table("users")
        .select(&["id", "username"])
        .and_where("id", "=", 42)
        .unwrap()
        .get()
        .await
        .unwrap();
    assert!(rows.is_empty());

    let err = orm
        .table("users")
        .select(&["id", "username"])
        .and_where("id", "=", 42)
        .unwrap()
        .first()
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let last = orm.backend().last_query().unwrap();
    assert_eq!(
        last.sql,
        "SELECT id, username FROM users WHERE id = $1 LIMIT 1"
    );
    assert_eq!(last.params, vec!["42"]);
}

#[tokio::test]
async fn test_first_returns_head() {
    let backend = MemoryBackend::new().with_rows(vec![
        row(&[("id", Value::Int(1)), ("username", Value::from("alice"))]),
        row(&[("id", Value::Int(2)), ("username", Value::from("bob"))]),
    ]);
    let orm = orm(backend);
    let user = orm.table("users").first().await.unwrap();
    assert_eq!(user["username"].as_str(), Some("alice"));
}

#[tokio::test]
async fn test_create_stamps_timestamps() {
    let inserted = row(&[
        ("id", Value::Int(7)),
        ("username", Value::from("alice")),
        ("email", Value::from("a@x.com")),
        ("password", Value::from("p")),
        ("created_at", Value::Timestamp(chrono::Utc::now())),
        ("updated_at", Value::Timestamp(chrono::Utc::now())),
    ]);
    let orm = orm(MemoryBackend::new().with_rows(vec![inserted]));

    let fields = Fields::new()
        .set("username", "alice")
        .set("email", "a@x.com")
        .set("password", "p");
    let user = orm.table("users").create(fields).await.unwrap();

    assert_eq!(user["id"].as_i64(), Some(7));
    assert!(user.contains_key("created_at"));
    assert!(user.contains_key("updated_at"));

    let query = orm.backend().last_query().unwrap();
    assert_eq!(
        query.sql,
        "INSERT INTO users (created_at, email, password, updated_at, username) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *"
    );
    assert_eq!(query.params.len(), 5);
    assert_eq!(query.params[0], query.params[3]);
    assert_eq!(query.params[4], "\"alice\"");
}

#[test]
fn test_stamped_timestamps_bind_to_plain_and_zoned_columns() {
    let mut fields = Fields::new().set("username", "alice");
    stamp_timestamps(&mut fields, chrono::Utc::now());

    for (column, param) in fields.iter() {
        if column == "username" {
            continue;
        }
        for ty in [Type::TIMESTAMP, Type::TIMESTAMPTZ] {
            let mut buf = bytes::BytesMut::new();
            param
                .to_sql_checked(&ty, &mut buf)
                .unwrap_or_else(|e| panic!("{column} as {ty}: {e}"));
        }
    }
}

#[tokio::test]
async fn test_create_keeps_caller_timestamps() {
    let orm = orm(MemoryBackend::new().with_rows(vec![row(&[("id", Value::Int(1))])]));
    let fields = Fields::new()
        .set("name", "x")
        .set("created_at", "2020-01-01T00:00:00Z");
    orm.table("things").create(fields).await.unwrap();

    let query = orm.backend().last_query().unwrap();
    assert_eq!(
        query.sql,
        "INSERT INTO things (created_at, name, updated_at) VALUES ($1, $2, $3) RETURNING *"
    );
    assert_eq!(query.params[0], "\"2020-01-01T00:00:00Z\"");
}

#[tokio::test]
async fn test_create_without_returned_row_fails() {
    let orm = orm(MemoryBackend::new());
    let err = orm
        .table("users")
        .create(Fields::new().set("username", "a"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrmError::Execution {
            operation: Operation::Create,
            ..
        }
    ));
}

#[tokio::test]
async fn test_empty_fields_are_rejected_before_compiling() {
    let orm = orm(MemoryBackend::new());

    let err = orm.table("users").create(Fields::new()).await.unwrap_err();
    assert!(err.is_invalid_argument());

    let err = orm
        .table("users")
        .and_where("id", "=", 1)
        .unwrap()
        .update(Fields::new())
        .await
        .unwrap_err();
    assert!(err.is_invalid_argument());

    assert!(orm.backend().prepared().is_empty());
    assert!(orm.backend().executed().is_empty());
}

#[tokio::test]
async fn test_update_returns_affected() {
    let orm = orm(MemoryBackend::new().with_affected(1));
    let affected = orm
        .table("users")
        .and_where("id", "=", 1)
        .unwrap()
        .update(Fields::new().set("email", "new@x.com"))
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let query = orm.backend().last_query().unwrap();
    assert_eq!(query.sql, "UPDATE users SET email = $1 WHERE id = $2");
    assert_eq!(query.params, vec!["\"new@x.com\"", "1"]);
}

#[tokio::test]
async fn test_delete_returns_affected() {
    let orm = orm(MemoryBackend::new().with_affected(3));
    let affected = orm
        .table("sessions")
        .and_where("user_id", "=", 9i64)
        .unwrap()
        .delete()
        .await
        .unwrap();
    assert_eq!(affected, 3);
    assert_eq!(
        orm.backend().last_query().unwrap().sql,
        "DELETE FROM sessions WHERE user_id = $1"
    );
}

#[tokio::test]
async fn test_count() {
    let orm = orm(MemoryBackend::new().with_rows(vec![row(&[("count", Value::Int(12))])]));
    let total = orm
        .table("users")
        .and_where("age", ">=", 18)
        .unwrap()
        .paginate(2, 10)
        .count()
        .await
        .unwrap();
    assert_eq!(total, 12);
    assert_eq!(
        orm.backend().last_query().unwrap().sql,
        "SELECT COUNT(*) AS count FROM users WHERE age >= $1"
    );
}

#[tokio::test]
async fn test_same_sql_compiles_once() {
    let orm = orm(MemoryBackend::new());
    for id in 0..3 {
        orm.table("users")
            .and_where("id", "=", id)
            .unwrap()
            .get()
            .await
            .unwrap();
    }
    assert_eq!(
        orm.backend()
            .prepare_count("SELECT users.* FROM users WHERE id = $1"),
        1
    );
    assert_eq!(orm.backend().executed().len(), 3);
    assert_eq!(orm.cache_stats().hits, 2);
}

#[tokio::test]
async fn test_prepare_failure_is_classified() {
    let orm = orm(MemoryBackend::new().fail_prepare("missing"));
    let err = orm.table("missing").get().await.unwrap_err();
    match err {
        OrmError::Prepare { sql, .. } => assert_eq!(sql, "SELECT missing.* FROM missing"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(orm.cached_statements().await.is_empty());
}

#[tokio::test]
async fn test_canceled_context() {
    let orm = orm(MemoryBackend::new());
    let token = CancellationToken::new();
    token.cancel();
    let err = orm
        .table("users")
        .with_context(ExecContext::new().with_cancel(token))
        .get()
        .await
        .unwrap_err();
    assert!(err.is_canceled());
    assert!(orm.backend().executed().is_empty());
}

#[tokio::test]
async fn test_closed_pool_rejects_queries() {
    let orm = orm(MemoryBackend::new());
    orm.close().await.unwrap();
    let err = orm.table("users").get().await.unwrap_err();
    assert!(matches!(err, OrmError::Closed));
}
