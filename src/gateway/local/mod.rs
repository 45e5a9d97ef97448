//! SQLite implementation of the backend contract, for offline development and
//! tests. It mirrors the hosted tables, their uniqueness constraints and the
//! error codes callers match on.

mod schema;
mod token;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params, params_from_iter};
use serde_json::Value;
use uuid::Uuid;

use self::schema::{DATA_TABLES, SCHEMA};
use self::token::{PasswordHasher, digest, generate_token};
use super::{Backend, Filter, GatewayError, GatewayResult, Row, Select};
use crate::error::Result;
use crate::types::{CpvCode, Session, User};

/// Port the hosted backend's local development stack listens on.
pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:54321";

const SESSION_TTL_SECS: i64 = 3600;
const MIN_PASSWORD_LEN: usize = 6;

pub struct SqliteBackend {
    conn: Mutex<Connection>,
    hasher: PasswordHasher,
}

impl SqliteBackend {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::from_connection(Connection::open(db_path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
            hasher: PasswordHasher::new(),
        })
    }

    /// Argon2 runs on the blocking pool, never under the connection lock.
    async fn verify_password(&self, password: &str, hash: String) -> GatewayResult<bool> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| GatewayError::new(format!("password check aborted: {e}")))?
    }

    async fn hash_password(&self, password: &str) -> GatewayResult<String> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| GatewayError::new(format!("password hashing aborted: {e}")))?
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Creates an identity. Without a password the user can only get in
    /// through an invite session.
    pub fn create_user(&self, email: &str, password: Option<&str>) -> Result<User> {
        let hash = password.map(|p| self.hasher.hash(p)).transpose()?;
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
        };

        self.conn()
            .execute(
                "INSERT INTO auth_users (id, email, password_hash) VALUES (?1, ?2, ?3)",
                params![user.id, user.email, hash],
            )
            .map_err(db_err)?;

        Ok(user)
    }

    /// Issues a session for `email`, creating the identity if needed. The
    /// returned tokens are what an invite link carries.
    pub fn invite_user(&self, email: &str) -> Result<Session> {
        let existing = self
            .conn()
            .query_row(
                "SELECT id, email FROM auth_users WHERE email = ?1",
                params![email],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                    })
                },
            )
            .optional()?;

        let user = match existing {
            Some(user) => user,
            None => self.create_user(email, None)?,
        };

        Ok(issue_session(&self.conn(), user)?)
    }

    /// Loads catalog rows, replacing descriptions of codes already present.
    pub fn import_cpv_codes(&self, codes: &[CpvCode]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO t_cpv_codes ("CODE", "EN") VALUES (?1, ?2)
                   ON CONFLICT("CODE") DO UPDATE SET "EN" = excluded."EN""#,
            )?;
            for code in codes {
                stmt.execute(params![code.code, code.description])?;
            }
        }
        tx.commit()?;
        Ok(codes.len())
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn issue_session(conn: &Connection, user: User) -> GatewayResult<Session> {
    let access_token = generate_token("at");
    let refresh_token = generate_token("rt");
    let expires_at = Utc::now() + TimeDelta::seconds(SESSION_TTL_SECS);

    conn.execute(
        "INSERT INTO auth_sessions (access_digest, refresh_digest, user_id, expires_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            digest(&access_token),
            digest(&refresh_token),
            user.id,
            expires_at.to_rfc3339()
        ],
    )
    .map_err(db_err)?;

    Ok(Session {
        access_token,
        refresh_token,
        expires_at: Some(expires_at),
        user,
    })
}

fn user_for_access(conn: &Connection, access_token: &str) -> GatewayResult<User> {
    let found = conn
        .query_row(
            "SELECT u.id, u.email, s.expires_at
             FROM auth_sessions s JOIN auth_users u ON u.id = s.user_id
             WHERE s.access_digest = ?1",
            params![digest(access_token)],
            |row| {
                Ok((
                    User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                    },
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()
        .map_err(db_err)?;

    let (user, expires_at) = found.ok_or_else(|| {
        GatewayError::unauthorized("invalid JWT: unable to parse or verify signature")
            .with_code("bad_jwt")
    })?;

    match parse_datetime(&expires_at) {
        Some(expiry) if expiry > Utc::now() => Ok(user),
        _ => Err(GatewayError::unauthorized("invalid JWT: token is expired").with_code("bad_jwt")),
    }
}

fn authorize(conn: &Connection, auth: Option<&str>) -> GatewayResult<()> {
    match auth {
        Some(token) => user_for_access(conn, token).map(|_| ()),
        None => Ok(()),
    }
}

/// Maps SQLite failures onto the Postgres codes the hosted backend reports.
fn db_err(err: rusqlite::Error) -> GatewayError {
    if let rusqlite::Error::SqliteFailure(failure, detail) = &err {
        if failure.code == ErrorCode::ConstraintViolation {
            let detail = detail.clone().unwrap_or_else(|| err.to_string());
            return match failure.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    GatewayError::unique_violation(detail)
                }
                rusqlite::ffi::SQLITE_CONSTRAINT_NOTNULL => {
                    GatewayError::new(detail).with_status(400).with_code("23502")
                }
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    GatewayError::new(detail).with_status(409).with_code("23503")
                }
                _ => GatewayError::new(detail).with_status(400).with_code("23000"),
            };
        }
    }
    GatewayError::new(err.to_string()).with_status(500)
}

fn check_table(table: &str) -> GatewayResult<()> {
    if DATA_TABLES.contains(&table) {
        Ok(())
    } else {
        Err(
            GatewayError::new(format!("relation \"public.{table}\" does not exist"))
                .with_status(404)
                .with_code("42P01"),
        )
    }
}

fn ident(name: &str) -> GatewayResult<String> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(format!("\"{name}\""))
    } else {
        Err(GatewayError::new(format!("invalid column name: {name}"))
            .with_status(400)
            .with_code("42703"))
    }
}

fn column_list(columns: &str) -> GatewayResult<String> {
    if columns.trim() == "*" {
        return Ok("*".to_string());
    }
    let idents = columns
        .split(',')
        .map(|c| ident(c.trim()))
        .collect::<GatewayResult<Vec<_>>>()?;
    Ok(idents.join(", "))
}

fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(hex::encode(b)),
    }
}

fn where_clause(filters: &[Filter], params: &mut Vec<SqlValue>) -> GatewayResult<String> {
    if filters.is_empty() {
        return Ok(String::new());
    }

    let mut clauses = Vec::with_capacity(filters.len());
    for filter in filters {
        let column = ident(filter.column())?;
        let clause = match filter {
            Filter::Eq {
                value: Value::Null, ..
            } => format!("{column} IS NULL"),
            Filter::Eq { value, .. } => {
                params.push(sql_value(value));
                format!("{column} = ?")
            }
            // LIKE is case-insensitive for ASCII in SQLite.
            Filter::ILike { pattern, .. } => {
                params.push(SqlValue::Text(pattern.clone()));
                format!("{column} LIKE ?")
            }
            Filter::In { values, .. } if values.is_empty() => "0".to_string(),
            Filter::In { values, .. } => {
                params.extend(values.iter().map(sql_value));
                let marks = vec!["?"; values.len()].join(", ");
                format!("{column} IN ({marks})")
            }
        };
        clauses.push(clause);
    }

    Ok(format!(" WHERE {}", clauses.join(" AND ")))
}

fn require_filters(filters: &[Filter], verb: &str) -> GatewayResult<()> {
    if filters.is_empty() {
        Err(GatewayError::new(format!("{verb} requires a WHERE clause"))
            .with_status(400)
            .with_code("21000"))
    } else {
        Ok(())
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn public_url(&self) -> &str {
        DEFAULT_PUBLIC_URL
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> GatewayResult<Session> {
        let found = self
            .conn()
            .query_row(
                "SELECT id, email, password_hash FROM auth_users WHERE email = ?1",
                params![email],
                |row| {
                    Ok((
                        User {
                            id: row.get(0)?,
                            email: row.get(1)?,
                        },
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(db_err)?;

        let invalid = || {
            GatewayError::new("Invalid login credentials")
                .with_status(400)
                .with_code("invalid_credentials")
        };

        let (user, hash) = found.ok_or_else(invalid)?;
        let hash = hash.ok_or_else(invalid)?;
        if !self.verify_password(password, hash).await? {
            return Err(invalid());
        }

        issue_session(&self.conn(), user)
    }

    async fn get_user(&self, access_token: &str) -> GatewayResult<User> {
        user_for_access(&self.conn(), access_token)
    }

    async fn refresh_session(&self, refresh_token: &str) -> GatewayResult<Session> {
        let conn = self.conn();
        let refresh_digest = digest(refresh_token);

        let user = conn
            .query_row(
                "SELECT u.id, u.email FROM auth_sessions s JOIN auth_users u ON u.id = s.user_id
                 WHERE s.refresh_digest = ?1",
                params![refresh_digest],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| {
                GatewayError::new("Invalid Refresh Token: Refresh Token Not Found")
                    .with_status(400)
                    .with_code("refresh_token_not_found")
            })?;

        conn.execute(
            "DELETE FROM auth_sessions WHERE refresh_digest = ?1",
            params![refresh_digest],
        )
        .map_err(db_err)?;

        issue_session(&conn, user)
    }

    async fn sign_out(&self, access_token: &str) -> GatewayResult<()> {
        let conn = self.conn();
        let user = user_for_access(&conn, access_token)?;
        conn.execute(
            "DELETE FROM auth_sessions WHERE user_id = ?1",
            params![user.id],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_password(&self, access_token: &str, password: &str) -> GatewayResult<User> {
        let user = user_for_access(&self.conn(), access_token)?;

        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(GatewayError::new(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters."
            ))
            .with_status(422)
            .with_code("weak_password"));
        }

        let hash = self.hash_password(password).await?;
        self.conn()
            .execute(
                "UPDATE auth_users SET password_hash = ?1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
                 WHERE id = ?2",
                params![hash, user.id],
            )
            .map_err(db_err)?;

        Ok(user)
    }

    async fn select(&self, auth: Option<&str>, query: &Select) -> GatewayResult<Vec<Row>> {
        check_table(&query.table)?;
        let conn = self.conn();
        authorize(&conn, auth)?;

        let mut params = Vec::new();
        let mut sql = format!(
            "SELECT {} FROM \"{}\"{}",
            column_list(&query.columns)?,
            query.table,
            where_clause(&query.filters, &mut params)?
        );
        match &query.order {
            Some(order) => {
                let direction = if order.ascending { "ASC" } else { "DESC" };
                sql.push_str(&format!(" ORDER BY {} {direction}", ident(&order.column)?));
            }
            None => sql.push_str(" ORDER BY rowid"),
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                let mut map = Row::new();
                for (i, name) in names.iter().enumerate() {
                    map.insert(name.clone(), json_value(row.get_ref(i)?));
                }
                Ok(map)
            })
            .map_err(db_err)?;

        let collected = rows.collect::<std::result::Result<Vec<_>, _>>();
        collected.map_err(db_err)
    }

    async fn insert(&self, auth: Option<&str>, table: &str, rows: &[Row]) -> GatewayResult<()> {
        check_table(table)?;
        let mut conn = self.conn();
        authorize(&conn, auth)?;

        // A bulk insert lands entirely or not at all.
        let tx = conn.transaction().map_err(db_err)?;
        for row in rows {
            if row.is_empty() {
                tx.execute(&format!("INSERT INTO \"{table}\" DEFAULT VALUES"), [])
                    .map_err(db_err)?;
                continue;
            }
            let columns = row
                .keys()
                .map(|k| ident(k))
                .collect::<GatewayResult<Vec<_>>>()?;
            let marks = vec!["?"; columns.len()].join(", ");
            let sql = format!(
                "INSERT INTO \"{table}\" ({}) VALUES ({marks})",
                columns.join(", ")
            );
            let values: Vec<SqlValue> = row.values().map(sql_value).collect();
            tx.execute(&sql, params_from_iter(values.iter()))
                .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)
    }

    async fn update(
        &self,
        auth: Option<&str>,
        table: &str,
        values: &Row,
        filters: &[Filter],
    ) -> GatewayResult<()> {
        check_table(table)?;
        require_filters(filters, "UPDATE")?;
        let conn = self.conn();
        authorize(&conn, auth)?;

        if values.is_empty() {
            return Ok(());
        }

        let mut params: Vec<SqlValue> = Vec::with_capacity(values.len() + filters.len());
        let mut assignments = Vec::with_capacity(values.len());
        for (column, value) in values {
            assignments.push(format!("{} = ?", ident(column)?));
            params.push(sql_value(value));
        }
        let sql = format!(
            "UPDATE \"{table}\" SET {}{}",
            assignments.join(", "),
            where_clause(filters, &mut params)?
        );

        conn.execute(&sql, params_from_iter(params.iter()))
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete(&self, auth: Option<&str>, table: &str, filters: &[Filter]) -> GatewayResult<()> {
        check_table(table)?;
        require_filters(filters, "DELETE")?;
        let conn = self.conn();
        authorize(&conn, auth)?;

        let mut params = Vec::new();
        let sql = format!(
            "DELETE FROM \"{table}\"{}",
            where_clause(filters, &mut params)?
        );
        conn.execute(&sql, params_from_iter(params.iter()))
            .map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend() -> SqliteBackend {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.initialize().unwrap();
        backend
    }

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_unique_violation_code() {
        let backend = backend();
        let trial = row(json!({ "email": "a@b.com", "name": "Jane" }));

        backend
            .insert(None, "t_trial_subscriptions", &[trial.clone()])
            .await
            .unwrap();
        let err = backend
            .insert(None, "t_trial_subscriptions", &[trial])
            .await
            .unwrap_err();

        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_select_filters_and_order() {
        let backend = backend();
        backend
            .import_cpv_codes(&[
                CpvCode {
                    code: "45000000-7".into(),
                    description: "Construction work".into(),
                },
                CpvCode {
                    code: "44000000-0".into(),
                    description: "Construction structures and materials".into(),
                },
                CpvCode {
                    code: "03000000-1".into(),
                    description: "Agricultural products".into(),
                },
            ])
            .unwrap();

        let rows = backend
            .select(
                None,
                &Select::from("t_cpv_codes")
                    .contains("EN", "CONSTRUCTION")
                    .order("CODE", true),
            )
            .await
            .unwrap();
        let codes: Vec<_> = rows.iter().map(|r| r["CODE"].as_str().unwrap()).collect();
        assert_eq!(codes, vec!["44000000-0", "45000000-7"]);

        // Without an explicit order rows come back in ingestion order.
        let rows = backend
            .select(None, &Select::from("t_cpv_codes").limit(2))
            .await
            .unwrap();
        let codes: Vec<_> = rows.iter().map(|r| r["CODE"].as_str().unwrap()).collect();
        assert_eq!(codes, vec!["45000000-7", "44000000-0"]);
    }

    #[tokio::test]
    async fn test_unknown_table_rejected() {
        let backend = backend();
        let err = backend
            .select(None, &Select::from("auth_users"))
            .await
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("42P01"));
    }

    #[tokio::test]
    async fn test_delete_requires_filter() {
        let backend = backend();
        let err = backend
            .delete(None, "t_user_notices", &[])
            .await
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("21000"));
    }

    #[tokio::test]
    async fn test_sign_in_and_refresh() {
        let backend = backend();
        backend.create_user("jane@acme.test", Some("hunter22")).unwrap();

        let err = backend
            .sign_in_with_password("jane@acme.test", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("invalid_credentials"));

        let session = backend
            .sign_in_with_password("jane@acme.test", "hunter22")
            .await
            .unwrap();
        let user = backend.get_user(&session.access_token).await.unwrap();
        assert_eq!(user.email, "jane@acme.test");

        let refreshed = backend
            .refresh_session(&session.refresh_token)
            .await
            .unwrap();
        assert!(backend.get_user(&session.access_token).await.is_err());
        assert!(backend.get_user(&refreshed.access_token).await.is_ok());
        assert!(backend.refresh_session(&session.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn test_invited_user_sets_password() {
        let backend = backend();
        let session = backend.invite_user("new@acme.test").unwrap();

        let err = backend
            .sign_in_with_password("new@acme.test", "anything")
            .await
            .unwrap_err();
        assert_eq!(err.status, Some(400));

        let err = backend
            .update_password(&session.access_token, "short")
            .await
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("weak_password"));

        backend
            .update_password(&session.access_token, "long enough")
            .await
            .unwrap();
        assert!(
            backend
                .sign_in_with_password("new@acme.test", "long enough")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_invalid_token_rejected_for_data() {
        let backend = backend();
        let err = backend
            .select(Some("at_bogus"), &Select::from("t_cpv_codes"))
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_sign_ins() {
        let backend = std::sync::Arc::new(backend());
        backend.create_user("jane@acme.test", Some("hunter22")).unwrap();

        let attempts = (0..4).map(|i| {
            let backend = std::sync::Arc::clone(&backend);
            tokio::spawn(async move {
                let password = if i % 2 == 0 { "hunter22" } else { "wrong" };
                backend.sign_in_with_password("jane@acme.test", password).await
            })
        });

        let mut signed_in = 0;
        for attempt in attempts.collect::<Vec<_>>() {
            if attempt.await.unwrap().is_ok() {
                signed_in += 1;
            }
        }
        assert_eq!(signed_in, 2);
    }
}
