use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{Backend, Filter, GatewayError, GatewayResult, Row, Select};
use crate::config::GatewayConfig;
use crate::types::{Session, User};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Hosted backend reached over HTTPS: PostgREST under `/rest/v1`, auth under
/// `/auth/v1`.
#[derive(Clone)]
pub struct SupabaseBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    user: User,
}

impl From<TokenResponse> for Session {
    fn from(resp: TokenResponse) -> Self {
        Session {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            expires_at: resp
                .expires_in
                .and_then(TimeDelta::try_seconds)
                .map(|ttl| Utc::now() + ttl),
            user: resp.user,
        }
    }
}

impl SupabaseBackend {
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn request(&self, method: Method, url: String, auth: Option<&str>) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(auth.unwrap_or(&self.api_key))
    }

    fn rest(&self, method: Method, table: &str, auth: Option<&str>) -> RequestBuilder {
        self.request(method, format!("{}/rest/v1/{table}", self.base_url), auth)
    }

    fn auth(&self, method: Method, path: &str, auth: Option<&str>) -> RequestBuilder {
        self.request(method, format!("{}/auth/v1/{path}", self.base_url), auth)
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> GatewayResult<Session> {
        let resp = self
            .auth(Method::POST, "token", None)
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await?;
        let token: TokenResponse = expect_json(resp).await?;
        Ok(token.into())
    }
}

async fn expect_success(resp: Response) -> GatewayResult<Response> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(error_from_response(resp).await)
    }
}

async fn expect_json<T: serde::de::DeserializeOwned>(resp: Response) -> GatewayResult<T> {
    let resp = expect_success(resp).await?;
    resp.json().await.map_err(GatewayError::decode)
}

/// Builds an error from a PostgREST (`code`, `message`) or auth
/// (`error_code`, `msg`, `error_description`) failure body.
async fn error_from_response(resp: Response) -> GatewayError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    parse_error_body(status, &body)
}

fn parse_error_body(status: u16, body: &str) -> GatewayError {
    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) else {
        let message = if body.is_empty() {
            format!("request failed with status {status}")
        } else {
            body.to_string()
        };
        return GatewayError::new(message).with_status(status);
    };

    let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);

    let message = text("message")
        .or_else(|| text("msg"))
        .or_else(|| text("error_description"))
        .or_else(|| text("error"))
        .unwrap_or_else(|| format!("request failed with status {status}"));
    let code = text("error_code").or_else(|| text("code"));

    let error = GatewayError::new(message).with_status(status);
    match code {
        Some(code) => error.with_code(code),
        None => error,
    }
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(Filter::to_param).collect()
}

#[async_trait]
impl Backend for SupabaseBackend {
    fn public_url(&self) -> &str {
        &self.base_url
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> GatewayResult<Session> {
        self.token_grant("password", json!({ "email": email, "password": password }))
            .await
    }

    async fn get_user(&self, access_token: &str) -> GatewayResult<User> {
        let resp = self
            .auth(Method::GET, "user", Some(access_token))
            .send()
            .await?;
        expect_json(resp).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> GatewayResult<Session> {
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn sign_out(&self, access_token: &str) -> GatewayResult<()> {
        let resp = self
            .auth(Method::POST, "logout", Some(access_token))
            .send()
            .await?;
        expect_success(resp).await.map(|_| ())
    }

    async fn update_password(&self, access_token: &str, password: &str) -> GatewayResult<User> {
        let resp = self
            .auth(Method::PUT, "user", Some(access_token))
            .json(&json!({ "password": password }))
            .send()
            .await?;
        expect_json(resp).await
    }

    async fn select(&self, auth: Option<&str>, query: &Select) -> GatewayResult<Vec<Row>> {
        let resp = self
            .rest(Method::GET, &query.table, auth)
            .query(&query.to_params())
            .send()
            .await?;
        expect_json(resp).await
    }

    async fn insert(&self, auth: Option<&str>, table: &str, rows: &[Row]) -> GatewayResult<()> {
        let resp = self
            .rest(Method::POST, table, auth)
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await?;
        expect_success(resp).await.map(|_| ())
    }

    async fn update(
        &self,
        auth: Option<&str>,
        table: &str,
        values: &Row,
        filters: &[Filter],
    ) -> GatewayResult<()> {
        let resp = self
            .rest(Method::PATCH, table, auth)
            .header("Prefer", "return=minimal")
            .query(&filter_params(filters))
            .json(values)
            .send()
            .await?;
        expect_success(resp).await.map(|_| ())
    }

    async fn delete(&self, auth: Option<&str>, table: &str, filters: &[Filter]) -> GatewayResult<()> {
        let resp = self
            .rest(Method::DELETE, table, auth)
            .query(&filter_params(filters))
            .send()
            .await?;
        expect_success(resp).await.map(|_| ())
    }
}
