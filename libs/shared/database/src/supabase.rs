use std::fmt::Display;

use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::error::DatabaseError;

/// Thin PostgREST client authenticated with the service key.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, DatabaseError> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", header_value(&self.service_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let bearer = auth_token.unwrap_or(&self.service_key);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", bearer))?);

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!("API error ({}): {}", status, text);
            return Err(DatabaseError::from_response(status, &text));
        }

        // `return=minimal` answers with an empty body
        let payload = if text.trim().is_empty() { "null" } else { text.as_str() };
        Ok(serde_json::from_str(payload)?)
    }

    /// `GET /rest/v1/{table}?{query}`.
    pub async fn select<T>(&self, table: &str, query: &str) -> Result<Vec<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let path = rest_path(table, query);
        self.request(Method::GET, &path, None, None).await
    }

    /// Inserts one row or an array of rows and returns what was stored.
    pub async fn insert<T>(&self, table: &str, body: Value) -> Result<Vec<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let path = rest_path(table, "");
        self.request_with_headers(Method::POST, &path, None, Some(body), Some(representation()))
            .await
    }

    /// Patches every row matching `filter`. An empty result means nothing matched.
    pub async fn update<T>(
        &self,
        table: &str,
        filter: &str,
        body: Value,
    ) -> Result<Vec<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let path = rest_path(table, filter);
        self.request_with_headers(Method::PATCH, &path, None, Some(body), Some(representation()))
            .await
    }

    /// Deletes every row matching `filter` and returns the removed rows.
    pub async fn delete<T>(&self, table: &str, filter: &str) -> Result<Vec<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let path = rest_path(table, filter);
        self.request_with_headers(Method::DELETE, &path, None, None, Some(representation()))
            .await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn header_value(raw: &str) -> Result<HeaderValue, DatabaseError> {
    HeaderValue::from_str(raw).map_err(|_| DatabaseError::Auth("Invalid credential characters".to_string()))
}

fn representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

fn rest_path(table: &str, query: &str) -> String {
    if query.is_empty() {
        format!("/rest/v1/{}", table)
    } else {
        format!("/rest/v1/{}?{}", table, query)
    }
}

/// `eq.<value>` filter operand, URL-encoded.
pub fn eq(value: impl Display) -> String {
    format!("eq.{}", urlencoding::encode(&value.to_string()))
}

/// `in.(a,b,c)` filter operand, URL-encoded.
pub fn in_list<I, V>(values: I) -> String
where
    I: IntoIterator<Item = V>,
    V: Display,
{
    let joined = values
        .into_iter()
        .map(|v| urlencoding::encode(&v.to_string()).into_owned())
        .collect::<Vec<_>>()
        .join(",");
    format!("in.({})", joined)
}
