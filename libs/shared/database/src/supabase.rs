use anyhow::{Result, anyhow, Context};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

/// REST client for the hosted store. Tables are addressed PostgREST-style
/// under `/rest/v1/<table>?<column>=<op>.<value>`.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

/// The store refused a write because it breaks a unique constraint
/// (HTTP 409, Postgres code `23505`). Callers downcast to report a conflict.
#[derive(Debug, thiserror::Error)]
#[error("Unique constraint violated: {0}")]
pub struct StoreConflict(pub String);

/// Builds a PostgREST filter pair, percent-encoding the value.
pub fn filter(column: &str, op: &str, value: &str) -> String {
    format!("{}={}.{}", column, op, urlencoding::encode(value))
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.anon_key).context("Invalid store API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .context("Invalid bearer token")?,
            );
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("Store API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                409 => anyhow::Error::new(StoreConflict(error_text)),
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        // DELETE and minimal-return writes answer with an empty body
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }

        let data = serde_json::from_slice::<T>(&bytes)?;
        Ok(data)
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    fn table_path(table: &str, query: &str) -> String {
        if query.is_empty() {
            format!("/rest/v1/{}", table)
        } else {
            format!("/rest/v1/{}?{}", table, query)
        }
    }

    pub async fn select<T>(&self, table: &str, query: &str, auth_token: &str) -> Result<Vec<T>>
    where T: DeserializeOwned {
        let rows: Vec<Value> = self.request(
            Method::GET,
            &Self::table_path(table, query),
            Some(auth_token),
            None,
        ).await?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| anyhow!("Failed to decode {} row: {}", table, e)))
            .collect()
    }

    pub async fn select_one<T>(&self, table: &str, query: &str, auth_token: &str) -> Result<Option<T>>
    where T: DeserializeOwned {
        let query = if query.is_empty() {
            "limit=1".to_string()
        } else {
            format!("{}&limit=1", query)
        };

        Ok(self.select(table, &query, auth_token).await?.into_iter().next())
    }

    pub async fn insert<T>(&self, table: &str, body: Value, auth_token: &str) -> Result<T>
    where T: DeserializeOwned {
        let result: Vec<Value> = self.request_with_headers(
            Method::POST,
            &Self::table_path(table, ""),
            Some(auth_token),
            Some(body),
            Some(Self::representation_headers()),
        ).await?;

        let row = result.into_iter().next()
            .ok_or_else(|| anyhow!("Store returned no row for insert into {}", table))?;

        Ok(serde_json::from_value(row)?)
    }

    pub async fn update<T>(&self, table: &str, query: &str, body: Value, auth_token: &str) -> Result<Option<T>>
    where T: DeserializeOwned {
        let result: Vec<Value> = self.request_with_headers(
            Method::PATCH,
            &Self::table_path(table, query),
            Some(auth_token),
            Some(body),
            Some(Self::representation_headers()),
        ).await?;

        match result.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, table: &str, query: &str, auth_token: &str) -> Result<()> {
        let _: Option<Value> = self.request(
            Method::DELETE,
            &Self::table_path(table, query),
            Some(auth_token),
            None,
        ).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{MockServer, Mock, ResponseTemplate};
    use wiremock::matchers::{method, path, query_param, header};

    fn config(url: &str) -> AppConfig {
        AppConfig {
            supabase_url: url.to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: "service-key".to_string(),
            supabase_jwt_secret: "secret".to_string(),
            voice_webhook_secret: String::new(),
            auth_webhook_secret: String::new(),
            auth_api_url: String::new(),
            auth_secret_key: String::new(),
            calendar_api_url: String::new(),
            port: 3000,
        }
    }

    #[test]
    fn test_filter_encodes_value() {
        assert_eq!(filter("email", "eq", "a+b@example.com"), "email=eq.a%2Bb%40example.com");
        assert_eq!(filter("status", "neq", "cancelled"), "status=neq.cancelled");
    }

    #[tokio::test]
    async fn test_select_one_sends_api_key_and_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/doctors"))
            .and(query_param("id", "eq.42"))
            .and(query_param("limit", "1"))
            .and(header("apikey", "test-anon-key"))
            .and(header("Authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "42"}])))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config(&server.uri()));
        let row: Option<Value> = client.select_one("doctors", "id=eq.42", "token").await.unwrap();
        assert_eq!(row.unwrap()["id"], "42");
    }

    #[tokio::test]
    async fn test_insert_requests_representation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/patients"))
            .and(header("Prefer", "return=representation"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"id": "p1"}])))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config(&server.uri()));
        let row: Value = client.insert("patients", json!({"first_name": "Ann"}), "token").await.unwrap();
        assert_eq!(row["id"], "p1");
    }

    #[tokio::test]
    async fn test_insert_with_empty_result_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/patients"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config(&server.uri()));
        let result: Result<Value> = client.insert("patients", json!({}), "token").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_error_status_maps_to_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/patients"))
            .respond_with(ResponseTemplate::new(401).set_body_string("JWT expired"))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config(&server.uri()));
        let err = client.select::<Value>("patients", "", "token").await.unwrap_err();
        assert!(err.to_string().starts_with("Authentication error"));
    }

    #[tokio::test]
    async fn test_unique_violation_is_a_store_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint \"appointments_doctor_slot_key\""
            })))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config(&server.uri()));
        let err = client.insert::<Value>("appointments", json!({}), "token").await.unwrap_err();
        let conflict = err.downcast_ref::<StoreConflict>().unwrap();
        assert!(conflict.0.contains("23505"));
    }

    #[tokio::test]
    async fn test_delete_accepts_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/users"))
            .and(query_param("auth_user_id", "eq.user_1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config(&server.uri()));
        client.delete("users", "auth_user_id=eq.user_1", "token").await.unwrap();
    }
}
