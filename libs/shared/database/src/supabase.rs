use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_RANGE, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_models::context::StaffProfile;

/// Thin PostgREST client for the hosted Supabase project.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
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

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
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

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T>
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
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Ask PostgREST to echo the affected rows back in the response body.
    pub fn return_representation() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    /// Number of rows matching a table query, without downloading them.
    /// PostgREST answers a `HEAD` with `Prefer: count=exact` by putting the
    /// total in `Content-Range`.
    pub async fn count_exact(&self, path: &str, auth_token: Option<&str>) -> Result<usize> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Counting rows at {}", url);

        let mut headers = self.get_headers(auth_token)?;
        headers.insert("Prefer", HeaderValue::from_static("count=exact"));

        let response = self.client.request(Method::HEAD, &url)
            .headers(headers)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("API error ({}) counting rows at {}", status, path);
            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error counting rows ({})", status),
                _ => anyhow!("API error ({}) counting rows", status),
            });
        }

        let content_range = response.headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| anyhow!("Count response carried no Content-Range header"))?;

        content_range_total(content_range)
    }

    pub async fn get_staff_profile(&self, user_id: &str, auth_token: &str) -> Result<Option<StaffProfile>> {
        let path = format!(
            "/rest/v1/profiles?id=eq.{}&select=id,clinic_id,role,full_name",
            user_id
        );

        let result: Vec<StaffProfile> = self.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(result.into_iter().next())
    }
}

/// Total from a PostgREST `Content-Range` value such as `0-24/3573` or `*/0`.
pub fn content_range_total(value: &str) -> Result<usize> {
    value.split_once('/')
        .and_then(|(_, total)| total.trim().parse().ok())
        .ok_or_else(|| anyhow!("Unexpected Content-Range: {}", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_range_total() {
        assert_eq!(content_range_total("0-24/3573").unwrap(), 3573);
        assert_eq!(content_range_total("*/0").unwrap(), 0);
        assert!(content_range_total("0-24/*").is_err());
        assert!(content_range_total("garbage").is_err());
    }
}
