//! HTTP client for the Zoho Books reports API.
//!
//! Authentication is a refresh-token exchange performed once at construction;
//! the resulting access token is valid for an hour, which covers a full run.
//! Report fetches are plain GETs with a bearer-style authorization header and
//! an incrementing page number for pagination.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{error, info};

use crate::config::ZohoSettings;
use crate::constants::zoho::{HTTP_TIMEOUT_SECS, MAX_REPORT_PAGES};
use crate::error::{Result, SyncError};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Clone)]
pub struct ZohoClient {
    client: Client,
    api_url: String,
    organization_id: String,
    access_token: String,
}

impl ZohoClient {
    /// Exchange the refresh token for an access token and build the client.
    pub async fn authenticate(settings: &ZohoSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        let url = format!("{}/oauth/v2/token", settings.accounts_url.trim_end_matches('/'));
        let response = client
            .post(&url)
            .form(&[
                ("client_id", settings.client_id.as_str()),
                ("client_secret", settings.client_secret.as_str()),
                ("refresh_token", settings.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "token exchange failed");
            return Err(SyncError::RemoteApi {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await?;
        info!("Zoho access token acquired");

        Ok(Self {
            client,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            organization_id: settings.organization_id.clone(),
            access_token: token.access_token,
        })
    }

    /// Fetch one page of a report. The organization id is always merged into
    /// the query parameters.
    pub async fn get_report(
        &self,
        report_name: &str,
        params: &[(String, String)],
    ) -> Result<JsonValue> {
        let url = format!("{}/books/v3/reports/{}/", self.api_url, report_name);

        let mut query: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        query.push(("organization_id", self.organization_id.as_str()));

        let response = self
            .client
            .get(&url)
            .header(
                "Authorization",
                format!("Zoho-oauthtoken {}", self.access_token),
            )
            .header("Content-Type", "application/json")
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(report = report_name, status = status.as_u16(), body = %body, "report request failed");
            return Err(SyncError::RemoteApi {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Fetch a report page by page, collecting the records `extract` pulls out
    /// of each page's envelope. Pagination advances while the envelope's
    /// `page_context.has_more_page` is true and stops at the hard page cap.
    pub async fn fetch_report_pages<F>(
        &self,
        report_name: &str,
        base_params: &[(String, String)],
        mut extract: F,
    ) -> Result<Vec<serde_json::Map<String, JsonValue>>>
    where
        F: FnMut(&JsonValue) -> Result<Vec<serde_json::Map<String, JsonValue>>>,
    {
        let mut results = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut params = base_params.to_vec();
            params.push(("page".to_string(), page.to_string()));

            let data = self.get_report(report_name, &params).await?;
            results.extend(extract(&data)?);

            let has_more = data
                .get("page_context")
                .and_then(|ctx| ctx.get("has_more_page"))
                .and_then(JsonValue::as_bool)
                .unwrap_or(false);
            if !has_more {
                break;
            }

            page += 1;
            if page > MAX_REPORT_PAGES {
                info!(report = report_name, "page cap reached, stopping pagination");
                break;
            }
        }

        info!(report = report_name, pages = page, records = results.len(), "report fetched");
        Ok(results)
    }
}
