//! Cloudflare API Client
//!
//! Thin wrapper over the v4 REST API covering exactly what a DMARC rollout
//! needs: credential verification, paginated zone listing, `_dmarc` TXT lookup
//! and the create/replace calls.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::credentials::Credentials;
use crate::error::{DmarcError, Result};
use crate::types::{DnsRecord, RecordLookup, Zone, AUTO_TTL};

pub const CLOUDFLARE_API: &str = "https://api.cloudflare.com/client/v4";

/// Fixed page size for zone listing
pub const ZONES_PER_PAGE: u32 = 50;

const USER_AGENT: &str = concat!("cloudflare-dmarc/", env!("CARGO_PKG_VERSION"));

// ============================================================
// API Response Types
// ============================================================

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiError>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default = "single_page")]
    total_pages: u32,
}

fn single_page() -> u32 {
    1
}

impl<T> ApiResponse<T> {
    fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return "Unknown error".to_string();
        }
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.code, e.message))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Serialize)]
struct TxtRecordRequest<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
}

impl<'a> TxtRecordRequest<'a> {
    fn new(name: &'a str, content: &'a str) -> Self {
        Self {
            record_type: "TXT",
            name,
            content,
            ttl: AUTO_TTL,
        }
    }
}

// ============================================================
// Backend seam
// ============================================================

/// The DNS operations a rollout drives, one zone at a time
#[async_trait]
pub trait DmarcBackend: Send + Sync {
    /// Every zone in the account. A failing page ends enumeration and the
    /// zones gathered so far are returned.
    async fn list_zones(&self) -> Vec<Zone>;

    /// Look up the zone's `_dmarc` TXT record
    async fn find_dmarc_record(&self, zone: &Zone) -> RecordLookup;

    /// Replace an existing record. `Ok(false)` means the API refused it.
    async fn update_dmarc_record(&self, zone: &Zone, record_id: &str, content: &str)
        -> Result<bool>;

    /// Create the record. `Ok(false)` means the API refused it.
    async fn create_dmarc_record(&self, zone: &Zone, content: &str) -> Result<bool>;
}

// ============================================================
// Client Implementation
// ============================================================

/// Cloudflare API client
pub struct CloudflareClient {
    client: Client,
    base_url: String,
    account_id: Option<String>,
}

impl CloudflareClient {
    /// Create a client against the public API
    pub fn new(credentials: &Credentials, account_id: Option<String>) -> Result<Self> {
        Self::with_base_url(credentials, account_id, CLOUDFLARE_API)
    }

    /// Create a client against another base URL
    pub fn with_base_url(
        credentials: &Credentials,
        account_id: Option<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(credentials.headers()?)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            account_id,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Confirm the credentials against `/user/tokens/verify`.
    ///
    /// Anything other than HTTP 200 with `success: true` is
    /// `InvalidCredentials`, carrying the raw body.
    pub async fn verify_credentials(&self) -> Result<()> {
        let url = self.url("/user/tokens/verify");
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("Response Status: {}", status);

        let accepted = status == StatusCode::OK
            && serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
                .map(|r| r.success)
                .unwrap_or(false);

        if accepted {
            Ok(())
        } else {
            Err(DmarcError::InvalidCredentials {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Fetch one page of zones, returning the zones and the reported page count
    async fn fetch_zone_page(&self, page: u32) -> std::result::Result<(Vec<Zone>, u32), String> {
        let url = self.url("/zones");
        let mut query = vec![
            ("page", page.to_string()),
            ("per_page", ZONES_PER_PAGE.to_string()),
        ];
        if let Some(account_id) = &self.account_id {
            query.push(("account.id", account_id.clone()));
        }
        debug!("GET {} (page {})", url, page);

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        if status != StatusCode::OK {
            return Err(format!("HTTP {status}: {body}"));
        }

        let parsed: ApiResponse<Vec<Zone>> =
            serde_json::from_str(&body).map_err(|e| format!("unparsable response: {e}"))?;

        if !parsed.success {
            return Err(format!("API error: {}", parsed.error_summary()));
        }

        let total_pages = parsed.result_info.as_ref().map_or(1, |i| i.total_pages);
        Ok((parsed.result.unwrap_or_default(), total_pages))
    }

    async fn send_upsert(&self, request: RequestBuilder) -> Result<bool> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("Response Status: {}", status);

        if status != StatusCode::OK {
            debug!("Response Body: {}", body);
            return Ok(false);
        }

        match serde_json::from_str::<ApiResponse<serde_json::Value>>(&body) {
            Ok(parsed) => {
                if !parsed.success {
                    debug!("API error: {}", parsed.error_summary());
                }
                Ok(parsed.success)
            }
            Err(e) => {
                debug!("Unparsable response: {}", e);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl DmarcBackend for CloudflareClient {
    async fn list_zones(&self) -> Vec<Zone> {
        let mut zones = Vec::new();
        let mut page = 1;

        loop {
            match self.fetch_zone_page(page).await {
                Ok((batch, total_pages)) => {
                    debug!(page, total_pages, count = batch.len(), "Fetched zone page");
                    zones.extend(batch);
                    if page >= total_pages {
                        break;
                    }
                    page += 1;
                }
                Err(reason) => {
                    warn!(page, reason = %reason, "Error fetching zones, keeping {} already listed", zones.len());
                    break;
                }
            }
        }

        zones
    }

    async fn find_dmarc_record(&self, zone: &Zone) -> RecordLookup {
        let url = self.url(&format!("/zones/{}/dns_records", zone.id));
        let name = zone.dmarc_name();
        debug!("GET {} (type=TXT, name={})", url, name);

        let response = match self
            .client
            .get(&url)
            .query(&[("type", "TXT"), ("name", name.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return RecordLookup::QueryFailed(format!("request failed: {e}")),
        };

        let status = response.status();
        if status != StatusCode::OK {
            return RecordLookup::QueryFailed(format!("HTTP {status}"));
        }

        let parsed: ApiResponse<Vec<DnsRecord>> = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => return RecordLookup::QueryFailed(format!("unparsable response: {e}")),
        };

        if !parsed.success {
            return RecordLookup::QueryFailed(format!("API error: {}", parsed.error_summary()));
        }

        parsed
            .result
            .unwrap_or_default()
            .into_iter()
            .find(|record| record.name.contains("_dmarc"))
            .map_or(RecordLookup::Absent, RecordLookup::Found)
    }

    async fn update_dmarc_record(
        &self,
        zone: &Zone,
        record_id: &str,
        content: &str,
    ) -> Result<bool> {
        let url = self.url(&format!("/zones/{}/dns_records/{}", zone.id, record_id));
        let name = zone.dmarc_name();
        debug!("PUT {}", url);

        let request = self
            .client
            .put(&url)
            .json(&TxtRecordRequest::new(&name, content));
        self.send_upsert(request).await
    }

    async fn create_dmarc_record(&self, zone: &Zone, content: &str) -> Result<bool> {
        let url = self.url(&format!("/zones/{}/dns_records", zone.id));
        debug!("POST {}", url);

        // Relative name; Cloudflare qualifies it against the zone.
        let request = self
            .client
            .post(&url)
            .json(&TxtRecordRequest::new("_dmarc", content));
        self.send_upsert(request).await
    }
}
