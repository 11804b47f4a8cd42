//! # Maps Collaborator Client
//!
//! Read-through client for the external maps service used by the detour
//! availability check. The collaborator is best-effort by contract: any
//! failure (unconfigured, unreachable, malformed response) degrades to
//! "no detour info" and never fails the enclosing request.

use serde::Deserialize;
use std::time::Duration;

/// Thin HTTP client for the maps collaborator.
#[derive(Debug, Clone)]
pub struct MapsClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    /// Number of route alternatives the maps service found.
    alternatives: u32,
}

impl MapsClient {
    /// Create a client for the given base URL.
    pub fn new(base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap_or_default();
        Self { base_url, http }
    }

    /// Whether an alternative route exists between two addresses.
    ///
    /// `None` means the collaborator could not answer, callers must treat
    /// that as "no detour info", not as "no detour".
    pub async fn detour_available(&self, origin: &str, destination: &str) -> Option<bool> {
        let url = format!("{}/route", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .query(&[
                ("origin", origin),
                ("destination", destination),
                ("alternatives", "true"),
            ])
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "maps collaborator unreachable, degrading detour check");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(
                status = %response.status(),
                "maps collaborator returned an error, degrading detour check"
            );
            return None;
        }

        match response.json::<RouteResponse>().await {
            Ok(body) => Some(body.alternatives > 1),
            Err(e) => {
                tracing::warn!(error = %e, "maps collaborator returned malformed route data");
                None
            }
        }
    }
}
