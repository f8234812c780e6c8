use async_trait::async_trait;
use serde_json::json;

use super::ApiError;
use crate::models::analytics::DashboardSummary;

#[async_trait]
pub trait AnalyticsApi: Send + Sync {
    async fn fetch_summary(&self) -> Result<DashboardSummary, ApiError>;
    async fn update_weekly_goal(&self, goal: u32) -> Result<(), ApiError>;
}

pub struct AnalyticsClient {
    auth_token: String,
    url: String,
    client: reqwest::Client,
}

impl AnalyticsClient {
    pub fn new(auth_token: String, url: String) -> Self {
        Self {
            auth_token,
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AnalyticsApi for AnalyticsClient {
    async fn fetch_summary(&self) -> Result<DashboardSummary, ApiError> {
        let response = self
            .client
            .get(format!("{}/analytics/dashboard", self.url))
            .bearer_auth(&self.auth_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await?;
            return Err(super::error_from_body(&body));
        }

        let body = response.text().await?;
        let summary: DashboardSummary =
            serde_json::from_str(&body).map_err(|e| ApiError::BadResponse(e.to_string()))?;
        log::info!(
            "Fetched dashboard summary: {} contacts, {} activities this week.",
            summary.contacts_total,
            summary.activities_this_week
        );

        Ok(summary)
    }

    async fn update_weekly_goal(&self, goal: u32) -> Result<(), ApiError> {
        let response = self
            .client
            .put(format!("{}/analytics/weekly-goal", self.url))
            .bearer_auth(&self.auth_token)
            .json(&json!({ "goal": goal }))
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await?;
            return Err(super::error_from_body(&body));
        }

        log::info!("Updated weekly goal to {}.", goal);
        Ok(())
    }
}
