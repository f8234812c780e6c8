use async_trait::async_trait;

use super::ApiError;
use crate::models::users::{NewUserForm, PasswordReset, UserPatch, UserRecord};

#[async_trait]
pub trait UserDirectoryApi: Send + Sync {
    async fn list_users(&self) -> Result<Vec<UserRecord>, ApiError>;
    async fn create_user(&self, form: &NewUserForm) -> Result<UserRecord, ApiError>;
    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<(), ApiError>;
    async fn reset_password(&self, id: &str) -> Result<PasswordReset, ApiError>;
    async fn deactivate_user(&self, id: &str) -> Result<(), ApiError>;
}

pub struct UserDirectoryClient {
    auth_token: String,
    url: String,
    client: reqwest::Client,
}

impl UserDirectoryClient {
    pub fn new(auth_token: String, url: String) -> Self {
        Self {
            auth_token,
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl UserDirectoryApi for UserDirectoryClient {
    async fn list_users(&self) -> Result<Vec<UserRecord>, ApiError> {
        let response = self
            .client
            .get(format!("{}/user-management", self.url))
            .bearer_auth(&self.auth_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await?;
            return Err(super::error_from_body(&body));
        }

        let body = response.text().await?;
        let roster: Vec<UserRecord> =
            serde_json::from_str(&body).map_err(|e| ApiError::BadResponse(e.to_string()))?;
        log::info!("Fetched roster: {} users.", roster.len());

        Ok(roster)
    }

    async fn create_user(&self, form: &NewUserForm) -> Result<UserRecord, ApiError> {
        let response = self
            .client
            .post(format!("{}/user-management", self.url))
            .bearer_auth(&self.auth_token)
            .json(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await?;
            return Err(super::error_from_body(&body));
        }

        let created: UserRecord = response.json().await?;
        Ok(created)
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<(), ApiError> {
        let response = self
            .client
            .put(format!("{}/user-management/{}", self.url, id))
            .bearer_auth(&self.auth_token)
            .json(patch)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await?;
            return Err(super::error_from_body(&body));
        }

        Ok(())
    }

    async fn reset_password(&self, id: &str) -> Result<PasswordReset, ApiError> {
        let response = self
            .client
            .post(format!("{}/user-management/{}/reset-password", self.url, id))
            .bearer_auth(&self.auth_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await?;
            return Err(super::error_from_body(&body));
        }

        // Development backends answer with a temporary credential. It is
        // handed straight to the caller and never logged.
        let reset: PasswordReset = response.json().await?;
        Ok(reset)
    }

    async fn deactivate_user(&self, id: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(format!("{}/user-management/{}", self.url, id))
            .bearer_auth(&self.auth_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await?;
            return Err(super::error_from_body(&body));
        }

        Ok(())
    }
}
