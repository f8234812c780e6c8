use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::repositories::analytics::{AnalyticsApi, AnalyticsClient};
use crate::repositories::users::{UserDirectoryApi, UserDirectoryClient};
use crate::repositories::ApiError;
use crate::settings::Settings;

pub mod dashboard;
pub mod roster;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Backend(String),
    #[error("{assigned_contacts} contacts are still assigned to this user")]
    Conflict { assigned_contacts: u32 },
    #[error("Administrator access required.")]
    Forbidden,
}

impl From<ApiError> for ServiceError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Conflict { assigned_contacts } => {
                ServiceError::Conflict { assigned_contacts }
            }
            ApiError::Backend { message } => ServiceError::Backend(message),
            other => ServiceError::Backend(other.to_string()),
        }
    }
}

// Surfaces outcome messages to whoever is watching the session. The
// production impl goes to the log; tests capture messages in memory.
pub trait Notifier: Send + Sync {
    fn notify_success(&self, message: &str);
    fn notify_error(&self, message: &str);
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_success(&self, message: &str) {
        log::info!("{}", message);
    }

    fn notify_error(&self, message: &str) {
        log::error!("{}", message);
    }
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    // Requests are handled one at a time: a mutation must observe the
    // reconciled state left behind by the previous one.
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            handler.handle_request(request).await;
        }
    }
}

pub async fn start_services(settings: Settings, listen: String) -> Result<(), anyhow::Error> {
    let (dashboard_tx, mut dashboard_rx) = mpsc::channel(64);
    let (roster_tx, mut roster_rx) = mpsc::channel(64);

    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    log::info!("Starting dashboard service.");
    let analytics: Arc<dyn AnalyticsApi> = Arc::new(AnalyticsClient::new(
        settings.api.auth_token.clone(),
        settings.api.base_url.clone(),
    ));
    let dashboard_notifier = notifier.clone();
    tokio::spawn(async move {
        let handler = dashboard::DashboardRequestHandler::new(analytics, dashboard_notifier);
        let mut service = dashboard::DashboardService::new();
        service.run(handler, &mut dashboard_rx).await;
    });

    log::info!("Starting roster service.");
    let directory: Arc<dyn UserDirectoryApi> = Arc::new(UserDirectoryClient::new(
        settings.api.auth_token,
        settings.api.base_url,
    ));
    let roster_notifier = notifier.clone();
    tokio::spawn(async move {
        let handler = roster::RosterRequestHandler::new(directory, roster_notifier);
        let mut service = roster::RosterService::new();
        service.run(handler, &mut roster_rx).await;
    });

    log::info!("Starting HTTP server.");
    crate::server::start_http_server(&listen, dashboard_tx, roster_tx).await
}
