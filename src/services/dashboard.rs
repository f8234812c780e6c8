use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{oneshot, RwLock};

use super::{Notifier, RequestHandler, Service, ServiceError};
use crate::models::analytics::{
    DashboardSummary, DashboardViewModel, DEFAULT_WEEKLY_GOAL, WEEKLY_GOAL_MAX, WEEKLY_GOAL_MIN,
};
use crate::repositories::analytics::AnalyticsApi;

pub enum DashboardRequest {
    GetDashboard {
        response: oneshot::Sender<Result<DashboardViewModel, ServiceError>>,
    },
    BeginGoalEdit {
        response: oneshot::Sender<GoalEditor>,
    },
    CancelGoalEdit {
        response: oneshot::Sender<GoalEditor>,
    },
    SaveWeeklyGoal {
        draft: String,
        response: oneshot::Sender<Result<u32, ServiceError>>,
    },
}

/// Weekly-goal edit flow. Cancelling discards the draft; a failed save keeps
/// it so the operator can correct and retry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum GoalEditor {
    Viewing,
    Editing { draft: String },
}

pub fn parse_goal(input: &str) -> Result<u32, ServiceError> {
    let goal: u32 = input.trim().parse().map_err(|_| {
        ServiceError::Validation(format!("\"{}\" is not a whole number.", input.trim()))
    })?;

    if !(WEEKLY_GOAL_MIN..=WEEKLY_GOAL_MAX).contains(&goal) {
        return Err(ServiceError::Validation(format!(
            "Weekly goal must be between {} and {}.",
            WEEKLY_GOAL_MIN, WEEKLY_GOAL_MAX
        )));
    }

    Ok(goal)
}

#[derive(Clone)]
pub struct DashboardRequestHandler {
    api: Arc<dyn AnalyticsApi>,
    notifier: Arc<dyn Notifier>,
    summary: Arc<RwLock<Option<DashboardSummary>>>,
    editor: Arc<RwLock<GoalEditor>>,
}

impl DashboardRequestHandler {
    pub fn new(api: Arc<dyn AnalyticsApi>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            notifier,
            summary: Arc::new(RwLock::new(None)),
            editor: Arc::new(RwLock::new(GoalEditor::Viewing)),
        }
    }

    async fn get_dashboard(&self) -> Result<DashboardViewModel, ServiceError> {
        let summary = match self.api.fetch_summary().await {
            Ok(summary) => summary.normalized(),
            Err(err) => {
                let err = ServiceError::from(err);
                self.notifier.notify_error(&err.to_string());
                return Err(err);
            }
        };

        let view = summary.view_model();
        *self.summary.write().await = Some(summary);

        Ok(view)
    }

    async fn begin_goal_edit(&self) -> GoalEditor {
        let current_goal = self
            .summary
            .read()
            .await
            .as_ref()
            .map(|summary| summary.weekly_goal)
            .unwrap_or(DEFAULT_WEEKLY_GOAL);

        let mut editor = self.editor.write().await;
        *editor = GoalEditor::Editing {
            draft: current_goal.to_string(),
        };
        editor.clone()
    }

    async fn cancel_goal_edit(&self) -> GoalEditor {
        let mut editor = self.editor.write().await;
        *editor = GoalEditor::Viewing;
        editor.clone()
    }

    async fn save_weekly_goal(&self, draft: String) -> Result<u32, ServiceError> {
        let goal = match parse_goal(&draft) {
            Ok(goal) => goal,
            Err(err) => {
                *self.editor.write().await = GoalEditor::Editing { draft };
                self.notifier.notify_error(&err.to_string());
                return Err(err);
            }
        };

        if let Err(err) = self.api.update_weekly_goal(goal).await {
            let err = ServiceError::from(err);
            *self.editor.write().await = GoalEditor::Editing { draft };
            self.notifier.notify_error(&err.to_string());
            return Err(err);
        }

        // Accepted: patch only the goal locally, no re-fetch needed.
        if let Some(summary) = self.summary.write().await.as_mut() {
            summary.weekly_goal = goal;
        }
        *self.editor.write().await = GoalEditor::Viewing;
        self.notifier
            .notify_success(&format!("Weekly goal updated to {}.", goal));

        Ok(goal)
    }
}

#[async_trait]
impl RequestHandler<DashboardRequest> for DashboardRequestHandler {
    async fn handle_request(&self, request: DashboardRequest) {
        match request {
            DashboardRequest::GetDashboard { response } => {
                let view = self.get_dashboard().await;
                let _ = response.send(view);
            }
            DashboardRequest::BeginGoalEdit { response } => {
                let editor = self.begin_goal_edit().await;
                let _ = response.send(editor);
            }
            DashboardRequest::CancelGoalEdit { response } => {
                let editor = self.cancel_goal_edit().await;
                let _ = response.send(editor);
            }
            DashboardRequest::SaveWeeklyGoal { draft, response } => {
                let result = self.save_weekly_goal(draft).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct DashboardService;

impl DashboardService {
    pub fn new() -> Self {
        DashboardService {}
    }
}

#[async_trait]
impl Service<DashboardRequest, DashboardRequestHandler> for DashboardService {}
