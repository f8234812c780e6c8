use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{oneshot, RwLock};

use super::{Notifier, RequestHandler, Service, ServiceError};
use crate::models::users::{
    derive_counts, CurrentUser, NewUserForm, PasswordReset, RosterCounts, UserPatch, UserRecord,
};
use crate::repositories::users::UserDirectoryApi;

pub enum RosterRequest {
    ListUsers {
        actor: CurrentUser,
        response: oneshot::Sender<Result<RosterView, ServiceError>>,
    },
    CreateUser {
        actor: CurrentUser,
        form: NewUserForm,
        response: oneshot::Sender<Result<RosterView, ServiceError>>,
    },
    UpdateUser {
        actor: CurrentUser,
        id: String,
        patch: UserPatch,
        response: oneshot::Sender<Result<RosterView, ServiceError>>,
    },
    ResetPassword {
        actor: CurrentUser,
        id: String,
        email: String,
        confirmed: bool,
        response: oneshot::Sender<Result<PasswordReset, ServiceError>>,
    },
    DeactivateUser {
        actor: CurrentUser,
        id: String,
        email: String,
        confirmed: bool,
        response: oneshot::Sender<Result<RosterView, ServiceError>>,
    },
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterView {
    pub users: Vec<UserRecord>,
    pub counts: RosterCounts,
}

#[derive(Clone)]
pub struct RosterRequestHandler {
    api: Arc<dyn UserDirectoryApi>,
    notifier: Arc<dyn Notifier>,
    roster: Arc<RwLock<Vec<UserRecord>>>,
}

impl RosterRequestHandler {
    pub fn new(api: Arc<dyn UserDirectoryApi>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            notifier,
            roster: Arc::new(RwLock::new(Vec::new())),
        }
    }

    fn guard_admin(actor: &CurrentUser) -> Result<(), ServiceError> {
        if actor.is_admin {
            Ok(())
        } else {
            log::warn!(
                "{} ({}) was refused: administrator access required.",
                actor.first_name,
                actor.id
            );
            Err(ServiceError::Forbidden)
        }
    }

    // Fetch-after-write: one full re-fetch whose result wholly replaces the
    // cache. Server-generated ids and timestamps are never guessed locally.
    async fn reconcile(&self) -> Result<RosterView, ServiceError> {
        let users = self.api.list_users().await?;
        let counts = derive_counts(&users);
        *self.roster.write().await = users.clone();

        Ok(RosterView { users, counts })
    }

    async fn list_users(&self, actor: CurrentUser) -> Result<RosterView, ServiceError> {
        Self::guard_admin(&actor)?;

        match self.reconcile().await {
            Ok(view) => Ok(view),
            Err(err) => {
                self.notifier.notify_error(&err.to_string());
                Err(err)
            }
        }
    }

    async fn create_user(
        &self,
        actor: CurrentUser,
        form: NewUserForm,
    ) -> Result<RosterView, ServiceError> {
        Self::guard_admin(&actor)?;

        if let Some(field) = form.missing_field() {
            let err = ServiceError::Validation(format!("The {} field is required.", field));
            self.notifier.notify_error(&err.to_string());
            return Err(err);
        }

        let email = form.email.clone();
        if let Err(err) = self.api.create_user(&form).await {
            let err = ServiceError::from(err);
            self.notifier.notify_error(&err.to_string());
            return Err(err);
        }

        let view = self.reconcile().await?;
        self.notifier.notify_success(&format!("Added {}.", email));

        Ok(view)
    }

    async fn update_user(
        &self,
        actor: CurrentUser,
        id: String,
        patch: UserPatch,
    ) -> Result<RosterView, ServiceError> {
        Self::guard_admin(&actor)?;

        // Self-demotion and self-deactivation are refused before any network
        // call; the backend enforces the same rule authoritatively.
        if actor.id == id && patch.is_admin == Some(false) {
            let err = ServiceError::Validation(
                "You cannot remove your own administrator access.".to_string(),
            );
            self.notifier.notify_error(&err.to_string());
            return Err(err);
        }
        if actor.id == id && patch.is_active == Some(false) {
            let err =
                ServiceError::Validation("You cannot deactivate your own account.".to_string());
            self.notifier.notify_error(&err.to_string());
            return Err(err);
        }

        if let Err(err) = self.api.update_user(&id, &patch).await {
            let err = ServiceError::from(err);
            self.notifier.notify_error(&err.to_string());
            return Err(err);
        }

        let view = self.reconcile().await?;
        self.notifier.notify_success("User updated.");

        Ok(view)
    }

    async fn reset_password(
        &self,
        actor: CurrentUser,
        id: String,
        email: String,
        confirmed: bool,
    ) -> Result<PasswordReset, ServiceError> {
        Self::guard_admin(&actor)?;

        if !confirmed {
            return Err(ServiceError::Validation(format!(
                "Password reset for {} was not confirmed.",
                email
            )));
        }

        match self.api.reset_password(&id).await {
            Ok(reset) => {
                // The roster is untouched; the temporary credential goes to
                // the caller only and is never logged.
                self.notifier
                    .notify_success(&format!("Password reset for {}.", email));
                Ok(reset)
            }
            Err(err) => {
                let err = ServiceError::from(err);
                self.notifier.notify_error(&err.to_string());
                Err(err)
            }
        }
    }

    async fn deactivate_user(
        &self,
        actor: CurrentUser,
        id: String,
        email: String,
        confirmed: bool,
    ) -> Result<RosterView, ServiceError> {
        Self::guard_admin(&actor)?;

        if !confirmed {
            return Err(ServiceError::Validation(format!(
                "Deactivation of {} was not confirmed.",
                email
            )));
        }
        if actor.id == id {
            let err =
                ServiceError::Validation("You cannot deactivate your own account.".to_string());
            self.notifier.notify_error(&err.to_string());
            return Err(err);
        }

        if let Err(err) = self.api.deactivate_user(&id).await {
            let err = ServiceError::from(err);
            match &err {
                ServiceError::Conflict { assigned_contacts } => {
                    self.notifier.notify_error(&format!(
                        "{} still has {} assigned contacts. Reassign them first.",
                        email, assigned_contacts
                    ));
                }
                other => self.notifier.notify_error(&other.to_string()),
            }
            return Err(err);
        }

        let view = self.reconcile().await?;
        self.notifier
            .notify_success(&format!("Deactivated {}.", email));

        Ok(view)
    }
}

#[async_trait]
impl RequestHandler<RosterRequest> for RosterRequestHandler {
    async fn handle_request(&self, request: RosterRequest) {
        match request {
            RosterRequest::ListUsers { actor, response } => {
                let view = self.list_users(actor).await;
                let _ = response.send(view);
            }
            RosterRequest::CreateUser {
                actor,
                form,
                response,
            } => {
                let view = self.create_user(actor, form).await;
                let _ = response.send(view);
            }
            RosterRequest::UpdateUser {
                actor,
                id,
                patch,
                response,
            } => {
                let view = self.update_user(actor, id, patch).await;
                let _ = response.send(view);
            }
            RosterRequest::ResetPassword {
                actor,
                id,
                email,
                confirmed,
                response,
            } => {
                let result = self.reset_password(actor, id, email, confirmed).await;
                let _ = response.send(result);
            }
            RosterRequest::DeactivateUser {
                actor,
                id,
                email,
                confirmed,
                response,
            } => {
                let view = self.deactivate_user(actor, id, email, confirmed).await;
                let _ = response.send(view);
            }
        }
    }
}

pub struct RosterService;

impl RosterService {
    pub fn new() -> Self {
        RosterService {}
    }
}

#[async_trait]
impl Service<RosterRequest, RosterRequestHandler> for RosterService {}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;
    use crate::models::users::UserStats;
    use crate::repositories::ApiError;

    struct FakeDirectory {
        served_roster: Vec<UserRecord>,
        list_calls: AtomicUsize,
        create_calls: AtomicUsize,
        update_calls: AtomicUsize,
        reset_calls: AtomicUsize,
        deactivate_calls: AtomicUsize,
        create_error: Option<String>,
        deactivate_conflict: Option<u32>,
        temp_password: Option<String>,
    }

    impl FakeDirectory {
        fn new(served_roster: Vec<UserRecord>) -> Self {
            Self {
                served_roster,
                list_calls: AtomicUsize::new(0),
                create_calls: AtomicUsize::new(0),
                update_calls: AtomicUsize::new(0),
                reset_calls: AtomicUsize::new(0),
                deactivate_calls: AtomicUsize::new(0),
                create_error: None,
                deactivate_conflict: None,
                temp_password: None,
            }
        }
    }

    #[async_trait]
    impl UserDirectoryApi for FakeDirectory {
        async fn list_users(&self) -> Result<Vec<UserRecord>, ApiError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.served_roster.clone())
        }

        async fn create_user(&self, form: &NewUserForm) -> Result<UserRecord, ApiError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = &self.create_error {
                return Err(ApiError::Backend {
                    message: message.clone(),
                });
            }
            Ok(record(&format!("created-{}", form.email), false, true))
        }

        async fn update_user(&self, _id: &str, _patch: &UserPatch) -> Result<(), ApiError> {
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn reset_password(&self, _id: &str) -> Result<PasswordReset, ApiError> {
            self.reset_calls.fetch_add(1, Ordering::SeqCst);
            Ok(PasswordReset {
                temp_password: self.temp_password.clone(),
            })
        }

        async fn deactivate_user(&self, _id: &str) -> Result<(), ApiError> {
            self.deactivate_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(assigned_contacts) = self.deactivate_conflict {
                return Err(ApiError::Conflict { assigned_contacts });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        successes: Mutex<Vec<String>>,
        errors: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify_success(&self, message: &str) {
            self.successes.lock().unwrap().push(message.to_string());
        }

        fn notify_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    fn record(id: &str, is_admin: bool, is_active: bool) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            first_name: "Sam".to_string(),
            last_name: "Okafor".to_string(),
            is_admin,
            is_loan_officer: false,
            licensed_states: vec![],
            is_active,
            created_at: Utc::now(),
            last_login: None,
            stats: UserStats::default(),
        }
    }

    fn admin() -> CurrentUser {
        CurrentUser {
            id: "admin-1".to_string(),
            first_name: "Dana".to_string(),
            is_admin: true,
        }
    }

    fn form() -> NewUserForm {
        NewUserForm {
            email: "new@example.com".to_string(),
            first_name: "Noel".to_string(),
            last_name: "Vance".to_string(),
            is_loan_officer: true,
            licensed_states: vec!["CO".to_string()],
        }
    }

    fn handler(api: Arc<FakeDirectory>) -> (RosterRequestHandler, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        (RosterRequestHandler::new(api, notifier.clone()), notifier)
    }

    #[tokio::test]
    async fn non_admin_actors_are_refused() {
        let api = Arc::new(FakeDirectory::new(vec![]));
        let (handler, _) = handler(api.clone());
        let actor = CurrentUser {
            is_admin: false,
            ..admin()
        };

        let result = handler.list_users(actor).await;
        assert!(matches!(result, Err(ServiceError::Forbidden)));
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn list_replaces_the_roster_and_derives_counts() {
        let served = vec![record("u1", true, true), record("u2", false, false)];
        let api = Arc::new(FakeDirectory::new(served.clone()));
        let (handler, _) = handler(api);

        let view = handler.list_users(admin()).await.unwrap();
        assert_eq!(view.users, served);
        assert_eq!(view.counts.total, 2);
        assert_eq!(view.counts.active, 1);
        assert_eq!(view.counts.admins, 1);
        assert_eq!(*handler.roster.read().await, served);
    }

    #[tokio::test]
    async fn incomplete_form_never_issues_a_network_call() {
        let api = Arc::new(FakeDirectory::new(vec![]));
        let (handler, _) = handler(api.clone());

        let incomplete = NewUserForm {
            last_name: "".to_string(),
            ..form()
        };
        let result = handler.create_user(admin(), incomplete).await;

        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert_eq!(api.create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_create_reconciles_exactly_once() {
        let served = vec![record("u1", false, true), record("u2", false, true)];
        let api = Arc::new(FakeDirectory::new(served.clone()));
        let (handler, notifier) = handler(api.clone());

        let view = handler.create_user(admin(), form()).await.unwrap();

        assert_eq!(api.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);
        // The cache is the fresh read, not a locally constructed record.
        assert_eq!(view.users, served);
        assert_eq!(*handler.roster.read().await, served);
        assert_eq!(notifier.successes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_failure_surfaces_the_server_message_verbatim() {
        let mut api = FakeDirectory::new(vec![]);
        api.create_error = Some("Email already in use.".to_string());
        let api = Arc::new(api);
        let (handler, notifier) = handler(api.clone());

        let result = handler.create_user(admin(), form()).await;
        match result {
            Err(ServiceError::Backend(message)) => assert_eq!(message, "Email already in use."),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            notifier.errors.lock().unwrap().as_slice(),
            ["Email already in use."]
        );
    }

    #[tokio::test]
    async fn actors_cannot_strip_their_own_admin_flag() {
        let api = Arc::new(FakeDirectory::new(vec![]));
        let (handler, _) = handler(api.clone());

        let patch = UserPatch {
            is_admin: Some(false),
            ..UserPatch::default()
        };
        let result = handler
            .update_user(admin(), "admin-1".to_string(), patch)
            .await;

        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert_eq!(api.update_calls.load(Ordering::SeqCst), 0);

        // Demoting someone else is fine.
        let patch = UserPatch {
            is_admin: Some(false),
            ..UserPatch::default()
        };
        handler
            .update_user(admin(), "u2".to_string(), patch)
            .await
            .unwrap();
        assert_eq!(api.update_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unconfirmed_destructive_actions_are_refused() {
        let api = Arc::new(FakeDirectory::new(vec![]));
        let (handler, _) = handler(api.clone());

        let reset = handler
            .reset_password(admin(), "u2".to_string(), "u2@example.com".to_string(), false)
            .await;
        assert!(matches!(reset, Err(ServiceError::Validation(_))));

        let deactivate = handler
            .deactivate_user(admin(), "u2".to_string(), "u2@example.com".to_string(), false)
            .await;
        assert!(matches!(deactivate, Err(ServiceError::Validation(_))));

        assert_eq!(api.reset_calls.load(Ordering::SeqCst), 0);
        assert_eq!(api.deactivate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reset_password_returns_the_credential_without_touching_the_roster() {
        let mut api = FakeDirectory::new(vec![record("u1", false, true)]);
        api.temp_password = Some("hunter2-temp".to_string());
        let api = Arc::new(api);
        let (handler, notifier) = handler(api.clone());

        let reset = handler
            .reset_password(admin(), "u1".to_string(), "u1@example.com".to_string(), true)
            .await
            .unwrap();

        assert_eq!(reset.temp_password.as_deref(), Some("hunter2-temp"));
        assert_eq!(api.reset_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 0);
        assert!(handler.roster.read().await.is_empty());
        // The credential never appears in a notification.
        for message in notifier.successes.lock().unwrap().iter() {
            assert!(!message.contains("hunter2-temp"));
        }
    }

    #[tokio::test]
    async fn deactivation_conflict_reports_the_count_and_keeps_the_roster() {
        let prior = vec![record("u1", false, true), record("u2", false, true)];
        let mut api = FakeDirectory::new(vec![record("u1", false, true)]);
        api.deactivate_conflict = Some(3);
        let api = Arc::new(api);
        let (handler, notifier) = handler(api.clone());
        *handler.roster.write().await = prior.clone();

        let result = handler
            .deactivate_user(admin(), "u2".to_string(), "u2@example.com".to_string(), true)
            .await;

        match result {
            Err(ServiceError::Conflict { assigned_contacts }) => assert_eq!(assigned_contacts, 3),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(*handler.roster.read().await, prior);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 0);
        assert!(notifier.errors.lock().unwrap()[0].contains("3 assigned contacts"));
    }

    #[tokio::test]
    async fn successful_deactivation_reconciles_exactly_once() {
        let served = vec![record("u1", false, true)];
        let api = Arc::new(FakeDirectory::new(served.clone()));
        let (handler, _) = handler(api.clone());
        *handler.roster.write().await = vec![record("u1", false, true), record("u2", false, true)];

        let view = handler
            .deactivate_user(admin(), "u2".to_string(), "u2@example.com".to_string(), true)
            .await
            .unwrap();

        assert_eq!(api.deactivate_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(view.users, served);
        assert_eq!(*handler.roster.read().await, served);
    }

    #[tokio::test]
    async fn self_deactivation_is_refused_before_any_network_call() {
        let api = Arc::new(FakeDirectory::new(vec![]));
        let (handler, _) = handler(api.clone());

        let result = handler
            .deactivate_user(
                admin(),
                "admin-1".to_string(),
                "dana@example.com".to_string(),
                true,
            )
            .await;

        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert_eq!(api.deactivate_calls.load(Ordering::SeqCst), 0);
    }
}
