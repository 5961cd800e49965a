use crate::client::{Gradebook, Operation};
use crate::errors::UpstreamError;
use crate::metrics_defs::{UPSTREAM_LOGINS, UPSTREAM_RETRIES};
use serde::Deserialize;
use shared::counter;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone, Default, Deserialize, PartialEq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The single upstream session of the process.
///
/// There is no lock around re-authentication: two requests failing at the
/// same time may both log in again, which the upstream tolerates.
pub struct Session {
    client: Arc<dyn Gradebook>,
    credentials: Credentials,
    student_index: Option<u32>,
    authenticated: AtomicBool,
}

impl Session {
    pub fn new(
        client: Arc<dyn Gradebook>,
        credentials: Credentials,
        student_index: Option<u32>,
    ) -> Self {
        Session {
            client,
            credentials,
            student_index,
            authenticated: AtomicBool::new(false),
        }
    }

    pub fn client(&self) -> &dyn Gradebook {
        self.client.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Relaxed)
    }

    /// Logs in unless already authenticated. Selecting the configured
    /// student is best effort and never fails the login.
    pub async fn ensure_authenticated(&self) -> Result<(), UpstreamError> {
        if self.is_authenticated() {
            return Ok(());
        }

        if let Err(e) = self
            .client
            .authorize(&self.credentials.login, &self.credentials.password)
            .await
        {
            counter!(UPSTREAM_LOGINS, "result" => "failure").increment(1);
            tracing::error!(error = %e, "gradebook login failed");
            return Err(e);
        }
        counter!(UPSTREAM_LOGINS, "result" => "success").increment(1);
        tracing::info!(login = %self.credentials.login, "logged in to gradebook");

        if let Some(index) = self.student_index
            && self.client.capabilities().select_student
        {
            match self.client.select_student(index).await {
                Ok(()) => tracing::info!(student_index = index, "selected student"),
                Err(e) => tracing::warn!(
                    student_index = index,
                    error = %e,
                    "student selection failed, continuing with the default student"
                ),
            }
        }

        self.authenticated.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Marks the session as stale. The client handle is kept and reused by
    /// the next login.
    pub fn invalidate(&self) {
        self.authenticated.store(false, Ordering::Relaxed);
    }

    /// Runs `op`; on failure re-authenticates and runs it exactly once more.
    /// The outcome of the second attempt is returned as is.
    pub async fn with_retry<T, F, Fut>(&self, operation: Operation, op: F) -> Result<T, UpstreamError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let first_error = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        tracing::warn!(
            operation = %operation,
            error = %first_error,
            "upstream call failed, logging in again"
        );
        self.invalidate();
        self.ensure_authenticated().await?;

        let result = op().await;
        let outcome = if result.is_ok() { "success" } else { "failure" };
        counter!(UPSTREAM_RETRIES, "operation" => operation.as_str(), "result" => outcome)
            .increment(1);
        result
    }

    /// Ensures the session is authenticated, then runs `op` with one retry.
    pub async fn call<T, F, Fut>(&self, operation: Operation, op: F) -> Result<T, UpstreamError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        self.ensure_authenticated().await?;
        self.with_retry(operation, op).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Capabilities;
    use crate::testutils::{MockGradebook, MockReply};
    use serde_json::json;

    fn credentials() -> Credentials {
        Credentials {
            login: "parent".to_string(),
            password: "secret".to_string(),
        }
    }

    fn session_with(mock: Arc<MockGradebook>, student_index: Option<u32>) -> Session {
        Session::new(mock, credentials(), student_index)
    }

    #[tokio::test]
    async fn test_ensure_authenticated_is_idempotent() {
        let mock = Arc::new(MockGradebook::new());
        let session = session_with(mock.clone(), None);

        session.ensure_authenticated().await.unwrap();
        session.ensure_authenticated().await.unwrap();

        assert!(session.is_authenticated());
        assert_eq!(mock.authorize_calls(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_login() {
        let mock = Arc::new(MockGradebook::new());
        let session = session_with(mock.clone(), None);

        session.ensure_authenticated().await.unwrap();
        session.invalidate();
        assert!(!session.is_authenticated());
        session.ensure_authenticated().await.unwrap();

        assert_eq!(mock.authorize_calls(), 2);
    }

    #[tokio::test]
    async fn test_student_selection_failure_is_not_fatal() {
        let mock = Arc::new(MockGradebook::new());
        mock.fail_student_selection();
        let session = session_with(mock.clone(), Some(1));

        session.ensure_authenticated().await.unwrap();

        assert!(session.is_authenticated());
        assert_eq!(mock.selected_students(), vec![1]);
    }

    #[tokio::test]
    async fn test_student_selection_skipped_without_capability() {
        let mock = Arc::new(MockGradebook::with_capabilities(Capabilities {
            select_student: false,
            homeworks: true,
        }));
        let session = session_with(mock.clone(), Some(2));

        session.ensure_authenticated().await.unwrap();

        assert!(mock.selected_students().is_empty());
    }

    #[tokio::test]
    async fn test_failed_login_propagates() {
        let mock = Arc::new(MockGradebook::new());
        mock.fail_authorize(true);
        let session = session_with(mock.clone(), None);

        let result = session.ensure_authenticated().await;

        assert!(matches!(result, Err(UpstreamError::Unauthorized)));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_retry_recovers_after_one_failure() {
        let mock = Arc::new(MockGradebook::new());
        mock.push(Operation::Grades, MockReply::Fail("session expired".into()));
        mock.push(Operation::Grades, MockReply::Ok(json!([{"name": "Math"}])));
        let session = session_with(mock.clone(), None);

        let grades = session
            .call(Operation::Grades, || session.client().grades())
            .await
            .unwrap();

        assert_eq!(grades, json!([{"name": "Math"}]));
        assert_eq!(mock.calls(Operation::Grades), 2);
        // initial login plus exactly one re-login
        assert_eq!(mock.authorize_calls(), 2);
    }

    #[tokio::test]
    async fn test_retry_propagates_second_failure() {
        let mock = Arc::new(MockGradebook::new());
        mock.push(Operation::Calendar, MockReply::Fail("first".into()));
        mock.push(Operation::Calendar, MockReply::Fail("second".into()));
        mock.push(Operation::Calendar, MockReply::Ok(json!([])));
        let session = session_with(mock.clone(), None);

        let result = session
            .call(Operation::Calendar, || session.client().calendar())
            .await;

        match result {
            Err(UpstreamError::Other(message)) => assert_eq!(message, "second"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(mock.calls(Operation::Calendar), 2);
        assert_eq!(mock.authorize_calls(), 2);
    }

    #[tokio::test]
    async fn test_retry_does_not_call_again_when_relogin_fails() {
        let mock = Arc::new(MockGradebook::new());
        mock.push(Operation::Timetable, MockReply::Fail("expired".into()));
        let session = session_with(mock.clone(), None);
        session.ensure_authenticated().await.unwrap();
        mock.fail_authorize(true);

        let result = session
            .with_retry(Operation::Timetable, || session.client().timetable())
            .await;

        assert!(matches!(result, Err(UpstreamError::Unauthorized)));
        assert_eq!(mock.calls(Operation::Timetable), 1);
    }
}
