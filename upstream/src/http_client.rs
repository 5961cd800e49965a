//! Gradebook client speaking JSON over HTTP to a gradebook bridge.
//!
//! The bridge logs in with the user's credentials and hands back a bearer
//! token. Every domain call is a `GET {base_url}/<operation>` returning the
//! upstream payload verbatim.

use crate::client::{Capabilities, DateRange, Gradebook, Operation};
use crate::errors::UpstreamError;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

#[derive(Deserialize)]
struct AuthResponse {
    token: String,
}

pub struct HttpGradebook {
    client: reqwest::Client,
    base_url: String,
    capabilities: Capabilities,
    token: RwLock<Option<String>>,
}

impl HttpGradebook {
    /// `timeout` bounds each upstream request. `None` leaves requests
    /// unbounded.
    pub fn new(base_url: &Url, timeout: Option<Duration>) -> Result<Self, UpstreamError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(HttpGradebook {
            client: builder.build()?,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            capabilities: Capabilities::default(),
            token: RwLock::new(None),
        })
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, UpstreamError> {
        Ok(Url::parse(&format!("{}/{}", self.base_url, path))?)
    }

    fn bearer(&self) -> Result<String, UpstreamError> {
        self.token
            .read()
            .clone()
            .map(|token| format!("Bearer {token}"))
            .ok_or(UpstreamError::Unauthorized)
    }

    async fn send(
        &self,
        operation: Operation,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, UpstreamError> {
        let url = self.endpoint(operation.as_str())?;
        tracing::debug!(operation = %operation, "calling gradebook");

        let response = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, self.bearer()?)
            .query(query)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(UpstreamError::Unauthorized),
            _ => Ok(response),
        }
    }

    async fn get_json(
        &self,
        operation: Operation,
        query: &[(&str, String)],
    ) -> Result<Value, UpstreamError> {
        let response = self.send(operation, query).await?;
        if !response.status().is_success() {
            return Err(UpstreamError::Status {
                operation,
                status: response.status().as_u16(),
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl Gradebook for HttpGradebook {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn authorize(&self, login: &str, password: &str) -> Result<(), UpstreamError> {
        let response = self
            .client
            .post(self.endpoint("auth")?)
            .json(&json!({ "login": login, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            *self.token.write() = None;
            return Err(UpstreamError::Unauthorized);
        }

        let auth = response.json::<AuthResponse>().await?;
        *self.token.write() = Some(auth.token);
        Ok(())
    }

    async fn select_student(&self, index: u32) -> Result<(), UpstreamError> {
        if !self.capabilities.select_student {
            return Err(UpstreamError::Unsupported("student selection"));
        }

        let response = self
            .client
            .post(self.endpoint("student")?)
            .header(reqwest::header::AUTHORIZATION, self.bearer()?)
            .json(&json!({ "index": index }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(UpstreamError::Unauthorized),
            _ => Err(UpstreamError::Other(format!(
                "student selection returned status {}",
                response.status().as_u16()
            ))),
        }
    }

    async fn grades(&self) -> Result<Value, UpstreamError> {
        self.get_json(Operation::Grades, &[]).await
    }

    async fn homeworks(&self, range: Option<DateRange>) -> Result<Value, UpstreamError> {
        if !self.capabilities.homeworks {
            return Err(UpstreamError::Unsupported("homework listing"));
        }

        let mut query = Vec::new();
        if let Some(range) = range {
            if let Some(from) = range.from {
                query.push(("from", from.to_string()));
            }
            if let Some(to) = range.to {
                query.push(("to", to.to_string()));
            }
        }
        self.get_json(Operation::Homeworks, &query).await
    }

    async fn list_inbox(&self, folder_id: i64, page: Option<u32>) -> Result<Value, UpstreamError> {
        let mut query = vec![("folderId", folder_id.to_string())];
        if let Some(page) = page {
            query.push(("page", page.to_string()));
        }
        self.get_json(Operation::Inbox, &query).await
    }

    async fn get_message(&self, folder_id: i64, id: i64) -> Result<Option<Value>, UpstreamError> {
        let query = [("folderId", folder_id.to_string()), ("id", id.to_string())];
        let response = self.send(Operation::Message, &query).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let value = response.json::<Value>().await?;
                Ok(if value.is_null() { None } else { Some(value) })
            }
            status => Err(UpstreamError::Status {
                operation: Operation::Message,
                status: status.as_u16(),
            }),
        }
    }

    async fn list_receivers(&self, query: &str) -> Result<Value, UpstreamError> {
        self.get_json(Operation::Receivers, &[("q", query.to_string())])
            .await
    }

    async fn list_announcements(&self) -> Result<Value, UpstreamError> {
        self.get_json(Operation::Announcements, &[]).await
    }

    async fn timetable(&self) -> Result<Value, UpstreamError> {
        self.get_json(Operation::Timetable, &[]).await
    }

    async fn calendar(&self) -> Result<Value, UpstreamError> {
        self.get_json(Operation::Calendar, &[]).await
    }
}
