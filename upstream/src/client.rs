use crate::errors::UpstreamError;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// Domain calls exposed by the gradebook.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Grades,
    Homeworks,
    Inbox,
    Message,
    Receivers,
    Announcements,
    Timetable,
    Calendar,
}

impl Operation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operation::Grades => "grades",
            Operation::Homeworks => "homeworks",
            Operation::Inbox => "inbox",
            Operation::Message => "message",
            Operation::Receivers => "receivers",
            Operation::Announcements => "announcements",
            Operation::Timetable => "timetable",
            Operation::Calendar => "calendar",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional features that not every gradebook backend offers.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Capabilities {
    pub select_student: bool,
    pub homeworks: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            select_student: true,
            homeworks: true,
        }
    }
}

/// Inclusive date range passed through to the homework listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Capability surface of the upstream gradebook.
///
/// Payloads are returned untouched: record shapes differ between backend
/// versions and schools, and reconciling them is the caller's job.
#[async_trait]
pub trait Gradebook: Send + Sync {
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    async fn authorize(&self, login: &str, password: &str) -> Result<(), UpstreamError>;

    async fn select_student(&self, index: u32) -> Result<(), UpstreamError>;

    /// Subjects, each with per-term grade lists.
    async fn grades(&self) -> Result<Value, UpstreamError>;

    async fn homeworks(&self, range: Option<DateRange>) -> Result<Value, UpstreamError>;

    async fn list_inbox(&self, folder_id: i64, page: Option<u32>) -> Result<Value, UpstreamError>;

    /// Returns `None` when the message does not exist.
    async fn get_message(&self, folder_id: i64, id: i64) -> Result<Option<Value>, UpstreamError>;

    async fn list_receivers(&self, query: &str) -> Result<Value, UpstreamError>;

    async fn list_announcements(&self) -> Result<Value, UpstreamError>;

    /// Either a flat lesson list or a weekday/hour grid.
    async fn timetable(&self) -> Result<Value, UpstreamError>;

    async fn calendar(&self) -> Result<Value, UpstreamError>;
}
