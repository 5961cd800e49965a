use crate::client::{Capabilities, DateRange, Gradebook, Operation};
use crate::errors::UpstreamError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Clone, Debug)]
pub enum MockReply {
    Ok(Value),
    Fail(String),
    Unauthorized,
}

impl MockReply {
    fn into_result(self) -> Result<Value, UpstreamError> {
        match self {
            MockReply::Ok(value) => Ok(value),
            MockReply::Fail(message) => Err(UpstreamError::Other(message)),
            MockReply::Unauthorized => Err(UpstreamError::Unauthorized),
        }
    }
}

/// Scriptable in-memory gradebook.
///
/// Queued replies are consumed first, then the sticky reply for the
/// operation is used. Operations with neither fail.
pub struct MockGradebook {
    capabilities: Capabilities,
    queued: Mutex<HashMap<Operation, VecDeque<MockReply>>>,
    sticky: Mutex<HashMap<Operation, MockReply>>,
    calls: Mutex<HashMap<Operation, usize>>,
    homework_ranges: Mutex<Vec<Option<DateRange>>>,
    selected_students: Mutex<Vec<u32>>,
    authorize_calls: AtomicUsize,
    fail_authorize: AtomicBool,
    fail_select: AtomicBool,
}

impl Default for MockGradebook {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGradebook {
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::default())
    }

    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        MockGradebook {
            capabilities,
            queued: Mutex::new(HashMap::new()),
            sticky: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            homework_ranges: Mutex::new(Vec::new()),
            selected_students: Mutex::new(Vec::new()),
            authorize_calls: AtomicUsize::new(0),
            fail_authorize: AtomicBool::new(false),
            fail_select: AtomicBool::new(false),
        }
    }

    /// Queues a one-shot reply.
    pub fn push(&self, operation: Operation, reply: MockReply) {
        self.queued
            .lock()
            .entry(operation)
            .or_default()
            .push_back(reply);
    }

    /// Sets the reply used once the queue for `operation` is drained.
    pub fn set(&self, operation: Operation, reply: MockReply) {
        self.sticky.lock().insert(operation, reply);
    }

    pub fn fail_authorize(&self, fail: bool) {
        self.fail_authorize.store(fail, Ordering::Relaxed);
    }

    pub fn fail_student_selection(&self) {
        self.fail_select.store(true, Ordering::Relaxed);
    }

    pub fn authorize_calls(&self) -> usize {
        self.authorize_calls.load(Ordering::Relaxed)
    }

    pub fn calls(&self, operation: Operation) -> usize {
        self.calls.lock().get(&operation).copied().unwrap_or(0)
    }

    pub fn selected_students(&self) -> Vec<u32> {
        self.selected_students.lock().clone()
    }

    pub fn homework_ranges(&self) -> Vec<Option<DateRange>> {
        self.homework_ranges.lock().clone()
    }

    fn reply(&self, operation: Operation) -> Result<Value, UpstreamError> {
        *self.calls.lock().entry(operation).or_default() += 1;

        let queued = self
            .queued
            .lock()
            .get_mut(&operation)
            .and_then(|queue| queue.pop_front());

        match queued.or_else(|| self.sticky.lock().get(&operation).cloned()) {
            Some(reply) => reply.into_result(),
            None => Err(UpstreamError::Other(format!("no reply scripted for {operation}"))),
        }
    }
}

#[async_trait]
impl Gradebook for MockGradebook {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn authorize(&self, _login: &str, _password: &str) -> Result<(), UpstreamError> {
        self.authorize_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_authorize.load(Ordering::Relaxed) {
            return Err(UpstreamError::Unauthorized);
        }
        Ok(())
    }

    async fn select_student(&self, index: u32) -> Result<(), UpstreamError> {
        self.selected_students.lock().push(index);
        if self.fail_select.load(Ordering::Relaxed) {
            return Err(UpstreamError::Unsupported("student selection"));
        }
        Ok(())
    }

    async fn grades(&self) -> Result<Value, UpstreamError> {
        self.reply(Operation::Grades)
    }

    async fn homeworks(&self, range: Option<DateRange>) -> Result<Value, UpstreamError> {
        self.homework_ranges.lock().push(range);
        self.reply(Operation::Homeworks)
    }

    async fn list_inbox(&self, _folder_id: i64, _page: Option<u32>) -> Result<Value, UpstreamError> {
        self.reply(Operation::Inbox)
    }

    async fn get_message(&self, _folder_id: i64, _id: i64) -> Result<Option<Value>, UpstreamError> {
        self.reply(Operation::Message)
            .map(|value| if value.is_null() { None } else { Some(value) })
    }

    async fn list_receivers(&self, _query: &str) -> Result<Value, UpstreamError> {
        self.reply(Operation::Receivers)
    }

    async fn list_announcements(&self) -> Result<Value, UpstreamError> {
        self.reply(Operation::Announcements)
    }

    async fn timetable(&self) -> Result<Value, UpstreamError> {
        self.reply(Operation::Timetable)
    }

    async fn calendar(&self) -> Result<Value, UpstreamError> {
        self.reply(Operation::Calendar)
    }
}
