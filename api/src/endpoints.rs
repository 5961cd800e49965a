use crate::dates::{monday_of, week_end};
use crate::errors::ApiError;
use crate::feed::{self, FeedItem};
use crate::fields::items_of;
use crate::grades::{count_grades, filter_by_subject, normalize_grades};
use crate::homework::normalize_homeworks;
use crate::messages::{
    DEFAULT_FOLDER_ID, KNOWN_FOLDERS, MessageDetail, MessageSummary, normalize_detail,
    normalize_inbox,
};
use crate::outcome::Fetched;
use crate::query::{DateWindow, QueryParams, SubjectFilter, apply_raw_mode};
use crate::timetable::{Day, Lesson, TimetableQuery, TimetableSource, fetch_timetable};
use chrono::NaiveDate;
use routing::{Route, RouteActions};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use upstream::{DateRange, Operation, Session, UpstreamError};

const AUTO_WEEK_NOTE: &str = "auto weekStart applied when missing";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Healthz,
    Grades,
    Homeworks,
    Messages,
    MessageReceivers,
    KnownFolders,
    MessageFeed,
    MessageFeedJson,
    MessageDetail,
    Announcements,
    Timetable,
    TimetableToday,
    DebugGrades,
    DebugMessages,
    DebugTimetable,
    DebugCalendar,
}

impl Endpoint {
    pub const fn name(&self) -> &'static str {
        match self {
            Endpoint::Healthz => "healthz",
            Endpoint::Grades => "grades",
            Endpoint::Homeworks => "homeworks",
            Endpoint::Messages => "messages",
            Endpoint::MessageReceivers => "message_receivers",
            Endpoint::KnownFolders => "known_folders",
            Endpoint::MessageFeed => "message_feed",
            Endpoint::MessageFeedJson => "message_feed_json",
            Endpoint::MessageDetail => "message_detail",
            Endpoint::Announcements => "announcements",
            Endpoint::Timetable => "timetable",
            Endpoint::TimetableToday => "timetable_today",
            Endpoint::DebugGrades => "debug_grades",
            Endpoint::DebugMessages => "debug_messages",
            Endpoint::DebugTimetable => "debug_timetable",
            Endpoint::DebugCalendar => "debug_calendar",
        }
    }

    pub fn routes() -> RouteActions<Endpoint> {
        RouteActions::new(vec![
            Route::get("/healthz", Endpoint::Healthz),
            Route::get("/grades", Endpoint::Grades),
            Route::get("/homeworks", Endpoint::Homeworks),
            Route::get("/messages", Endpoint::Messages),
            Route::get("/messages/receivers", Endpoint::MessageReceivers),
            Route::get("/messages/folders-known", Endpoint::KnownFolders),
            Route::get("/messages/feed", Endpoint::MessageFeed),
            Route::get("/messages/feed-json", Endpoint::MessageFeedJson),
            Route::get("/messages/{folder_id}/{id}", Endpoint::MessageDetail),
            Route::get("/announcements", Endpoint::Announcements),
            Route::get("/timetable", Endpoint::Timetable),
            Route::get("/timetable/today", Endpoint::TimetableToday),
            Route::get("/debug/grades", Endpoint::DebugGrades),
            Route::get("/debug/messages", Endpoint::DebugMessages),
            Route::get("/debug/timetable", Endpoint::DebugTimetable),
            Route::get("/debug/calendar", Endpoint::DebugCalendar),
        ])
    }
}

/// Successful endpoint output, before it is turned into a response.
#[derive(Debug)]
pub enum Reply {
    Json(Value),
    Html(String),
}

/// Everything a handler gets to see of the request.
pub struct RequestContext<'a> {
    pub params: HashMap<String, &'a str>,
    pub query: QueryParams,
    pub today: NaiveDate,
}

impl RequestContext<'_> {
    fn path_id(&self, name: &str) -> Result<i64, ApiError> {
        self.params
            .get(name)
            .and_then(|raw| raw.parse().ok())
            .ok_or(ApiError::NotFound)
    }

    fn folder_id(&self) -> Result<i64, ApiError> {
        Ok(self
            .query
            .integer("folderId", "invalid_folderId")?
            .unwrap_or(DEFAULT_FOLDER_ID))
    }
}

#[derive(Serialize)]
struct Envelope<T> {
    ok: bool,
    #[serde(flatten)]
    body: T,
}

fn ok<T: Serialize>(body: T) -> Result<Reply, ApiError> {
    Ok(Reply::Json(serde_json::to_value(Envelope { ok: true, body })?))
}

pub async fn handle(
    endpoint: Endpoint,
    session: &Session,
    request: &RequestContext<'_>,
) -> Result<Reply, ApiError> {
    match endpoint {
        Endpoint::Healthz => Ok(Reply::Json(json!({ "ok": true }))),
        Endpoint::Grades => grades(session, request).await,
        Endpoint::Homeworks => homeworks(session, request).await,
        Endpoint::Messages => messages(session, request).await,
        Endpoint::MessageReceivers => receivers(session, request).await,
        Endpoint::KnownFolders => ok(DataBody { data: KNOWN_FOLDERS }),
        Endpoint::MessageFeed => message_feed(session, request).await,
        Endpoint::MessageFeedJson => message_feed_json(session, request).await,
        Endpoint::MessageDetail => message_detail(session, request).await,
        Endpoint::Announcements => announcements(session).await,
        Endpoint::Timetable => timetable(session, request).await,
        Endpoint::TimetableToday => timetable_today(session, request).await,
        Endpoint::DebugGrades => {
            let raw = session
                .call(Operation::Grades, || session.client().grades())
                .await;
            debug_mirror(Operation::Grades, None, raw)
        }
        Endpoint::DebugMessages => {
            let folder_id = request.folder_id()?;
            let page = request.query.integer("page", "invalid_page")?;
            let raw = session
                .call(Operation::Inbox, || session.client().list_inbox(folder_id, page))
                .await;
            debug_mirror(Operation::Inbox, Some(folder_id), raw)
        }
        Endpoint::DebugTimetable => {
            let raw = session
                .call(Operation::Timetable, || session.client().timetable())
                .await;
            debug_mirror(Operation::Timetable, None, raw)
        }
        Endpoint::DebugCalendar => {
            let raw = session
                .call(Operation::Calendar, || session.client().calendar())
                .await;
            debug_mirror(Operation::Calendar, None, raw)
        }
    }
}

#[derive(Serialize)]
struct DataBody<T> {
    data: T,
}

#[derive(Serialize)]
struct ListBody<T> {
    total: usize,
    data: Vec<T>,
}

impl<T> ListBody<T> {
    fn new(data: Vec<T>) -> Self {
        ListBody {
            total: data.len(),
            data,
        }
    }
}

async fn grades(session: &Session, request: &RequestContext<'_>) -> Result<Reply, ApiError> {
    let payload = session
        .call(Operation::Grades, || session.client().grades())
        .await?;

    let subject = SubjectFilter::new(request.query.get("subject"));
    let mut subjects = filter_by_subject(normalize_grades(&payload), &subject);
    let include_raw = request.query.include_raw();
    for s in &mut subjects {
        apply_raw_mode(&mut s.items, include_raw);
    }

    #[derive(Serialize)]
    struct GradesBody<T> {
        subjects: usize,
        count: usize,
        data: T,
    }

    ok(GradesBody {
        subjects: subjects.len(),
        count: count_grades(&subjects),
        data: subjects,
    })
}

async fn homeworks(session: &Session, request: &RequestContext<'_>) -> Result<Reply, ApiError> {
    let window = request.query.window()?;
    let subject = SubjectFilter::new(request.query.get("subject"));

    let payload = if session.client().capabilities().homeworks {
        let range = window.is_active().then_some(DateRange {
            from: window.from,
            to: window.to,
        });
        session
            .call(Operation::Homeworks, || async move {
                let client = session.client();
                match client.homeworks(range).await {
                    Err(e) if range.is_some() => {
                        tracing::warn!(error = %e, "ranged homework listing failed, listing everything");
                        client.homeworks(None).await
                    }
                    result => result,
                }
            })
            .await?
    } else {
        Value::Null
    };

    let mut entries = normalize_homeworks(&payload, &window, &subject);
    apply_raw_mode(&mut entries, request.query.include_raw());
    ok(ListBody::new(entries))
}

/// Inbox listing of a folder. Listing failures count as an empty folder;
/// a failed login does not.
async fn list_folder(
    session: &Session,
    folder_id: i64,
    page: Option<u32>,
) -> Result<Vec<MessageSummary>, ApiError> {
    session.ensure_authenticated().await?;
    let result = session
        .with_retry(Operation::Inbox, || {
            session.client().list_inbox(folder_id, page)
        })
        .await
        .map(|payload| normalize_inbox(folder_id, &payload));
    Ok(Fetched::from_result(result).or_empty("inbox"))
}

async fn messages(session: &Session, request: &RequestContext<'_>) -> Result<Reply, ApiError> {
    let folder_id = request.folder_id()?;
    let page = request.query.integer("page", "invalid_page")?;

    let mut summaries = list_folder(session, folder_id, page).await?;
    apply_raw_mode(&mut summaries, request.query.include_raw());

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct MessagesBody {
        folder_id: i64,
        total: usize,
        data: Vec<MessageSummary>,
    }

    ok(MessagesBody {
        folder_id,
        total: summaries.len(),
        data: summaries,
    })
}

/// A message that cannot be fetched is reported as missing.
async fn fetch_detail(
    session: &Session,
    folder_id: i64,
    id: i64,
) -> Result<MessageDetail, ApiError> {
    session.ensure_authenticated().await?;
    let record = session
        .with_retry(Operation::Message, || {
            session.client().get_message(folder_id, id)
        })
        .await;

    match record {
        Ok(Some(record)) => Ok(normalize_detail(folder_id, id, &record)),
        Ok(None) => Err(ApiError::NotFound),
        Err(e) => {
            tracing::warn!(folder_id, id, error = %e, "message lookup failed");
            Err(ApiError::NotFound)
        }
    }
}

async fn message_detail(
    session: &Session,
    request: &RequestContext<'_>,
) -> Result<Reply, ApiError> {
    let folder_id = request.path_id("folder_id")?;
    let id = request.path_id("id")?;

    let mut detail = fetch_detail(session, folder_id, id).await?;
    if !request.query.include_raw() {
        detail.raw = None;
    }
    ok(DataBody { data: detail })
}

/// Listing where a failing call is answered with an empty list.
async fn swallowed_listing<F, Fut>(
    session: &Session,
    operation: Operation,
    listing: &'static str,
    op: F,
) -> Result<Vec<Value>, ApiError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Value, UpstreamError>>,
{
    session.ensure_authenticated().await?;
    let result = session
        .with_retry(operation, op)
        .await
        .map(|payload| items_of(&payload));
    Ok(Fetched::from_result(result).or_empty(listing))
}

async fn receivers(session: &Session, request: &RequestContext<'_>) -> Result<Reply, ApiError> {
    let query = request.query.get("q").unwrap_or_default().trim();
    let list = swallowed_listing(session, Operation::Receivers, "receivers", || {
        session.client().list_receivers(query)
    })
    .await?;
    ok(ListBody::new(list))
}

async fn announcements(session: &Session) -> Result<Reply, ApiError> {
    let list = swallowed_listing(session, Operation::Announcements, "announcements", || {
        session.client().list_announcements()
    })
    .await?;
    ok(ListBody::new(list))
}

/// Selected summaries of a folder paired with their bodies, newest first.
async fn feed_items(
    session: &Session,
    request: &RequestContext<'_>,
    unread_only: bool,
) -> Result<(i64, Vec<FeedItem>), ApiError> {
    let folder_id = request.folder_id()?;
    let limit = feed::clamp_limit(request.query.integer("limit", "invalid_limit")?);

    let summaries = feed::select(list_folder(session, folder_id, None).await?, unread_only, limit);

    let mut items = Vec::with_capacity(summaries.len());
    for summary in summaries {
        let Some(id) = summary.id.as_ref().and_then(|id| id.as_i64()) else {
            items.push(FeedItem::without_body(summary));
            continue;
        };
        match fetch_detail(session, folder_id, id).await {
            Ok(detail) => items.push(FeedItem::from_detail(summary, detail)),
            Err(e) => {
                tracing::debug!(folder_id, id, error = %e, "feed entry without body");
                items.push(FeedItem::without_body(summary));
            }
        }
    }
    Ok((folder_id, items))
}

async fn message_feed(session: &Session, request: &RequestContext<'_>) -> Result<Reply, ApiError> {
    let (folder_id, items) = feed_items(session, request, false).await?;
    Ok(Reply::Html(feed::render_html(folder_id, &items)))
}

async fn message_feed_json(
    session: &Session,
    request: &RequestContext<'_>,
) -> Result<Reply, ApiError> {
    let unread_only = request.query.flag("unreadOnly");
    let (folder_id, items) = feed_items(session, request, unread_only).await?;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct FeedBody {
        count: usize,
        folder_id: i64,
        unread_only: bool,
        items: Vec<FeedItem>,
    }

    ok(FeedBody {
        count: items.len(),
        folder_id,
        unread_only,
        items,
    })
}

/// Resolves the timetable window from the request. The second value tells
/// whether the automatic current-week window was used.
fn timetable_query(query: &QueryParams, today: NaiveDate) -> Result<(TimetableQuery, bool), ApiError> {
    let week = |monday: NaiveDate| {
        week_end(monday).map(|sunday| TimetableQuery {
            window: DateWindow::new(Some(monday), Some(sunday)),
            week_start: Some(monday),
        })
    };

    if let Some(date) = query.date("date", "invalid_date")? {
        let week_start = monday_of(date).ok_or(ApiError::BadRequest("invalid_date"))?;
        return Ok((
            TimetableQuery {
                window: DateWindow::day(date),
                week_start: Some(week_start),
            },
            false,
        ));
    }
    if let Some(week_start) = query.date("weekStart", "invalid_weekStart")? {
        let query = week(week_start).ok_or(ApiError::BadRequest("invalid_weekStart"))?;
        return Ok((query, false));
    }
    let window = query.window()?;
    if window.is_active() {
        return Ok((
            TimetableQuery {
                window,
                week_start: None,
            },
            false,
        ));
    }
    if query.flag_default_on("autoWeek")
        && let Some(current_week) = monday_of(today).and_then(week)
    {
        return Ok((current_week, true));
    }
    Ok((TimetableQuery::default(), false))
}

async fn timetable(session: &Session, request: &RequestContext<'_>) -> Result<Reply, ApiError> {
    let (query, auto_week) = timetable_query(&request.query, request.today)?;

    let mut timetable = fetch_timetable(session, &query).await?;
    timetable.apply_raw_mode(request.query.include_raw());

    #[derive(Serialize)]
    struct TimetableBody {
        days: usize,
        lessons: usize,
        data: Vec<Day>,
        source: TimetableSource,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<&'static str>,
    }

    ok(TimetableBody {
        days: timetable.days.len(),
        lessons: timetable.lesson_count(),
        source: timetable.source,
        data: timetable.days,
        note: auto_week.then_some(AUTO_WEEK_NOTE),
    })
}

async fn timetable_today(
    session: &Session,
    request: &RequestContext<'_>,
) -> Result<Reply, ApiError> {
    let today = request.today;
    let query = TimetableQuery {
        window: DateWindow::day(today),
        week_start: monday_of(today),
    };

    let mut timetable = fetch_timetable(session, &query).await?;
    timetable.apply_raw_mode(request.query.include_raw());

    #[derive(Serialize)]
    struct TodayBody {
        date: NaiveDate,
        lessons: Vec<Lesson>,
    }

    ok(TodayBody {
        date: today,
        lessons: timetable.into_lessons_on(today),
    })
}

/// Raw upstream payload. A failing call is reported in the body rather than
/// as an error status.
fn debug_mirror(
    operation: Operation,
    folder_id: Option<i64>,
    raw: Result<Value, UpstreamError>,
) -> Result<Reply, ApiError> {
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct MirrorBody {
        #[serde(skip_serializing_if = "Option::is_none")]
        folder_id: Option<i64>,
        raw: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    }

    let body = match raw {
        Ok(raw) => MirrorBody {
            folder_id,
            raw,
            note: None,
            error: None,
        },
        Err(e) => {
            tracing::warn!(operation = %operation, error = %e, "debug mirror call failed");
            MirrorBody {
                folder_id,
                raw: Value::Null,
                note: Some(format!("{operation} call failed")),
                error: Some(e.to_string()),
            }
        }
    };
    ok(body)
}
