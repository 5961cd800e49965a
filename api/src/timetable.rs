//! Timetable reconciliation.
//!
//! The upstream exposes lessons either as a flat list or as a weekday by
//! period grid; some instances expose neither and only publish a calendar
//! feed. Every shape is folded into the same ordered list of [`Day`]s.

use crate::dates::{date_in_week, parse_date, parse_date_str, weekday_from_name, weekday_name};
use crate::fields::{first_i64, first_non_empty, first_present, first_string};
use crate::query::{DateWindow, RawSideChannel};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use upstream::{Gradebook, Operation, Session, UpstreamError};

const DATE_ALIASES: &[&str] = &["date", "day", "lessonDate"];
const TIMESTAMP_DATE_ALIASES: &[&str] = &["startDate", "beginDate"];
const START_ALIASES: &[&str] = &["start", "from", "begin", "startTime", "timeFrom"];
const END_ALIASES: &[&str] = &["end", "to", "finish", "endTime", "timeTo"];
const SUBJECT_ALIASES: &[&str] = &["subject", "name", "title"];
const NUMBER_ALIASES: &[&str] = &["number", "lesson", "idx"];
const ROOM_ALIASES: &[&str] = &["room", "classroom", "place"];
const TEACHER_ALIASES: &[&str] = &["teacher", "teacherName", "lecturer"];
const GROUP_ALIASES: &[&str] = &["group", "class"];

/// Substrings that mark a calendar event as a lesson.
const LESSON_KEYWORDS: &[&str] = &[
    "lekcj", "zaję", "wf", "polski", "matem", "angiel", "przyro", "muzyc", "plasty", "informat",
    "etyk", "relig",
];

const UNKNOWN_DAY: &str = "Unknown";
const UNKNOWN_DAY_RANK: u32 = 99;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub date: Option<NaiveDate>,
    pub day_name: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub number: Option<i64>,
    pub subject: Option<String>,
    pub room: Option<String>,
    pub teacher: Option<String>,
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl RawSideChannel for Lesson {
    fn raw_mut(&mut self) -> &mut Option<Value> {
        &mut self.raw
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Day {
    pub date: Option<NaiveDate>,
    pub day_name: String,
    pub lessons: Vec<Lesson>,
}

/// Where the lessons of a response came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimetableSource {
    Timetable,
    CalendarFallback,
    None,
}

#[derive(Clone, Debug)]
pub struct Timetable {
    pub days: Vec<Day>,
    pub source: TimetableSource,
}

impl Timetable {
    pub fn lesson_count(&self) -> usize {
        self.days.iter().map(|d| d.lessons.len()).sum()
    }

    pub fn apply_raw_mode(&mut self, include_raw: bool) {
        for day in &mut self.days {
            crate::query::apply_raw_mode(&mut day.lessons, include_raw);
        }
    }

    /// Lessons of the group dated `date`, empty if there is none.
    pub fn into_lessons_on(self, date: NaiveDate) -> Vec<Lesson> {
        self.days
            .into_iter()
            .find(|d| d.date == Some(date))
            .map(|d| d.lessons)
            .unwrap_or_default()
    }
}

/// The window to keep and the Monday used to put grid weekdays on dates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimetableQuery {
    pub window: DateWindow,
    pub week_start: Option<NaiveDate>,
}

/// Recognized shapes of the upstream timetable payload.
#[derive(Debug)]
pub enum TimetableShape<'a> {
    FlatList(&'a [Value]),
    Grid {
        hours: &'a [Value],
        table: &'a Map<String, Value>,
    },
    Unrecognized,
}

impl<'a> TimetableShape<'a> {
    pub fn of(payload: &'a Value) -> Self {
        if let Value::Array(lessons) = payload {
            return TimetableShape::FlatList(lessons);
        }
        if let Some(Value::Array(lessons)) = payload.get("lessons") {
            return TimetableShape::FlatList(lessons);
        }

        match (payload.get("hours"), payload.get("table")) {
            (Some(hours), Some(Value::Object(table))) if !hours.is_null() => TimetableShape::Grid {
                hours: hours.as_array().map(Vec::as_slice).unwrap_or_default(),
                table,
            },
            _ => TimetableShape::Unrecognized,
        }
    }

    pub fn lessons(&self, week_start: Option<NaiveDate>) -> Vec<Lesson> {
        match self {
            TimetableShape::FlatList(records) => records.iter().map(normalize_lesson).collect(),
            TimetableShape::Grid { hours, table } => reconcile_grid(hours, table, week_start),
            TimetableShape::Unrecognized => Vec::new(),
        }
    }
}

fn lesson_date(record: &Value) -> Option<NaiveDate> {
    match first_present(record, DATE_ALIASES) {
        Some(value) => parse_date(value),
        None => first_present(record, TIMESTAMP_DATE_ALIASES)
            .and_then(Value::as_str)
            .and_then(|s| parse_date_str(s.get(..10).unwrap_or(s))),
    }
}

/// Maps one lesson-like record to a [`Lesson`].
pub fn normalize_lesson(record: &Value) -> Lesson {
    Lesson {
        date: lesson_date(record),
        day_name: first_string(record, &["dayName"]),
        start: first_string(record, START_ALIASES),
        end: first_string(record, END_ALIASES),
        number: first_i64(record, NUMBER_ALIASES),
        subject: first_string(record, SUBJECT_ALIASES),
        room: first_string(record, ROOM_ALIASES),
        teacher: first_string(record, TEACHER_ALIASES),
        group: first_string(record, GROUP_ALIASES),
        raw: Some(record.clone()),
    }
}

/// Splits `"08:00 - 08:45"` into its trimmed halves. Text without a `-`
/// yields no times.
fn split_time_range(text: &str) -> (Option<String>, Option<String>) {
    if !text.contains('-') {
        return (None, None);
    }
    let mut parts = text.split('-').map(str::trim);
    let non_empty = |part: Option<&str>| part.filter(|p| !p.is_empty()).map(str::to_string);
    let start = non_empty(parts.next());
    let end = non_empty(parts.next());
    (start, end)
}

fn reconcile_grid(
    hours: &[Value],
    table: &Map<String, Value>,
    week_start: Option<NaiveDate>,
) -> Vec<Lesson> {
    let mut lessons = Vec::new();

    for (day_name, slots) in table {
        let Value::Array(slots) = slots else {
            continue;
        };
        let date = week_start
            .zip(weekday_from_name(day_name))
            .and_then(|(monday, weekday)| date_in_week(monday, weekday));

        for (idx, slot) in slots.iter().enumerate() {
            if slot.is_null() {
                continue;
            }

            let time = first_non_empty(slot, &["time"])
                .or_else(|| hours.get(idx).and_then(Value::as_str).map(str::to_string));
            let (start, end) = time
                .as_deref()
                .map(split_time_range)
                .unwrap_or_default();

            lessons.push(Lesson {
                date,
                day_name: Some(day_name.clone()),
                start,
                end,
                number: Some(idx as i64 + 1),
                subject: first_non_empty(slot, &["subject"]),
                room: first_non_empty(slot, &["room"]),
                teacher: first_non_empty(slot, &["teacher"]),
                group: None,
                raw: Some(slot.clone()),
            });
        }
    }

    lessons
}

fn looks_like_lesson(event: &Value) -> bool {
    let title = first_string(event, &["title", "name", "subject"]).unwrap_or_default();
    let category = first_string(event, &["category", "type"]).unwrap_or_default();
    let haystack = format!("{title} {category}").to_lowercase();
    LESSON_KEYWORDS.iter().any(|keyword| haystack.contains(keyword))
}

fn event_date(event: &Value) -> Option<NaiveDate> {
    match first_present(event, &["date", "day"]) {
        Some(value) => parse_date(value),
        None => first_present(event, &["start", "begin"])
            .and_then(Value::as_str)
            .and_then(|s| parse_date_str(s.get(..10).unwrap_or(s))),
    }
}

fn normalize_event(event: &Value) -> Lesson {
    Lesson {
        date: event_date(event),
        day_name: None,
        start: first_string(event, &["start", "begin", "startTime"]),
        end: first_string(event, &["end", "finish", "endTime"]),
        number: first_i64(event, &["number", "lesson"]),
        subject: first_string(event, &["subject", "title", "name"]),
        room: first_string(event, ROOM_ALIASES),
        teacher: first_string(event, &["teacher", "teacherName"]),
        group: first_string(event, GROUP_ALIASES),
        raw: Some(event.clone()),
    }
}

/// Lesson-like events of a calendar payload (an array or `{events}`).
pub fn calendar_lessons(payload: &Value) -> Vec<Lesson> {
    crate::fields::list_under(payload, "events")
        .iter()
        .filter(|event| looks_like_lesson(event))
        .map(normalize_event)
        .collect()
}

/// Lesson order inside a day: by number when both have one, else by start
/// time when both have one. Anything else compares equal.
fn compare_lessons(a: &Lesson, b: &Lesson) -> Ordering {
    match (a.number, b.number) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => match (&a.start, &b.start) {
            (Some(x), Some(y)) => x.cmp(y),
            _ => Ordering::Equal,
        },
    }
}

/// Stable insertion sort. [`compare_lessons`] is not transitive when
/// numbers are only partly present, which `slice::sort_by` does not accept.
fn sort_lessons(lessons: &mut [Lesson]) {
    for i in 1..lessons.len() {
        let mut j = i;
        while j > 0 && compare_lessons(&lessons[j - 1], &lessons[j]) == Ordering::Greater {
            lessons.swap(j - 1, j);
            j -= 1;
        }
    }
}

fn day_rank(name: &str) -> u32 {
    weekday_from_name(name).map_or(UNKNOWN_DAY_RANK, |w| w.num_days_from_monday())
}

fn compare_days(a: &Day, b: &Day) -> Ordering {
    match (a.date, b.date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => day_rank(&a.day_name).cmp(&day_rank(&b.day_name)),
    }
}

/// Filters lessons by `window`, groups them into days and orders the
/// result.
///
/// Lessons are grouped by date as soon as one of them has a date; lessons
/// without a date are dropped in that case. Otherwise they are grouped by
/// weekday name.
pub fn assemble_days(lessons: Vec<Lesson>, window: &DateWindow) -> Vec<Day> {
    let lessons: Vec<Lesson> = lessons
        .into_iter()
        .filter(|lesson| window.contains(lesson.date))
        .collect();

    let mut days: Vec<Day> = if lessons.iter().any(|l| l.date.is_some()) {
        let mut groups: IndexMap<NaiveDate, Vec<Lesson>> = IndexMap::new();
        for lesson in lessons {
            if let Some(date) = lesson.date {
                groups.entry(date).or_default().push(lesson);
            }
        }

        groups
            .into_iter()
            .map(|(date, mut lessons)| {
                sort_lessons(&mut lessons);
                let day_name = lessons
                    .first()
                    .and_then(|l| l.day_name.clone())
                    .unwrap_or_else(|| weekday_name(date).to_string());
                for lesson in &mut lessons {
                    lesson.day_name = Some(day_name.clone());
                }
                Day {
                    date: Some(date),
                    day_name,
                    lessons,
                }
            })
            .collect()
    } else {
        let mut groups: IndexMap<String, Vec<Lesson>> = IndexMap::new();
        for lesson in lessons {
            let key = lesson
                .day_name
                .clone()
                .unwrap_or_else(|| UNKNOWN_DAY.to_string());
            groups.entry(key).or_default().push(lesson);
        }

        groups
            .into_iter()
            .map(|(day_name, mut lessons)| {
                sort_lessons(&mut lessons);
                Day {
                    date: None,
                    day_name,
                    lessons,
                }
            })
            .collect()
    };

    days.sort_by(compare_days);
    days
}

/// One pass over the upstream: the dedicated timetable first, the calendar
/// when that yields no lessons.
pub async fn load(client: &dyn Gradebook, query: &TimetableQuery) -> Result<Timetable, UpstreamError> {
    let payload = client.timetable().await?;
    let mut lessons = TimetableShape::of(&payload).lessons(query.week_start);
    let mut source = TimetableSource::Timetable;

    if lessons.is_empty() {
        tracing::debug!("timetable has no lessons, falling back to the calendar");
        let calendar = client.calendar().await?;
        lessons = calendar_lessons(&calendar);
        source = TimetableSource::CalendarFallback;
    }

    let days = assemble_days(lessons, &query.window);
    if days.is_empty() {
        source = TimetableSource::None;
    }
    Ok(Timetable { days, source })
}

/// [`load`] with authentication and the single retry around the whole
/// pass.
pub async fn fetch_timetable(session: &Session, query: &TimetableQuery) -> Result<Timetable, UpstreamError> {
    session
        .call(Operation::Timetable, || load(session.client(), query))
        .await
}
