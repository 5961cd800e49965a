use crate::dates::parse_date;
use crate::fields::{RecordId, first_id, first_present, first_string, items_of};
use crate::query::{DateWindow, RawSideChannel, SubjectFilter};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

const ID_ALIASES: &[&str] = &["id", "homeworkId", "uid"];
const SUBJECT_ALIASES: &[&str] = &["subject", "subjectName", "name"];
const TITLE_ALIASES: &[&str] = &["title", "topic", "header"];
const DESCRIPTION_ALIASES: &[&str] = &["description", "content", "text"];
const ASSIGNED_ALIASES: &[&str] = &["assigned", "given", "created", "date"];
const DUE_ALIASES: &[&str] = &["due", "deadline", "dueDate", "end"];
const TEACHER_ALIASES: &[&str] = &["teacher", "teacherName", "author"];

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkEntry {
    pub id: Option<RecordId>,
    pub subject: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub assigned_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub teacher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl RawSideChannel for HomeworkEntry {
    fn raw_mut(&mut self) -> &mut Option<Value> {
        &mut self.raw
    }
}

pub fn normalize_homework(record: &Value) -> HomeworkEntry {
    let date = |aliases: &[&str]| first_present(record, aliases).and_then(parse_date);

    HomeworkEntry {
        id: first_id(record, ID_ALIASES),
        subject: first_string(record, SUBJECT_ALIASES),
        title: first_string(record, TITLE_ALIASES),
        description: first_string(record, DESCRIPTION_ALIASES),
        assigned_date: date(ASSIGNED_ALIASES),
        due_date: date(DUE_ALIASES),
        teacher: first_string(record, TEACHER_ALIASES),
        raw: Some(record.clone()),
    }
}

/// Date used for window filtering. A present due date wins even when it
/// does not parse, in which case the entry has no usable date.
pub fn effective_date(record: &Value) -> Option<NaiveDate> {
    first_present(record, DUE_ALIASES)
        .or_else(|| first_present(record, ASSIGNED_ALIASES))
        .and_then(parse_date)
}

/// Normalizes a homework listing and applies the request filters.
pub fn normalize_homeworks(
    payload: &Value,
    window: &DateWindow,
    subject: &SubjectFilter,
) -> Vec<HomeworkEntry> {
    items_of(payload)
        .iter()
        .filter(|record| window.contains(effective_date(record)))
        .map(normalize_homework)
        .filter(|entry| subject.matches(entry.subject.as_deref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn payload() -> Value {
        json!({
            "items": [
                { "id": 1, "subjectName": "Matematyka", "topic": "Ułamki", "given": "2024-01-02", "deadline": "2024-01-09 00:00:00", "teacherName": "A. Nowak" },
                { "homeworkId": "h-2", "subject": "Język polski", "title": "Wiersz", "date": "2024-01-03" },
                { "uid": 3, "name": "Przyroda", "due": "kiedyś" },
                { "id": 4, "subject": "Matematyka", "due": "2024-02-01", "content": "Zadania 1-5" }
            ]
        })
    }

    #[test]
    fn test_alias_resolution() {
        let entries = normalize_homeworks(&payload(), &DateWindow::default(), &SubjectFilter::default());
        assert_eq!(entries.len(), 4);

        let first = &entries[0];
        assert_eq!(first.id, Some(RecordId::Number(1)));
        assert_eq!(first.subject.as_deref(), Some("Matematyka"));
        assert_eq!(first.title.as_deref(), Some("Ułamki"));
        assert_eq!(first.assigned_date, Some(date("2024-01-02")));
        assert_eq!(first.due_date, Some(date("2024-01-09")));
        assert_eq!(first.teacher.as_deref(), Some("A. Nowak"));

        assert_eq!(entries[1].id, Some(RecordId::Text("h-2".into())));
        assert_eq!(entries[2].due_date, None);
        assert_eq!(entries[3].description.as_deref(), Some("Zadania 1-5"));
    }

    #[test]
    fn test_window_uses_due_then_assigned() {
        let window = DateWindow::new(Some(date("2024-01-03")), Some(date("2024-01-09")));
        let entries = normalize_homeworks(&payload(), &window, &SubjectFilter::default());

        let ids: Vec<_> = entries.iter().map(|e| e.id.clone()).collect();
        // the unparsable due date and the February entry fall out
        assert_eq!(
            ids,
            vec![Some(RecordId::Number(1)), Some(RecordId::Text("h-2".into()))]
        );
    }

    #[test]
    fn test_unparsable_due_date_is_not_replaced_by_assigned() {
        let record = json!({ "due": "kiedyś", "given": "2024-01-05" });
        assert_eq!(effective_date(&record), None);
        assert_eq!(effective_date(&json!({ "due": null, "given": "2024-01-05" })), Some(date("2024-01-05")));

        let window = DateWindow::new(Some(date("2024-01-01")), Some(date("2024-01-31")));
        let entries = normalize_homeworks(&json!([record.clone()]), &window, &SubjectFilter::default());
        assert!(entries.is_empty());

        let entries = normalize_homeworks(&json!([record]), &DateWindow::default(), &SubjectFilter::default());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].assigned_date, Some(date("2024-01-05")));
    }

    #[test]
    fn test_subject_filter() {
        let entries = normalize_homeworks(
            &payload(),
            &DateWindow::default(),
            &SubjectFilter::new(Some("MATEM")),
        );
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_bare_array_and_dates_serialize() {
        let entries = normalize_homeworks(
            &json!([{ "id": 9, "due": "2024-05-06" }]),
            &DateWindow::default(),
            &SubjectFilter::default(),
        );
        let json = serde_json::to_value(&entries[0]).unwrap();
        assert_eq!(json["dueDate"], "2024-05-06");
        assert_eq!(json["assignedDate"], Value::Null);
        assert_eq!(json["raw"]["id"], 9);

        assert!(normalize_homeworks(&Value::Null, &DateWindow::default(), &SubjectFilter::default()).is_empty());
    }
}
