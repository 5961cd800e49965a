use crate::fields::{first_string, list_under};
use crate::query::{RawSideChannel, SubjectFilter};
use serde::Serialize;
use serde_json::Value;

const VALUE_ALIASES: &[&str] = &["value", "symbol", "mark"];

const AREA_LABEL: &str = "Obszar oceniania:";
const SKILL_LABEL: &str = "Umiejętność:";
const DATE_LABEL: &str = "Data:";
const TEACHER_LABEL: &str = "Nauczyciel:";
const ADDED_BY_LABEL: &str = "Dodał:";

/// Fields recovered from the free-text `info` blob of a grade.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GradeInfo {
    pub area: Option<String>,
    pub skill: Option<String>,
    pub date: Option<String>,
    pub teacher: Option<String>,
    pub added_by: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntry {
    pub subject: String,
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl RawSideChannel for GradeEntry {
    fn raw_mut(&mut self) -> &mut Option<Value> {
        &mut self.raw
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubjectGrades {
    pub subject: String,
    pub items: Vec<GradeEntry>,
}

/// Parses the labelled lines of a grade's `info` text. Unknown lines are
/// ignored; a label that never appears leaves its field empty.
pub fn parse_info(info: &str) -> GradeInfo {
    let mut parsed = GradeInfo::default();

    for line in info.split('\n').map(str::trim) {
        if let Some(rest) = line.strip_prefix(AREA_LABEL) {
            parsed.area = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix(SKILL_LABEL) {
            parsed.skill = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix(DATE_LABEL) {
            parsed.date = Some(strip_trailing_parenthetical(rest.trim_start()).to_string());
        } else if let Some(rest) = line.strip_prefix(TEACHER_LABEL) {
            parsed.teacher = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix(ADDED_BY_LABEL) {
            parsed.added_by = Some(rest.trim().to_string());
        }
    }

    parsed
}

/// `2024-01-02 (wt.)` becomes `2024-01-02`. The cut starts at the first
/// `(` that encloses at least one character up to a closing `)` at the end.
fn strip_trailing_parenthetical(text: &str) -> &str {
    let text = text.trim_end();
    if !text.ends_with(')') {
        return text;
    }
    match text.find('(') {
        Some(open) if open + 1 < text.len() - 1 => text[..open].trim(),
        _ => text.trim(),
    }
}

/// Flattens upstream subjects into per-subject grade lists.
///
/// Subjects without a single grade in any term are dropped. Subject order
/// follows the upstream; grades keep term order, then in-term order.
pub fn normalize_grades(payload: &Value) -> Vec<SubjectGrades> {
    list_under(payload, "subjects")
        .iter()
        .filter_map(normalize_subject)
        .collect()
}

fn normalize_subject(record: &Value) -> Option<SubjectGrades> {
    let subject = first_string(record, &["name", "subject"]).unwrap_or_default();

    let terms = match record.get("semester") {
        Some(Value::Array(terms)) => terms.as_slice(),
        _ => &[],
    };

    let items: Vec<GradeEntry> = terms
        .iter()
        .filter_map(|term| match term.get("grades") {
            Some(Value::Array(grades)) if !grades.is_empty() => Some(grades),
            _ => None,
        })
        .flatten()
        .map(|grade| normalize_grade(&subject, grade))
        .collect();

    if items.is_empty() {
        return None;
    }
    Some(SubjectGrades { subject, items })
}

fn normalize_grade(subject: &str, grade: &Value) -> GradeEntry {
    let info = grade.get("info").and_then(Value::as_str).unwrap_or_default();
    let GradeInfo {
        area,
        skill,
        date,
        teacher,
        added_by,
    } = parse_info(info);

    GradeEntry {
        subject: subject.to_string(),
        value: first_string(grade, VALUE_ALIASES),
        area,
        skill,
        date,
        teacher,
        added_by,
        raw: Some(grade.clone()),
    }
}

/// Keeps grades whose subject matches; subjects left empty are dropped.
pub fn filter_by_subject(subjects: Vec<SubjectGrades>, filter: &SubjectFilter) -> Vec<SubjectGrades> {
    if !filter.is_active() {
        return subjects;
    }

    subjects
        .into_iter()
        .filter_map(|mut s| {
            s.items.retain(|item| filter.matches(Some(&item.subject)));
            (!s.items.is_empty()).then_some(s)
        })
        .collect()
}

pub fn count_grades(subjects: &[SubjectGrades]) -> usize {
    subjects.iter().map(|s| s.items.len()).sum()
}
