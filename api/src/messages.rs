use crate::dates::message_timestamp;
use crate::fields::{RecordId, first_bool, first_id, first_present, first_string, items_of};
use crate::query::RawSideChannel;
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_FOLDER_ID: i64 = 5;
pub const NO_SUBJECT: &str = "(bez tematu)";
const ATTACHMENT_PLACEHOLDER: &str = "plik";

const ID_ALIASES: &[&str] = &["id", "messageId", "uid", "msgId"];
const SUBJECT_ALIASES: &[&str] = &["subject", "title"];
const SENDER_ALIASES: &[&str] = &["sender", "from", "author", "teacher"];
const DATE_ALIASES: &[&str] = &["date", "sentAt", "time", "created"];
const RECIPIENT_ALIASES: &[&str] = &["to", "recipients"];
const BODY_ALIASES: &[&str] = &["body", "text", "html", "content"];
const ATTACHMENT_ALIASES: &[&str] = &["files", "attachments"];

#[derive(Clone, Copy, Debug, Serialize)]
pub struct KnownFolder {
    pub id: i64,
    pub name: &'static str,
}

/// Folders present on most instances. The upstream has no reliable way to
/// list them.
pub const KNOWN_FOLDERS: [KnownFolder; 3] = [
    KnownFolder {
        id: 5,
        name: "Odebrane",
    },
    KnownFolder {
        id: 6,
        name: "Wysłane",
    },
    KnownFolder {
        id: 10,
        name: "Uwagi",
    },
];

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub id: Option<RecordId>,
    pub folder_id: i64,
    pub subject: String,
    pub sender: Option<String>,
    pub date: Option<String>,
    /// `None` when the upstream says nothing about read state.
    pub read: Option<bool>,
    pub has_attachments: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl RawSideChannel for MessageSummary {
    fn raw_mut(&mut self) -> &mut Option<Value> {
        &mut self.raw
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Attachment {
    pub name: String,
    pub path: Option<String>,
    pub size: Option<Value>,
    pub mime: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDetail {
    pub id: i64,
    pub folder_id: i64,
    pub subject: String,
    pub sender: Option<String>,
    pub to: Option<Value>,
    pub date: Option<String>,
    pub body: Option<String>,
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

/// Read state: `read`, then `isRead`, then the inverse of `unread`.
fn read_state(record: &Value) -> Option<bool> {
    first_bool(record, &["read", "isRead"])
        .or_else(|| first_bool(record, &["unread"]).map(|unread| !unread))
}

fn attachment_list(record: &Value) -> &[Value] {
    match first_present(record, ATTACHMENT_ALIASES) {
        Some(Value::Array(files)) => files,
        _ => &[],
    }
}

fn has_attachments(record: &Value) -> bool {
    ATTACHMENT_ALIASES
        .iter()
        .any(|alias| matches!(record.get(alias), Some(Value::Array(files)) if !files.is_empty()))
}

fn subject_of(record: &Value) -> String {
    first_string(record, SUBJECT_ALIASES).unwrap_or_else(|| NO_SUBJECT.to_string())
}

fn date_of(record: &Value) -> Option<String> {
    first_present(record, DATE_ALIASES).and_then(message_timestamp)
}

pub fn normalize_summary(folder_id: i64, record: &Value) -> MessageSummary {
    MessageSummary {
        id: first_id(record, ID_ALIASES),
        folder_id,
        subject: subject_of(record),
        sender: first_string(record, SENDER_ALIASES),
        date: date_of(record),
        read: read_state(record),
        has_attachments: has_attachments(record),
        raw: Some(record.clone()),
    }
}

pub fn normalize_inbox(folder_id: i64, payload: &Value) -> Vec<MessageSummary> {
    items_of(payload)
        .iter()
        .map(|record| normalize_summary(folder_id, record))
        .collect()
}

fn normalize_attachment(file: &Value) -> Attachment {
    Attachment {
        name: first_string(file, &["name", "filename"])
            .unwrap_or_else(|| ATTACHMENT_PLACEHOLDER.to_string()),
        path: first_string(file, &["path", "url"]),
        size: first_present(file, &["size"]).cloned(),
        mime: first_string(file, &["mime", "contentType"]),
    }
}

/// `id` and `folder_id` come from the request, not from the record.
pub fn normalize_detail(folder_id: i64, id: i64, record: &Value) -> MessageDetail {
    MessageDetail {
        id,
        folder_id,
        subject: subject_of(record),
        sender: first_string(record, SENDER_ALIASES),
        to: first_present(record, RECIPIENT_ALIASES).cloned(),
        date: date_of(record),
        body: first_string(record, BODY_ALIASES),
        attachments: attachment_list(record)
            .iter()
            .map(normalize_attachment)
            .collect(),
        raw: Some(record.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_aliases() {
        let summary = normalize_summary(
            5,
            &json!({
                "messageId": 12,
                "title": "Zebranie",
                "from": "Wychowawca",
                "sentAt": "2024-03-05 10:15:00",
                "attachments": [{ "name": "plan.pdf" }]
            }),
        );

        assert_eq!(summary.id, Some(RecordId::Number(12)));
        assert_eq!(summary.subject, "Zebranie");
        assert_eq!(summary.sender.as_deref(), Some("Wychowawca"));
        assert_eq!(summary.date.as_deref(), Some("2024-03-05T10:15:00.000Z"));
        assert_eq!(summary.read, None);
        assert!(summary.has_attachments);
    }

    #[test]
    fn test_summary_defaults() {
        let summary = normalize_summary(10, &json!({ "files": [], "date": "wczoraj" }));
        assert_eq!(summary.id, None);
        assert_eq!(summary.subject, NO_SUBJECT);
        assert_eq!(summary.date.as_deref(), Some("wczoraj"));
        assert!(!summary.has_attachments);
    }

    #[test]
    fn test_read_is_tri_state() {
        assert_eq!(read_state(&json!({ "read": false, "isRead": true })), Some(false));
        assert_eq!(read_state(&json!({ "isRead": true })), Some(true));
        assert_eq!(read_state(&json!({ "unread": true })), Some(false));
        assert_eq!(read_state(&json!({ "read": null, "unread": false })), Some(true));
        assert_eq!(read_state(&json!({})), None);
        assert_eq!(read_state(&json!({ "read": 1, "isRead": false })), Some(false));
        assert_eq!(read_state(&json!({ "read": "yes", "unread": true })), Some(false));
    }

    #[test]
    fn test_detail_with_attachments() {
        let detail = normalize_detail(
            5,
            42,
            &json!({
                "subject": "Wycieczka",
                "recipients": ["Rodzice 2a"],
                "html": "Dzień dobry,\nzapraszamy",
                "files": [
                    { "filename": "zgoda.pdf", "url": "/f/1", "size": 1024, "contentType": "application/pdf" },
                    { "path": "/f/2" }
                ]
            }),
        );

        assert_eq!(detail.id, 42);
        assert_eq!(detail.to, Some(json!(["Rodzice 2a"])));
        assert_eq!(detail.body.as_deref(), Some("Dzień dobry,\nzapraszamy"));
        assert_eq!(
            detail.attachments,
            vec![
                Attachment {
                    name: "zgoda.pdf".into(),
                    path: Some("/f/1".into()),
                    size: Some(json!(1024)),
                    mime: Some("application/pdf".into()),
                },
                Attachment {
                    name: "plik".into(),
                    path: Some("/f/2".into()),
                    size: None,
                    mime: None,
                },
            ]
        );
    }

    #[test]
    fn test_inbox_shapes() {
        assert_eq!(normalize_inbox(5, &json!({ "items": [{ "id": 1 }] })).len(), 1);
        assert_eq!(normalize_inbox(5, &json!([{ "id": 1 }, { "id": 2 }])).len(), 2);
        assert!(normalize_inbox(5, &json!({ "unexpected": true })).is_empty());
    }

    #[test]
    fn test_known_folders_serialize() {
        let json = serde_json::to_value(KNOWN_FOLDERS).unwrap();
        assert_eq!(json[2], json!({ "id": 10, "name": "Uwagi" }));
    }
}
