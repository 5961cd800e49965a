//! Read-only message feeds combining the folder listing with message
//! bodies.

use crate::fields::RecordId;
use crate::messages::{Attachment, MessageDetail, MessageSummary};
use serde::Serialize;
use std::cmp::Reverse;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 200;

pub fn clamp_limit(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
}

/// Newest first by the textual date, undated messages last. With
/// `unread_only` only messages explicitly marked unread are kept.
pub fn select(
    mut summaries: Vec<MessageSummary>,
    unread_only: bool,
    limit: usize,
) -> Vec<MessageSummary> {
    summaries.sort_by_key(|m| Reverse(m.date.clone().unwrap_or_default()));
    if unread_only {
        summaries.retain(|m| m.read == Some(false));
    }
    summaries.truncate(limit);
    summaries
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeedItem {
    pub id: Option<RecordId>,
    pub subject: String,
    pub sender: String,
    pub date: String,
    pub read: Option<bool>,
    pub body: String,
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl FeedItem {
    pub fn from_detail(summary: MessageSummary, detail: MessageDetail) -> Self {
        FeedItem {
            id: summary.id,
            subject: detail.subject,
            sender: detail.sender.or(summary.sender).unwrap_or_default(),
            date: detail.date.or(summary.date).unwrap_or_default(),
            read: summary.read,
            body: detail.body.unwrap_or_default().replace("\r\n", "\n"),
            attachments: detail.attachments,
            error: false,
        }
    }

    /// Entry for a message whose body could not be fetched.
    pub fn without_body(summary: MessageSummary) -> Self {
        FeedItem {
            id: summary.id,
            subject: summary.subject,
            sender: summary.sender.unwrap_or_default(),
            date: summary.date.unwrap_or_default(),
            read: summary.read,
            body: String::new(),
            attachments: Vec::new(),
            error: true,
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

const STYLE: &str = ":root{color-scheme:dark}
body{margin:0;font:14px/1.5 system-ui,-apple-system,Segoe UI,Roboto,Ubuntu,Arial;background:#111;color:#ddd}
header{position:sticky;top:0;background:#111;border-bottom:1px solid #222;padding:12px 16px}
header h1{margin:0;font-size:16px}
main{padding:8px 16px 40px;max-width:900px;margin:0 auto}
.msg{padding:14px 0;border-bottom:1px solid #222}
.msg h2{margin:0 0 6px;font-size:16px;color:#fff}
.meta{color:#aaa;font-size:12px;margin-bottom:8px}";

fn render_item(item: &FeedItem) -> String {
    let unread = if item.read == Some(false) {
        " • <strong>nieprzeczytana</strong>"
    } else {
        ""
    };
    let body = escape_html(&item.body).replace('\n', "<br>");

    format!(
        "<article class=\"msg\"><h2>{}</h2><div class=\"meta\">{} • {}{}</div><div class=\"body\">{}</div></article>\n",
        escape_html(&item.subject),
        escape_html(&item.sender),
        escape_html(&item.date),
        unread,
        body,
    )
}

pub fn render_html(folder_id: i64, items: &[FeedItem]) -> String {
    let articles: String = items.iter().map(render_item).collect();
    let main = if articles.is_empty() {
        "<p>Brak wiadomości.</p>".to_string()
    } else {
        articles
    };

    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\n<title>Librus – wiadomości</title>\n<style>\n{STYLE}\n</style></head><body>\n<header><h1>Ostatnie {} wiadomości (folder {folder_id})</h1></header>\n<main>{main}</main>\n</body></html>",
        items.len(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: i64, date: Option<&str>, read: Option<bool>) -> MessageSummary {
        MessageSummary {
            id: Some(RecordId::Number(id)),
            folder_id: 5,
            subject: format!("msg {id}"),
            sender: Some("Szkoła".into()),
            date: date.map(str::to_string),
            read,
            has_attachments: false,
            raw: None,
        }
    }

    fn ids(summaries: &[MessageSummary]) -> Vec<i64> {
        summaries
            .iter()
            .filter_map(|m| m.id.as_ref().and_then(RecordId::as_i64))
            .collect()
    }

    #[test]
    fn test_limit_is_capped() {
        assert_eq!(clamp_limit(None), 50);
        assert_eq!(clamp_limit(Some(3)), 3);
        assert_eq!(clamp_limit(Some(1000)), 200);
    }

    #[test]
    fn test_select_orders_newest_first() {
        let selected = select(
            vec![
                summary(1, Some("2024-01-01T08:00:00.000Z"), Some(true)),
                summary(2, None, Some(false)),
                summary(3, Some("2024-02-01T08:00:00.000Z"), Some(false)),
            ],
            false,
            2,
        );
        assert_eq!(ids(&selected), vec![3, 1]);
    }

    #[test]
    fn test_select_unread_only() {
        let selected = select(
            vec![
                summary(1, Some("2024-01-01"), Some(true)),
                summary(2, Some("2024-01-02"), None),
                summary(3, Some("2024-01-03"), Some(false)),
            ],
            true,
            10,
        );
        assert_eq!(ids(&selected), vec![3]);
    }

    #[test]
    fn test_html_is_escaped() {
        let mut item = FeedItem::without_body(summary(1, Some("2024-01-01"), Some(false)));
        item.subject = "<script>alert(1)</script>".into();
        item.body = "Linia 1\nLinia & 2".into();

        let html = render_html(5, &[item]);
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("Linia 1<br>Linia &amp; 2"));
        assert!(html.contains("nieprzeczytana"));
        assert!(html.contains("Ostatnie 1 wiadomości (folder 5)"));
        assert!(render_html(6, &[]).contains("Brak wiadomości."));
    }

    #[test]
    fn test_failed_item_serialization() {
        let failed = serde_json::to_value(FeedItem::without_body(summary(4, None, None))).unwrap();
        assert_eq!(failed["error"], true);
        assert_eq!(failed["date"], "");

        let mut ok = FeedItem::without_body(summary(5, None, None));
        ok.error = false;
        assert!(serde_json::to_value(ok).unwrap().get("error").is_none());
    }
}
