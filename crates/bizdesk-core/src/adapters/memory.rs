//! In-process adapters
//!
//! Recording mail and calendar adapters that keep every request instead of
//! reaching a provider, and a ledger that answers from a fixed table. They
//! back `--dry-run` and the tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use super::{
    CalendarAdapter, CreatedEvent, LedgerAdapter, LedgerQuery, MailAdapter, MessageSummary,
    NewEvent, OutgoingMail, SentMail, event_window,
};
use crate::error::AdapterError;

/// Mail adapter that records sent messages
#[derive(Debug, Default)]
pub struct RecordingMail {
    sent: Mutex<Vec<OutgoingMail>>,
    inbox: Vec<MessageSummary>,
    fail_with: Option<AdapterError>,
}

impl RecordingMail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with `error`
    pub fn failing(error: AdapterError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::default()
        }
    }

    pub fn with_inbox(mut self, inbox: Vec<MessageSummary>) -> Self {
        self.inbox = inbox;
        self
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl MailAdapter for RecordingMail {
    fn provider(&self) -> &str {
        "memory-mail"
    }

    async fn send(&self, mail: &OutgoingMail) -> Result<SentMail, AdapterError> {
        if let Some(e) = &self.fail_with {
            return Err(e.clone());
        }
        let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        sent.push(mail.clone());
        let n = sent.len();
        debug!("Recorded mail #{} to {}", n, mail.to);
        Ok(SentMail {
            message_id: format!("msg-{}", n),
            thread_id: format!("thread-{}", n),
        })
    }

    async fn list(
        &self,
        query: Option<&str>,
        max_results: u32,
    ) -> Result<Vec<MessageSummary>, AdapterError> {
        if let Some(e) = &self.fail_with {
            return Err(e.clone());
        }
        let needle = query.map(str::to_lowercase);
        Ok(self
            .inbox
            .iter()
            .filter(|m| {
                needle.as_ref().is_none_or(|q| {
                    m.subject.to_lowercase().contains(q) || m.from.to_lowercase().contains(q)
                })
            })
            .take(max_results as usize)
            .cloned()
            .collect())
    }
}

/// Calendar adapter that records created events
#[derive(Debug, Default)]
pub struct RecordingCalendar {
    created: Mutex<Vec<NewEvent>>,
    fail_with: Option<AdapterError>,
}

impl RecordingCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: AdapterError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::default()
        }
    }

    pub fn created(&self) -> Vec<NewEvent> {
        self.created
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl CalendarAdapter for RecordingCalendar {
    fn provider(&self) -> &str {
        "memory-calendar"
    }

    async fn create_event(&self, event: &NewEvent) -> Result<CreatedEvent, AdapterError> {
        if let Some(e) = &self.fail_with {
            return Err(e.clone());
        }
        let (start, end) = event_window(self.provider(), event)?;
        let mut created = self.created.lock().unwrap_or_else(|e| e.into_inner());
        created.push(event.clone());
        let id = format!("evt-{}", created.len());
        debug!("Recorded event {} ({})", id, event.summary);
        Ok(CreatedEvent {
            event_link: format!("memory://calendar/{}", id),
            event_id: id,
            start,
            end,
        })
    }
}

/// Ledger answering from a verb → response table; unknown verbs report
/// `no_data`
#[derive(Debug, Default)]
pub struct StaticLedger {
    responses: HashMap<String, Value>,
    queries: Mutex<Vec<LedgerQuery>>,
}

impl StaticLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, verb: &str, response: Value) -> Self {
        self.responses.insert(verb.to_string(), response);
        self
    }

    pub fn queries(&self) -> Vec<LedgerQuery> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl LedgerAdapter for StaticLedger {
    fn provider(&self) -> &str {
        "memory-ledger"
    }

    async fn query(&self, query: &LedgerQuery) -> Result<Value, AdapterError> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(query.clone());
        Ok(self.responses.get(query.verb()).cloned().unwrap_or_else(|| {
            serde_json::json!({
                "status": "no_data",
                "message": format!("no recorded response for {}", query.verb()),
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, subject: &str) -> MessageSummary {
        MessageSummary {
            id: id.into(),
            thread_id: id.into(),
            subject: subject.into(),
            from: "ops@x.com".into(),
            date: "Tue, 5 Aug 2025 10:00:00 +0000".into(),
            snippet: String::new(),
        }
    }

    #[tokio::test]
    async fn test_inbox_filter_and_limit() {
        let mail = RecordingMail::new().with_inbox(vec![
            summary("1", "Invoice overdue"),
            summary("2", "Lunch"),
            summary("3", "Second invoice"),
        ]);
        let found = mail.list(Some("invoice"), 10).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(mail.list(None, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_calendar_records_nothing() {
        let calendar = RecordingCalendar::failing(AdapterError::new("calendar", "forbidden", "nope"));
        let event = NewEvent {
            summary: "x".into(),
            start_time: "2025-08-06T14:00:00".into(),
            duration_minutes: 30,
            attendees: vec![],
            description: None,
            location: None,
        };
        assert!(calendar.create_event(&event).await.is_err());
        assert!(calendar.created().is_empty());
    }

    #[tokio::test]
    async fn test_offset_start_keeps_offset() {
        let calendar = RecordingCalendar::new();
        let event = NewEvent {
            summary: "x".into(),
            start_time: "2025-08-06T14:00:00+05:30".into(),
            duration_minutes: 90,
            attendees: vec![],
            description: None,
            location: None,
        };
        let created = calendar.create_event(&event).await.unwrap();
        assert_eq!(created.end, "2025-08-06T15:30:00+05:30");
    }

    #[tokio::test]
    async fn test_static_ledger_defaults_to_no_data() {
        let ledger = StaticLedger::new();
        let out = ledger
            .query(&LedgerQuery::TopItems { limit: 3, by_value: false })
            .await
            .unwrap();
        assert_eq!(out["status"], "no_data");
    }
}
