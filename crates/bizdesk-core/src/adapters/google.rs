//! Google Gmail and Calendar adapters
//!
//! Both talk to the REST APIs with an opaque bearer token. Obtaining and
//! refreshing that token is the caller's business.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{
    CalendarAdapter, CreatedEvent, MailAdapter, MessageSummary, NewEvent, OutgoingMail, SentMail,
    event_window,
};
use crate::error::AdapterError;

const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1/";
const CALENDAR_BASE: &str = "https://www.googleapis.com/calendar/v3/";

fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")
}

/// Append path segments to a base URL, escaping each one
fn endpoint(provider: &str, base: &Url, segments: &[&str]) -> Result<Url, AdapterError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| AdapterError::new(provider, "bad_request", "base URL cannot take a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Map an HTTP failure to an adapter error, preferring Google's own message
async fn http_error(provider: &str, response: Response) -> AdapterError {
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    error_from_body(provider, status.as_u16(), &text)
}

fn error_from_body(provider: &str, status: u16, body: &str) -> AdapterError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    let code = match status {
        400 => "bad_request",
        401 => "unauthorized",
        403 => "forbidden",
        404 => "not_found",
        429 => "rate_limited",
        500..=599 => "unavailable",
        _ => "http_error",
    };
    AdapterError::new(provider, code, message).with_status(status)
}

fn transport_error(provider: &str, e: reqwest::Error) -> AdapterError {
    if e.is_timeout() {
        AdapterError::new(provider, "timeout", e.to_string())
    } else {
        AdapterError::new(provider, "transport", e.to_string())
    }
}

/// Gmail REST v1
pub struct GmailAdapter {
    client: Client,
    base: Url,
    access_token: String,
    user_id: String,
    from_name: Option<String>,
}

impl std::fmt::Debug for GmailAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GmailAdapter")
            .field("user_id", &self.user_id)
            .field("from_name", &self.from_name)
            .finish()
    }
}

impl GmailAdapter {
    /// `user_id` is `me` or the delegated mailbox address
    pub fn new(access_token: String, user_id: String, from_name: Option<String>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base: Url::parse(GMAIL_BASE).context("Invalid Gmail base URL")?,
            access_token,
            user_id,
            from_name,
        })
    }

    pub fn with_base_url(mut self, base: &str) -> Result<Self> {
        self.base = Url::parse(base).with_context(|| format!("Invalid base URL: {}", base))?;
        Ok(self)
    }

    /// RFC 822 message, base64url encoded as the `raw` field expects
    fn raw_message(&self, mail: &OutgoingMail) -> String {
        let mut headers = Vec::new();
        let from_name = mail.from_name.as_ref().or(self.from_name.as_ref());
        if let Some(name) = from_name.filter(|_| self.user_id.contains('@')) {
            headers.push(format!("From: {} <{}>", encode_header(name), self.user_id));
        }
        headers.push(format!("To: {}", header_value(&mail.to)));
        if !mail.cc.is_empty() {
            headers.push(format!("Cc: {}", address_list(&mail.cc)));
        }
        if !mail.bcc.is_empty() {
            headers.push(format!("Bcc: {}", address_list(&mail.bcc)));
        }
        headers.push(format!("Subject: {}", encode_header(&mail.subject)));
        headers.push("MIME-Version: 1.0".to_string());

        let body = match &mail.html_body {
            Some(html) => {
                let boundary = format!("bizdesk-{}", uuid::Uuid::new_v4().simple());
                headers.push(format!(
                    "Content-Type: multipart/alternative; boundary=\"{}\"",
                    boundary
                ));
                format!(
                    "--{b}\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{}\r\n\
                     --{b}\r\nContent-Type: text/html; charset=\"UTF-8\"\r\n\r\n{}\r\n--{b}--\r\n",
                    mail.body,
                    html,
                    b = boundary
                )
            }
            None => {
                headers.push("Content-Type: text/plain; charset=\"UTF-8\"".to_string());
                mail.body.clone()
            }
        };

        let message = format!("{}\r\n\r\n{}", headers.join("\r\n"), body);
        URL_SAFE.encode(message.as_bytes())
    }

    async fn fetch_summary(&self, id: &str) -> Result<MessageSummary, AdapterError> {
        let mut url = endpoint("gmail", &self.base, &["users", &self.user_id, "messages", id])?;
        url.query_pairs_mut()
            .append_pair("format", "metadata")
            .append_pair("metadataHeaders", "Subject")
            .append_pair("metadataHeaders", "From")
            .append_pair("metadataHeaders", "Date");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| transport_error("gmail", e))?;
        if !response.status().is_success() {
            return Err(http_error("gmail", response).await);
        }
        let message: GmailMessage = response
            .json()
            .await
            .map_err(|e| AdapterError::new("gmail", "bad_response", e.to_string()))?;
        Ok(message.into_summary())
    }
}

/// Header value on a single line; control characters become spaces
fn header_value(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

fn address_list(addresses: &[String]) -> String {
    addresses
        .iter()
        .map(|a| header_value(a))
        .filter(|a| !a.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// RFC 2047 encoded-word for non-ASCII header values
fn encode_header(value: &str) -> String {
    let value = header_value(value);
    if value.is_ascii() {
        value
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

#[async_trait]
impl MailAdapter for GmailAdapter {
    fn provider(&self) -> &str {
        "gmail"
    }

    async fn send(&self, mail: &OutgoingMail) -> Result<SentMail, AdapterError> {
        let url = endpoint("gmail", &self.base, &["users", &self.user_id, "messages", "send"])?;
        debug!("Gmail send to {}", mail.to);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "raw": self.raw_message(mail) }))
            .send()
            .await
            .map_err(|e| transport_error("gmail", e))?;
        if !response.status().is_success() {
            return Err(http_error("gmail", response).await);
        }

        let sent: GmailSendResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::new("gmail", "bad_response", e.to_string()))?;
        Ok(SentMail {
            message_id: sent.id,
            thread_id: sent.thread_id,
        })
    }

    async fn list(
        &self,
        query: Option<&str>,
        max_results: u32,
    ) -> Result<Vec<MessageSummary>, AdapterError> {
        let mut url = endpoint("gmail", &self.base, &["users", &self.user_id, "messages"])?;
        url.query_pairs_mut()
            .append_pair("maxResults", &max_results.to_string());
        if let Some(q) = query {
            url.query_pairs_mut().append_pair("q", q);
        }
        debug!("Gmail list: query={:?}, max={}", query, max_results);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| transport_error("gmail", e))?;
        if !response.status().is_success() {
            return Err(http_error("gmail", response).await);
        }
        let listing: GmailListResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::new("gmail", "bad_response", e.to_string()))?;

        let mut summaries = Vec::with_capacity(listing.messages.len());
        for entry in &listing.messages {
            summaries.push(self.fetch_summary(&entry.id).await?);
        }
        Ok(summaries)
    }
}

/// Google Calendar v3
pub struct GoogleCalendarAdapter {
    client: Client,
    base: Url,
    access_token: String,
    calendar_id: String,
    timezone: String,
}

impl std::fmt::Debug for GoogleCalendarAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleCalendarAdapter")
            .field("calendar_id", &self.calendar_id)
            .field("timezone", &self.timezone)
            .finish()
    }
}

impl GoogleCalendarAdapter {
    pub fn new(access_token: String, calendar_id: String, timezone: String) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base: Url::parse(CALENDAR_BASE).context("Invalid Calendar base URL")?,
            access_token,
            calendar_id,
            timezone,
        })
    }

    pub fn with_base_url(mut self, base: &str) -> Result<Self> {
        self.base = Url::parse(base).with_context(|| format!("Invalid base URL: {}", base))?;
        Ok(self)
    }

    fn event_body(&self, event: &NewEvent) -> Result<Value, AdapterError> {
        let (start, end) = event_window("calendar", event)?;
        let mut body = serde_json::json!({
            "summary": event.summary,
            "start": {"dateTime": start, "timeZone": self.timezone},
            "end": {"dateTime": end, "timeZone": self.timezone},
        });
        if let Some(description) = &event.description {
            body["description"] = Value::String(description.clone());
        }
        if let Some(location) = &event.location {
            body["location"] = Value::String(location.clone());
        }
        if !event.attendees.is_empty() {
            body["attendees"] = event
                .attendees
                .iter()
                .map(|email| serde_json::json!({ "email": email }))
                .collect();
        }
        Ok(body)
    }
}

#[async_trait]
impl CalendarAdapter for GoogleCalendarAdapter {
    fn provider(&self) -> &str {
        "calendar"
    }

    async fn create_event(&self, event: &NewEvent) -> Result<CreatedEvent, AdapterError> {
        let body = self.event_body(event)?;
        let url = endpoint("calendar", &self.base, &["calendars", &self.calendar_id, "events"])?;
        debug!("Calendar insert: {} at {}", event.summary, event.start_time);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("calendar", e))?;
        if !response.status().is_success() {
            return Err(http_error("calendar", response).await);
        }

        let created: CalendarEvent = response
            .json()
            .await
            .map_err(|e| AdapterError::new("calendar", "bad_response", e.to_string()))?;
        Ok(CreatedEvent {
            event_id: created.id,
            event_link: created.html_link,
            start: created.start.date_time,
            end: created.end.date_time,
        })
    }
}

// ── wire types ──

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailSendResponse {
    id: String,
    #[serde(default)]
    thread_id: String,
}

#[derive(Debug, Deserialize)]
struct GmailListResponse {
    #[serde(default)]
    messages: Vec<GmailListEntry>,
}

#[derive(Debug, Deserialize)]
struct GmailListEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    id: String,
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    payload: GmailPayload,
}

#[derive(Debug, Default, Deserialize)]
struct GmailPayload {
    #[serde(default)]
    headers: Vec<GmailHeader>,
}

#[derive(Debug, Deserialize)]
struct GmailHeader {
    name: String,
    value: String,
}

impl GmailMessage {
    fn into_summary(self) -> MessageSummary {
        let header = |name: &str| {
            self.payload
                .headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| h.value.clone())
                .unwrap_or_default()
        };
        MessageSummary {
            subject: header("Subject"),
            from: header("From"),
            date: header("Date"),
            id: self.id.clone(),
            thread_id: self.thread_id.clone(),
            snippet: self.snippet.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarEvent {
    id: String,
    #[serde(default)]
    html_link: String,
    start: CalendarTime,
    end: CalendarTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarTime {
    #[serde(default)]
    date_time: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail() -> OutgoingMail {
        OutgoingMail {
            to: "jane@x.com".into(),
            subject: "Meeting Invitation: Sync".into(),
            body: "See you there".into(),
            cc: vec!["bob@y.org".into()],
            bcc: Vec::new(),
            html_body: None,
            from_name: None,
        }
    }

    fn decode(raw: &str) -> String {
        String::from_utf8(URL_SAFE.decode(raw).unwrap()).unwrap()
    }

    #[test]
    fn test_raw_message_headers() {
        let gmail = GmailAdapter::new("token".into(), "ops@corp.in".into(), Some("Ops Desk".into())).unwrap();
        let text = decode(&gmail.raw_message(&mail()));
        assert!(text.starts_with("From: Ops Desk <ops@corp.in>\r\nTo: jane@x.com\r\nCc: bob@y.org\r\n"));
        assert!(text.contains("Subject: Meeting Invitation: Sync\r\n"));
        assert!(text.ends_with("\r\n\r\nSee you there"));
        assert!(!text.contains("Bcc"));
    }

    #[test]
    fn test_raw_message_keeps_headers_on_one_line() {
        let gmail = GmailAdapter::new("token".into(), "ops@corp.in".into(), None).unwrap();
        let mut m = mail();
        m.subject = "Meeting Invitation: Sync\r\nBcc: x@evil.com".into();
        m.to = "jane@x.com\nBcc: y@evil.com".into();
        m.cc = vec!["bob@y.org".into(), "amy@z.net".into()];
        let text = decode(&gmail.raw_message(&m));
        let (head, _) = text.split_once("\r\n\r\n").unwrap();

        assert!(!head.lines().any(|l| l.starts_with("Bcc")));
        assert!(head.contains("Subject: Meeting Invitation: Sync  Bcc: x@evil.com\r\n"));
        assert!(head.contains("To: jane@x.com Bcc: y@evil.com\r\n"));
        assert!(head.contains("Cc: bob@y.org, amy@z.net\r\n"));
    }

    #[test]
    fn test_raw_message_without_mailbox_address_has_no_from() {
        let gmail = GmailAdapter::new("token".into(), "me".into(), Some("Ops".into())).unwrap();
        let text = decode(&gmail.raw_message(&mail()));
        assert!(text.starts_with("To: jane@x.com"));
    }

    #[test]
    fn test_raw_message_html_alternative() {
        let gmail = GmailAdapter::new("token".into(), "me".into(), None).unwrap();
        let mut m = mail();
        m.html_body = Some("<p>See you there</p>".into());
        let text = decode(&gmail.raw_message(&m));
        assert!(text.contains("multipart/alternative"));
        assert!(text.contains("text/html"));
        assert!(text.contains("<p>See you there</p>"));
    }

    #[test]
    fn test_encode_header() {
        assert_eq!(encode_header("Plain"), "Plain");
        assert!(encode_header("Réunion").starts_with("=?UTF-8?B?"));
    }

    #[test]
    fn test_endpoint_escapes_segments() {
        let base = Url::parse(CALENDAR_BASE).unwrap();
        let url = endpoint("calendar", &base, &["calendars", "team@corp.in", "events"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/team@corp.in/events"
        );
        let url = endpoint("calendar", &base, &["calendars", "a/b", "events"]).unwrap();
        assert!(url.as_str().contains("a%2Fb"));
    }

    #[test]
    fn test_event_body() {
        let cal = GoogleCalendarAdapter::new("t".into(), "primary".into(), "Asia/Kolkata".into()).unwrap();
        let body = cal
            .event_body(&NewEvent {
                summary: "Sync".into(),
                start_time: "2025-08-06T14:00:00".into(),
                duration_minutes: 45,
                attendees: vec!["jane@x.com".into()],
                description: Some("Agenda".into()),
                location: None,
            })
            .unwrap();
        assert_eq!(body["end"]["dateTime"], "2025-08-06T14:45:00");
        assert_eq!(body["start"]["timeZone"], "Asia/Kolkata");
        assert_eq!(body["attendees"][0]["email"], "jane@x.com");
        assert!(body.get("location").is_none());
    }

    #[test]
    fn test_error_from_body() {
        let err = error_from_body(
            "gmail",
            403,
            r#"{"error": {"code": 403, "message": "Insufficient Permission"}}"#,
        );
        assert_eq!(err.code, "forbidden");
        assert_eq!(err.status, Some(403));
        assert_eq!(err.message, "Insufficient Permission");

        let err = error_from_body("calendar", 503, "upstream down");
        assert_eq!(err.code, "unavailable");
        assert_eq!(err.message, "upstream down");
    }

    #[test]
    fn test_debug_hides_token() {
        let gmail = GmailAdapter::new("secret-token".into(), "me".into(), None).unwrap();
        let debug = format!("{:?}", gmail);
        assert!(!debug.contains("secret-token"));
        let cal = GoogleCalendarAdapter::new("secret-token".into(), "primary".into(), "UTC".into()).unwrap();
        assert!(!format!("{:?}", cal).contains("secret-token"));
    }

    #[test]
    fn test_message_summary_headers() {
        let msg: GmailMessage = serde_json::from_value(serde_json::json!({
            "id": "m1",
            "threadId": "t1",
            "snippet": "hello",
            "payload": {"headers": [
                {"name": "subject", "value": "Q3"},
                {"name": "From", "value": "ceo@corp.in"}
            ]}
        }))
        .unwrap();
        let summary = msg.into_summary();
        assert_eq!(summary.subject, "Q3");
        assert_eq!(summary.from, "ceo@corp.in");
        assert_eq!(summary.date, "");
    }
}
