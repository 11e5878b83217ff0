//! Planners that expand a capability invocation into a composite action

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;

use crate::capability::{Binding, Capability, CompositeKind};
use crate::catalog::{CREATE_EVENT, SEND_MAIL};
use crate::error::{CoreError, CoreResult};
use crate::extract::DATETIME_FORMAT;
use crate::orchestrator::{CompositeAction, CompositeStep, escape_template};
use crate::types::Arguments;

/// Step id of the calendar write in a meeting invitation
pub const CREATE_EVENT_STEP: &str = "create_event";

/// Build the plan for a validated capability invocation
pub fn plan(capability: &Capability, arguments: &Arguments) -> CoreResult<CompositeAction> {
    match &capability.binding {
        Binding::Adapter { .. } => Ok(CompositeAction::single(&capability.name, arguments)),
        Binding::Composite(CompositeKind::MeetingInvitation) => {
            meeting_invitation(&capability.name, arguments)
        }
    }
}

/// Calendar event first, then one invitation email per attendee.
///
/// Each email carries the event link and id produced by the calendar step,
/// so no email is sent when the event could not be created.
pub fn meeting_invitation(name: &str, arguments: &Arguments) -> CoreResult<CompositeAction> {
    let text = |key: &str| {
        arguments
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let title = text("title").unwrap_or_else(|| "Meeting".to_string());
    let start_time = text("start_time").ok_or_else(|| CoreError::MissingArgument {
        capability: name.to_string(),
        parameter: "start_time".to_string(),
    })?;
    let start = parse_start(&start_time).ok_or_else(|| CoreError::InvalidComposite {
        action: name.to_string(),
        reason: format!("unreadable start time '{}'", start_time),
    })?;
    let duration = arguments
        .get("duration_minutes")
        .and_then(Value::as_i64)
        .unwrap_or(60);
    let attendees: Vec<String> = arguments
        .get("attendees")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let agenda = text("agenda");
    let location = text("location");
    let send_invitation = arguments
        .get("send_invitation")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    let mut event = CompositeStep::new(CREATE_EVENT_STEP, CREATE_EVENT)
        .literal("summary", title.as_str())
        .literal("start_time", start_time.as_str())
        .literal("duration_minutes", duration);
    if !attendees.is_empty() {
        event = event.literal("attendees", attendees.clone());
    }
    if let Some(agenda) = &agenda {
        event = event.literal("description", agenda.as_str());
    }
    if let Some(location) = &location {
        event = event.literal("location", location.as_str());
    }

    let mut action = CompositeAction::new(name).with_step(event);
    if !send_invitation {
        return Ok(action);
    }

    let body = invitation_body(&title, start, duration, location.as_deref(), agenda.as_deref());
    let subject = format!("Meeting Invitation: {}", title);
    for (i, attendee) in attendees.iter().enumerate() {
        action = action.with_step(
            CompositeStep::new(format!("send_invitation_{}", i + 1), SEND_MAIL)
                .literal("to", attendee.as_str())
                .literal("subject", subject.as_str())
                .template("body", body.as_str()),
        );
    }
    Ok(action)
}

fn parse_start(s: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.naive_local())
        .or_else(|_| NaiveDateTime::parse_from_str(s, DATETIME_FORMAT))
        .ok()
}

/// Email body with placeholders for the calendar step's outputs.
///
/// User text is escaped so only the link and id lines are placeholders.
fn invitation_body(
    title: &str,
    start: NaiveDateTime,
    duration: i64,
    location: Option<&str>,
    agenda: Option<&str>,
) -> String {
    let mut body = format!(
        "You're invited to a meeting:\n\n\
         Title: {}\n\
         Date & Time: {}\n\
         Duration: {} minutes\n\
         Location: {}\n\n",
        escape_template(title),
        start.format("%B %d, %Y at %I:%M %p"),
        duration,
        escape_template(location.unwrap_or("To be determined")),
    );
    if let Some(agenda) = agenda {
        body.push_str(&format!("Agenda: {}\n\n", escape_template(agenda)));
    }
    body.push_str(&format!(
        "Calendar Link: {{{step}.event_link}}\n\
         Event ID: {{{step}.event_id}}\n\n\
         Please confirm your attendance.\n\n\
         Best regards,\n\
         Business Assistant\n",
        step = CREATE_EVENT_STEP
    ));
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::orchestrator::StepInput;

    fn args(pairs: &[(&str, Value)]) -> Arguments {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_event_then_one_mail_per_attendee() {
        let arguments = args(&[
            ("title", Value::from("Q3 review")),
            ("start_time", Value::from("2025-08-06T14:00:00")),
            ("attendees", serde_json::json!(["jane@x.com", "bob@y.org"])),
            ("location", Value::from("Room 4")),
        ]);
        let action = meeting_invitation("create_meeting_invitation", &arguments).unwrap();

        let ids: Vec<&str> = action.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["create_event", "send_invitation_1", "send_invitation_2"]);
        assert_eq!(action.steps[0].capability, catalog::CREATE_EVENT);
        assert_eq!(action.steps[1].capability, catalog::SEND_MAIL);
        assert_eq!(action.steps[1].dependencies(), vec!["create_event"]);

        let body = action.steps[2]
            .inputs
            .iter()
            .find_map(|(name, input)| match (name.as_str(), input) {
                ("body", StepInput::Template(t)) => Some(t.clone()),
                _ => None,
            })
            .unwrap();
        assert!(body.contains("Date & Time: August 06, 2025 at 02:00 PM"));
        assert!(body.contains("Location: Room 4"));
        assert!(body.contains("{create_event.event_link}"));
        assert!(!body.contains("Agenda"));
    }

    #[test]
    fn test_defaults_and_no_invitation() {
        let arguments = args(&[
            ("start_time", Value::from("2025-08-06T09:30:00+05:30")),
            ("attendees", serde_json::json!(["jane@x.com"])),
            ("send_invitation", Value::Bool(false)),
        ]);
        let action = meeting_invitation("invite", &arguments).unwrap();
        assert_eq!(action.steps.len(), 1);
        let summary = action.steps[0]
            .inputs
            .iter()
            .find(|(name, _)| name == "summary")
            .map(|(_, input)| input.clone());
        assert_eq!(summary, Some(StepInput::Literal(Value::from("Meeting"))));
    }

    #[test]
    fn test_location_placeholder_and_agenda() {
        let start = NaiveDateTime::parse_from_str("2025-01-02T17:05:00", DATETIME_FORMAT).unwrap();
        let body = invitation_body("Sync", start, 30, None, Some("Budget"));
        assert!(body.contains("Location: To be determined"));
        assert!(body.contains("Agenda: Budget"));
        assert!(body.contains("January 02, 2025 at 05:05 PM"));
        assert!(body.ends_with("Business Assistant\n"));
    }

    #[test]
    fn test_braces_in_user_text_stay_literal() {
        let arguments = args(&[
            ("title", Value::from("Plan {create_event.event_id}")),
            ("start_time", Value::from("2025-08-06T14:00:00")),
            ("attendees", serde_json::json!(["jane@x.com"])),
            ("agenda", Value::from("discuss {budget.q3} figures")),
        ]);
        let action = meeting_invitation("create_meeting_invitation", &arguments).unwrap();
        assert_eq!(action.steps[1].dependencies(), vec!["create_event"]);
        assert!(action.validate(&catalog::default_registry().unwrap()).is_ok());

        let body = action.steps[1]
            .inputs
            .iter()
            .find_map(|(name, input)| match (name.as_str(), input) {
                ("body", StepInput::Template(t)) => Some(t.clone()),
                _ => None,
            })
            .unwrap();
        assert!(body.contains("Agenda: discuss {{budget.q3}} figures"));
        assert!(body.contains("Title: Plan {{create_event.event_id}}"));
    }

    #[test]
    fn test_missing_start() {
        let err = meeting_invitation("invite", &Arguments::new()).unwrap_err();
        assert!(matches!(err, CoreError::MissingArgument { .. }));
    }
}
