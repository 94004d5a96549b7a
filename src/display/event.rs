//! Event display formatting
//!
//! Provides utilities for formatting audit events for terminal display,
//! including the event list and detail views.

use crate::audit::describe_change;
use crate::models::{Event, EventKind, Operation};

/// Format a single event for display (list row)
pub fn format_event_row(event: &Event) -> String {
    let marker = match &event.kind {
        EventKind::Model(model) => model.operation.short(),
        EventKind::Request(_) => '>',
        EventKind::Unspecified(_) => '!',
    };

    format!(
        "{} {} {:11} {}",
        marker,
        event.created_at.format("%Y-%m-%d %H:%M:%S"),
        event.kind_name(),
        event.summary()
    )
}

/// Format a list of events
pub fn format_event_list(events: &[Event]) -> String {
    if events.is_empty() {
        return "No events found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:1} {:19} {:11} {}\n",
        "", "Created", "Kind", "Summary"
    ));
    output.push_str(&"-".repeat(72));
    output.push('\n');

    for event in events {
        output.push_str(&format_event_row(event));
        output.push('\n');
    }

    output
}

/// Format event details for display
pub fn format_event_details(event: &Event) -> String {
    let mut output = String::new();

    output.push_str(&format!("Event:       {}\n", event.id));
    output.push_str(&format!(
        "Created:     {}\n",
        event.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!("Kind:        {}\n", event.kind_name()));

    match &event.kind {
        EventKind::Model(model) => {
            output.push_str(&format!(
                "User:        {}\n",
                model.user.as_deref().unwrap_or("Anonymous")
            ));
            output.push_str(&format!("Operation:   {}\n", model.operation));
            output.push_str(&format!(
                "Entity:      {} #{} ({})\n",
                model.entity.label(),
                model.entity.primary_key,
                model.entity.value
            ));

            if let Some(elapsed) = model.performance {
                output.push_str(&format!("Elapsed:     {:?}\n", elapsed));
            }

            if !model.modifications.is_empty() {
                output.push_str("\nModifications:\n");
                for modification in &model.modifications {
                    output.push_str(&format!(
                        "  {} {}\n",
                        modification.operation.short(),
                        describe_change(
                            &modification.field_name,
                            modification.previous.as_deref(),
                            modification.current.as_deref(),
                        )
                    ));
                }
            }

            if !model.relationships.is_empty() {
                output.push_str("\nRelationships:\n");
                for relationship in &model.relationships {
                    let verb = match relationship.operation {
                        Operation::Delete => "removed",
                        _ => "added",
                    };
                    output.push_str(&format!(
                        "  {} {}: {} {} #{}\n",
                        relationship.operation.short(),
                        relationship.field_name,
                        verb,
                        relationship.related.label(),
                        relationship.related.primary_key
                    ));
                }
            }
        }
        EventKind::Request(request) => {
            output.push_str(&format!(
                "User:        {}\n",
                request.user.as_deref().unwrap_or("Anonymous")
            ));
            output.push_str(&format!("Request:     {} {}\n", request.method, request.uri));
            if let Some(ref query) = request.query {
                output.push_str(&format!("Query:       {}\n", query));
            }
            output.push_str(&format!("Status:      {}\n", request.status));
            if let Some(ref application) = request.application {
                output.push_str(&format!("Application: {}\n", application));
            }
            if let Some(ref ip) = request.ip {
                output.push_str(&format!("Client:      {}\n", ip));
            }
            let payloads = [
                ("Request body", &request.request),
                ("Response body", &request.response),
            ];
            for (label, payload) in payloads {
                if let Some(payload) = payload {
                    output.push_str(&format!(
                        "{}: {} ({:?})\n  {}\n",
                        label, payload.content_type, payload.encoding, payload.content
                    ));
                }
            }
        }
        EventKind::Unspecified(log) => {
            output.push_str(&format!("Level:       {}\n", log.level));
            output.push_str(&format!("Message:     {}\n", log.message));
            if let Some(ref file) = log.file {
                match log.line {
                    Some(line) => output.push_str(&format!("Source:      {}:{}\n", file, line)),
                    None => output.push_str(&format!("Source:      {}\n", file)),
                }
            }
            if let Some(ref application) = log.application {
                output.push_str(&format!("Application: {}\n", application));
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;
    use crate::models::{RequestEvent, UnspecifiedEvent};

    fn request() -> Event {
        Event::new(EventKind::Request(RequestEvent {
            user: Some("alice".to_string()),
            method: "DELETE".to_string(),
            uri: "/orders/1".to_string(),
            query: Some("force=1".to_string()),
            status: 204,
            application: Some("shop".to_string()),
            ip: Some("10.0.0.1".to_string()),
            request: None,
            response: None,
        }))
    }

    #[test]
    fn test_format_event_row() {
        let formatted = format_event_row(&request());
        assert!(formatted.starts_with('>'));
        assert!(formatted.contains("request"));
        assert!(formatted.contains("alice performed DELETE /orders/1 (204)"));
    }

    #[test]
    fn test_format_empty_list() {
        assert!(format_event_list(&[]).contains("No events found"));
    }

    #[test]
    fn test_format_request_details() {
        let formatted = format_event_details(&request());
        assert!(formatted.contains("Query:       force=1"));
        assert!(formatted.contains("Client:      10.0.0.1"));
        assert!(formatted.contains("Status:      204"));
    }

    #[test]
    fn test_format_log_details() {
        let event = Event::new(EventKind::Unspecified(UnspecifiedEvent {
            message: "disk almost full".to_string(),
            level: LogLevel::Warn,
            file: Some("src/shop/billing.rs".to_string()),
            line: Some(12),
            application: Some("shop".to_string()),
        }));

        let formatted = format_event_details(&event);
        assert!(formatted.contains("Source:      src/shop/billing.rs:12"));
        assert!(formatted.contains("Message:     disk almost full"));
    }
}
