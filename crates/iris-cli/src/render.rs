//! Plain-text rendering for the terminal.

use std::fmt::Write;

use iris_core::backend::HistoryRecord;
use iris_core::report::Report;
use iris_core::session::{Insights, Message, Role, Session};
use iris_core::ParsedResponse;

pub fn message(index: usize, message: &Message) -> String {
    let mut out = String::new();
    let who = match message.role {
        Role::User => "you",
        Role::Assistant => "iris",
    };
    let time = message.timestamp.as_deref().unwrap_or("");
    let _ = writeln!(out, "[{}] {} {}", index, who, time);

    if message.image.is_some() {
        out.push_str("  (image)\n");
    }

    match message.response() {
        Some(parsed) if message.role == Role::Assistant => out.push_str(&parsed_response(&parsed)),
        _ => {
            let _ = writeln!(out, "  {}", message.content);
        }
    }

    if !message.suggestions.is_empty() {
        out.push_str("  Suggestions:\n");
        for suggestion in &message.suggestions {
            let _ = writeln!(out, "    - {}", suggestion);
        }
    }
    out
}

pub fn parsed_response(parsed: &ParsedResponse) -> String {
    let mut out = String::new();
    match parsed {
        ParsedResponse::Blocks { blocks } => {
            for (i, block) in blocks.iter().enumerate() {
                let _ = writeln!(out, "  #{} {}", i, block.title);
                for line in block.content.lines() {
                    let _ = writeln!(out, "     {}", line);
                }
            }
        }
        ParsedResponse::Fallback { full_text, .. } => {
            for line in full_text.lines() {
                let _ = writeln!(out, "  {}", line);
            }
        }
    }
    out
}

pub fn session(session: &Session) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Session {} | mode: {}{}",
        session.session_id.as_deref().unwrap_or("(new)"),
        session.mode,
        if session.image_preview.is_some() { " | image attached" } else { "" }
    );
    for (i, m) in session.messages.iter().enumerate() {
        out.push_str(&message(i, m));
    }
    out.push_str(&insights(&session.insights));
    out
}

pub fn insights(insights: &Insights) -> String {
    let mut out = String::new();
    if let Some(summary) = &insights.visual_summary {
        let _ = writeln!(out, "Visual summary: {}", summary);
    }
    if let Some(risk) = &insights.risk_assessment {
        let _ = writeln!(out, "Risk assessment: {}", risk);
    }
    if !insights.detected_objects.is_empty() {
        let objects: Vec<String> = insights
            .detected_objects
            .iter()
            .map(|(label, confidence)| format!("{} ({:.0}%)", label, confidence * 100.0))
            .collect();
        let _ = writeln!(out, "Detected: {}", objects.join(", "));
    }
    if let (Some(score), Some(count)) = (insights.complexity_score, insights.object_count) {
        let _ = writeln!(out, "Complexity {:.2}, {} objects", score, count);
    }
    out
}

pub fn report(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Summary\n  {}", report.summary);
    let _ = writeln!(out, "Key metrics\n  {}", report.key_metrics);
    if !report.highlights.is_empty() {
        out.push_str("Highlights\n");
        for h in &report.highlights {
            let _ = writeln!(out, "  * {}", h);
        }
    }
    if !report.suggestions.is_empty() {
        out.push_str("Follow-ups\n");
        for s in &report.suggestions {
            let _ = writeln!(out, "  - {}", s);
        }
    }
    out
}

pub fn history(records: &[HistoryRecord]) -> String {
    if records.is_empty() {
        return "No stored sessions.\n".to_string();
    }
    let mut out = String::new();
    for record in records {
        let first_question = record
            .messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");
        let _ = writeln!(
            out,
            "{}  {}  {} messages  {}",
            record.id,
            record.last_updated.as_deref().unwrap_or("-"),
            record.messages.len(),
            first_question
        );
    }
    out
}
