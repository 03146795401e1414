// SPDX-License-Identifier: MIT

//! Card rendering for record representations.
//!
//! The renderer turns a record into transport-neutral card content; the
//! messaging adapter decides how that content appears on the platform.

use crate::id::ProfileId;
use crate::reason::ReasonTag;
use crate::record::{Record, Visibility, DAY_FORMAT};
use chrono::NaiveDate;

/// Card colors by severity tier (amber, orange, red)
pub const SEVERITY_COLORS: [u32; 3] = [0xffbe3f, 0xff7f3f, 0xff3f3f];

/// How many prior names a card shows
const NAME_HISTORY_WINDOW: usize = 5;

/// A labelled card field
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Transport-neutral rendered representation content
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardContent {
    pub title: String,
    pub subtitle: String,
    pub url: String,
    pub thumbnail: String,
    pub color: u32,
    pub author_line: String,
    pub fields: Vec<CardField>,
    pub footer: String,
}

/// Renders a record into card content
pub trait Renderer: Send + Sync + 'static {
    fn render(
        &self,
        profile: &ProfileId,
        record: &Record,
        visibility: Visibility,
        serial: u64,
        today: NaiveDate,
    ) -> CardContent;
}

/// The standard card layout
#[derive(Clone, Copy, Debug, Default)]
pub struct CardRenderer;

impl Renderer for CardRenderer {
    fn render(
        &self,
        profile: &ProfileId,
        record: &Record,
        visibility: Visibility,
        serial: u64,
        today: NaiveDate,
    ) -> CardContent {
        let mut severity = 0;
        let mut reasons = Vec::new();
        for tag in ReasonTag::CATALOG {
            if record.reasons.contains(&tag) {
                severity = severity.max(tag.severity());
                if reasons.is_empty() {
                    reasons.push(tag.label().to_string());
                } else {
                    reasons.push(tag.label().to_lowercase());
                }
            }
        }

        let mut fields = vec![CardField {
            name: "Last names".to_string(),
            value: name_history(&record.old_names),
            inline: false,
        }];

        let last = record.last_date.unwrap_or(record.date);
        let mut span = record.date.format(DAY_FORMAT).to_string();
        if last != record.date {
            span.push_str(&format!("->{}", last.format(DAY_FORMAT)));
        }
        fields.push(CardField {
            name: format!(
                "{} encounter{} {}",
                record.encounters,
                if record.encounters == 1 { "" } else { "s" },
                latency(today, last)
            ),
            value: span,
            inline: visibility.is_private(),
        });

        if visibility.is_private() {
            fields.push(CardField {
                name: "Initiator".to_string(),
                value: escape_markdown(&record.initiator),
                inline: true,
            });
        }

        CardContent {
            title: escape_markdown(&record.name),
            subtitle: escape_markdown(record.url.trim_start_matches("https://")),
            url: record.url.clone(),
            thumbnail: record.avatar.clone(),
            color: SEVERITY_COLORS[severity as usize],
            author_line: reasons[..reasons.len().min(3)].join(", "),
            fields,
            footer: format!("{} - {}", serial, profile),
        }
    }
}

/// Prior names, newest first, excluding the current one
fn name_history(old_names: &[String]) -> String {
    let prior = &old_names[..old_names.len().saturating_sub(1)];
    let shown: Vec<String> = prior
        .iter()
        .rev()
        .take(NAME_HISTORY_WINDOW)
        .map(|name| format!("`{}`", name.replace('`', "'")))
        .collect();
    if shown.is_empty() {
        "**-**".to_string()
    } else {
        shown.join("\n")
    }
}

fn latency(today: NaiveDate, last: NaiveDate) -> String {
    let days = (today - last).num_days().max(0);
    match days {
        0 => "(today)".to_string(),
        1 => "(1 day ago)".to_string(),
        n => format!("({} days ago)", n),
    }
}

/// Characters escaped in user-controlled text before it reaches a card
pub const ESCAPED_CHARACTERS: &str = r"\*-_~`>#.[](){}+!?%|&$;";

/// Escape markdown-sensitive characters in user-controlled text
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if ESCAPED_CHARACTERS.contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
