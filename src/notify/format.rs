//! Rendering of notification intents into chat messages.
//!
//! Each message carries a plain-text line (used for the log channel and
//! as the chat fallback) and a Slack-compatible `chat.postMessage` body
//! with blocks and a colour attachment.

use core::time::Duration;

use serde_json::{Value, json};

use crate::alerts::Zone;
use crate::app::events::{Intent, StatusChange};
use crate::status::StrikeEvent;

/// Attachment colour, icon and headline for one kind of message.
struct Style {
    color: &'static str,
    emoji: &'static str,
    urgency: &'static str,
}

const CRITICAL: Style = Style {
    color: "#ff0000",
    emoji: ":rotating_light:",
    urgency: "CRITICAL",
};

const WARNING: Style = Style {
    color: "#ff9900",
    emoji: ":warning:",
    urgency: "WARNING",
};

const ALL_CLEAR: Style = Style {
    color: "#00ff00",
    emoji: ":white_check_mark:",
    urgency: "ALL CLEAR",
};

const INFO: Style = Style {
    color: "#ffcc00",
    emoji: ":zap:",
    urgency: "INFO",
};

/// A rendered message, ready for a [`NotificationChannel`].
///
/// [`NotificationChannel`]: crate::app::ports::NotificationChannel
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub text: String,
    pub payload: Value,
    pub zone: Option<Zone>,
}

pub fn render(intent: &Intent, channel: &str) -> OutboundMessage {
    match intent {
        Intent::AlertStart { zone, strike } => alert_start(*zone, strike, channel),
        Intent::AllClear { zone, quiet_for, .. } => all_clear(*zone, *quiet_for, channel),
        Intent::Status { change, .. } => status(change, channel),
    }
}

fn alert_start(zone: Zone, strike: &StrikeEvent, channel: &str) -> OutboundMessage {
    let style = match zone {
        Zone::Critical => &CRITICAL,
        Zone::Warning => &WARNING,
    };
    let test = if strike.synthetic { "TEST " } else { "" };
    let text = match zone {
        Zone::Critical => format!(
            "{test}CRITICAL: Lightning strike detected! Distance: {}",
            strike.distance
        ),
        Zone::Warning => format!("{test}WARNING: Lightning detected. Distance: {}", strike.distance),
    };
    let context = match zone {
        Zone::Critical => ":exclamation: *Very close strike. Take shelter.*",
        Zone::Warning => ":cloud_with_lightning: *Activity in the area. Be prepared.*",
    };
    let blocks = json!([
        section(&format!(
            "{e} *{u} LIGHTNING ALERT* {e}\n{text}",
            e = style.emoji,
            u = style.urgency
        )),
        {
            "type": "section",
            "fields": [
                mrkdwn(&format!("*Distance:*\n{}", strike.distance)),
                mrkdwn(&format!("*Energy Level:*\n{}", group_thousands(strike.energy))),
                mrkdwn(&format!("*Alert Level:*\n{}", style.urgency)),
                mrkdwn(&format!("*Time:*\n{}", strike.timestamp.wall().format("%H:%M:%S"))),
            ]
        },
        { "type": "context", "elements": [mrkdwn(context)] }
    ]);
    OutboundMessage {
        payload: payload(channel, &text, blocks, style, true),
        text,
        zone: Some(zone),
    }
}

fn all_clear(zone: Zone, quiet_for: Duration, channel: &str) -> OutboundMessage {
    let style = &ALL_CLEAR;
    let text = format!("ALL CLEAR: {} zone is quiet", zone.label());
    let blocks = json!([
        section(&format!("{} *{}*\n{text}", style.emoji, style.urgency)),
        {
            "type": "context",
            "elements": [mrkdwn(&format!(
                ":information_source: No strikes in {} zone for {}.",
                zone.label().to_lowercase(),
                quiet_period(quiet_for)
            ))]
        }
    ]);
    OutboundMessage {
        payload: payload(channel, &text, blocks, style, true),
        text,
        zone: Some(zone),
    }
}

fn status(change: &StatusChange, channel: &str) -> OutboundMessage {
    let style = &INFO;
    let text = match change {
        StatusChange::MonitoringStarted => "Lightning monitoring started".to_string(),
        StatusChange::MonitoringStopped => "Lightning monitoring stopped".to_string(),
        StatusChange::SensorFaulted { failures, fault } => {
            format!("Sensor faulted after {failures} consecutive failures ({fault}), still retrying")
        }
        StatusChange::SensorRecovered => "Sensor recovered, monitoring resumed".to_string(),
        StatusChange::AlertsReset => "Alerts and noise handling reset by operator".to_string(),
        StatusChange::TestNotification => {
            format!("Test message from stormwatch v{}", env!("CARGO_PKG_VERSION"))
        }
    };
    let blocks = json!([section(&format!("{} {text}", style.emoji))]);
    OutboundMessage {
        payload: payload(channel, &text, blocks, style, false),
        text,
        zone: None,
    }
}

fn payload(channel: &str, text: &str, blocks: Value, style: &Style, attach: bool) -> Value {
    let mut body = json!({
        "channel": channel,
        "text": text,
        "blocks": blocks,
        "icon_emoji": style.emoji,
    });
    if attach {
        body["attachments"] = json!([{ "color": style.color, "fallback": text }]);
    }
    body
}

fn section(text: &str) -> Value {
    json!({ "type": "section", "text": mrkdwn(text) })
}

fn mrkdwn(text: &str) -> Value {
    json!({ "type": "mrkdwn", "text": text })
}

fn quiet_period(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        format!("{} min", secs / 60)
    } else {
        format!("{secs} s")
    }
}

/// `1234567` → `"1,234,567"`.
fn group_thousands(n: u32) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
