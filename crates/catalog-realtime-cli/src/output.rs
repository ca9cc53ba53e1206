//! Event and notice formatting

use std::io::Write;
use std::time::Duration;

use catalog_realtime::{
    ConnectionStatus, DisplaySink, NotificationEvent, NotificationPayload, SessionSnapshot,
    ToastStyle,
};
use owo_colors::OwoColorize;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::error::CliResult;

/// Writes events to stdout and status changes to stderr.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    format: OutputFormat,
    colored: bool,
}

impl Printer {
    #[must_use]
    pub fn new(format: OutputFormat, colored: bool) -> Self {
        Self { format, colored }
    }

    /// Print one notification.
    pub fn print_event(&self, event: &NotificationEvent) -> CliResult<()> {
        let line = match self.format {
            OutputFormat::Human => format_event(event, self.colored),
            OutputFormat::Json => serde_json::to_string(event)?,
        };
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}")?;
        stdout.flush()?;
        Ok(())
    }

    /// Print a session status change.
    pub fn print_status(&self, snapshot: &SessionSnapshot) -> CliResult<()> {
        let line = match self.format {
            OutputFormat::Human => format_status(snapshot, self.colored),
            OutputFormat::Json => json!({ "session": snapshot }).to_string(),
        };
        eprintln!("{line}");
        Ok(())
    }
}

/// One human-readable line for `event`.
pub fn format_event(event: &NotificationEvent, colored: bool) -> String {
    let time = event.timestamp.format("%Y-%m-%d %H:%M:%S");
    let kind = event.kind.wire_name();
    let details = event.payload.as_ref().map(format_payload);

    let mut line = if colored {
        format!("{} {} {}", time.dimmed(), kind.bright_cyan().bold(), event.message)
    } else {
        format!("{time} {kind} {}", event.message)
    };
    if let Some(details) = details {
        line.push_str(" (");
        line.push_str(&details);
        line.push(')');
    }
    line
}

fn format_payload(payload: &NotificationPayload) -> String {
    match payload {
        NotificationPayload::Artist(artist) => match &artist.name {
            Some(name) => format!("artist #{} {name}", artist.id),
            None => format!("artist #{}", artist.id),
        },
        NotificationPayload::Album(album) => {
            let mut text = format!("album #{}", album.id);
            if let Some(name) = &album.name {
                text.push(' ');
                text.push_str(name);
            }
            if let Some(artist) = &album.artist_name {
                text.push_str(" by ");
                text.push_str(artist);
            }
            text
        }
        NotificationPayload::Sync(counters) => format!(
            "total {}, created {}, updated {}",
            counters.total, counters.created, counters.updated
        ),
    }
}

/// Status indicator line: label plus tooltip, and reconnect progress.
pub fn format_status(snapshot: &SessionSnapshot, colored: bool) -> String {
    let presentation = snapshot.status.presentation();
    let label = if colored {
        match snapshot.status {
            ConnectionStatus::Connected => presentation.label.green().to_string(),
            ConnectionStatus::Connecting => presentation.label.yellow().to_string(),
            ConnectionStatus::Error => presentation.label.red().to_string(),
            ConnectionStatus::Disconnected => presentation.label.bright_black().to_string(),
        }
    } else {
        presentation.label.to_string()
    };

    let mut line = format!("[{label}] {}", presentation.title);
    if snapshot.exhausted {
        line.push_str(" (gave up)");
    } else if snapshot.attempt_count > 0 {
        line.push_str(&format!(" (attempt {})", snapshot.attempt_count));
    }
    line
}

/// One line for a toast.
pub fn format_toast(message: &str, style: ToastStyle, colored: bool) -> String {
    let tag = format!("[{style}]");
    if !colored {
        return format!("{tag} {message}");
    }
    let tag = match style {
        ToastStyle::Success => tag.green().to_string(),
        ToastStyle::Info => tag.blue().to_string(),
        ToastStyle::Warning => tag.yellow().to_string(),
        ToastStyle::Error => tag.red().bold().to_string(),
    };
    format!("{tag} {message}")
}

/// Shows toasts on stderr.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink {
    colored: bool,
}

impl ConsoleSink {
    #[must_use]
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }
}

impl DisplaySink for ConsoleSink {
    fn display(&self, message: &str, style: ToastStyle, _duration: Option<Duration>) {
        eprintln!("{}", format_toast(message, style, self.colored));
    }
}
