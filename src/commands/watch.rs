//! Long-running tracking session driven by line commands on stdin.
//!
//! Every command answers with one `ok ...` or `error: ...` line, possibly
//! followed by indented detail lines. Background results are printed as
//! `event: ...` lines as they arrive. The session ends on `quit` or EOF.

use super::parse_snapshot_id;
use crate::service::{TrackerEvent, TrackerService};
use crate::utils::formatters::format_change_short;
use crate::{TrackerContext, TrackerError, output};
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, select, unbounded};
use std::io::{self, BufRead, Write};
use std::str::FromStr;
use std::thread;

const HELP: &str = "commands: status | save [comment] | list | restore <id> | \
                    autosave [on [minutes] | off] | help | quit";

/// One line of input to a watch session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand {
    Status,
    Save(String),
    List,
    Restore(String),
    /// `autosave` with no argument shows the settings.
    Autosave(Option<AutosaveToggle>),
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveToggle {
    On(Option<u64>),
    Off,
}

impl FromStr for WatchCommand {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(word, rest)| (word, rest.trim()));

        match word {
            "status" => Ok(Self::Status),
            "save" => Ok(Self::Save(rest.to_string())),
            "list" => Ok(Self::List),
            "restore" if rest.is_empty() => Err("restore needs a snapshot id".into()),
            "restore" => Ok(Self::Restore(rest.to_string())),
            "autosave" => parse_autosave(rest).map(Self::Autosave),
            "help" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(format!("unknown command '{other}' ({HELP})")),
        }
    }
}

fn parse_autosave(args: &str) -> std::result::Result<Option<AutosaveToggle>, String> {
    let mut parts = args.split_whitespace();
    let toggle = match (parts.next(), parts.next()) {
        (None, _) => None,
        (Some("on"), None) => Some(AutosaveToggle::On(None)),
        (Some("on"), Some(minutes)) => {
            let minutes = minutes
                .parse()
                .map_err(|_| format!("'{minutes}' is not a number of minutes"))?;
            Some(AutosaveToggle::On(Some(minutes)))
        }
        (Some("off"), None) => Some(AutosaveToggle::Off),
        _ => return Err("usage: autosave [on [minutes] | off]".into()),
    };
    if parts.next().is_some() {
        return Err("usage: autosave [on [minutes] | off]".into());
    }
    Ok(toggle)
}

/// Runs an interactive session on the context's tree until `quit` or EOF.
///
/// # Errors
///
/// Returns an error if the session cannot be initialized (for example when
/// another session is active) or stdout cannot be written.
pub fn execute(ctx: &TrackerContext) -> Result<()> {
    let mut tracker = ctx.service()?;
    tracker.initialize()?;
    tracker.start()?;

    let (sender, lines) = unbounded();
    thread::Builder::new()
        .name("snaptrack-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if sender.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to start stdin reader")?;

    output::info("Watching for changes; type 'help' for commands");
    let result = run(&tracker, &lines, &mut io::stdout().lock());
    tracker.shutdown()?;
    result
}

/// Serves commands from `lines` and background events from `tracker` until
/// `quit` or until `lines` disconnects.
///
/// # Errors
///
/// Returns an error only if `out` cannot be written; command failures are
/// reported as `error:` lines.
pub fn run<W: Write>(tracker: &TrackerService, lines: &Receiver<String>, out: &mut W) -> Result<()> {
    let events = tracker.events();
    writeln!(
        out,
        "ok watching {} ({} files)",
        tracker.root().display(),
        tracker.status().tracked_files
    )?;

    loop {
        let flow = select! {
            recv(lines) -> line => match line {
                Ok(line) => serve_line(tracker, &line, out)?,
                Err(_) => Flow::Stop,
            },
            recv(events) -> event => {
                if let Ok(event) = event {
                    print_event(&event, out)?;
                }
                Flow::Continue
            }
        };
        out.flush()?;
        if flow == Flow::Stop {
            break;
        }
    }

    writeln!(out, "ok bye")?;
    out.flush()?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

fn serve_line<W: Write>(tracker: &TrackerService, line: &str, out: &mut W) -> io::Result<Flow> {
    if line.trim().is_empty() {
        return Ok(Flow::Continue);
    }
    match line.parse::<WatchCommand>() {
        Ok(WatchCommand::Quit) => return Ok(Flow::Stop),
        Ok(command) => handle(tracker, command, out)?,
        Err(message) => writeln!(out, "error: {message}")?,
    }
    Ok(Flow::Continue)
}

fn handle<W: Write>(tracker: &TrackerService, command: WatchCommand, out: &mut W) -> io::Result<()> {
    match command {
        WatchCommand::Status => match tracker.poll() {
            Ok(changes) => {
                let status = tracker.status();
                writeln!(
                    out,
                    "ok {} change(s), {} files tracked, session {}",
                    changes.len(),
                    status.tracked_files,
                    status.state
                )?;
                for change in changes.iter() {
                    writeln!(out, "  {}", format_change_short(&change))?;
                }
            }
            Err(e) => writeln!(out, "error: {e}")?,
        },
        WatchCommand::Save(comment) => match tracker.save_now(&comment) {
            Ok(report) => {
                writeln!(out, "ok saved {}", report.id)?;
                for path in &report.omitted {
                    writeln!(out, "  omitted {path}")?;
                }
            }
            Err(e) => writeln!(out, "error: {e}")?,
        },
        WatchCommand::List => match tracker.list() {
            Ok(snapshots) => {
                writeln!(out, "ok {} snapshot(s)", snapshots.len())?;
                for summary in snapshots {
                    writeln!(
                        out,
                        "  {} {} files {}",
                        summary.id, summary.file_count, summary.comment
                    )?;
                }
            }
            Err(e) => writeln!(out, "error: {e}")?,
        },
        WatchCommand::Restore(raw) => {
            let result = parse_snapshot_id(&raw)
                .map_err(|e| e.to_string())
                .and_then(|id| tracker.restore_to(&id).map_err(|e| restore_failure(&e)));
            match result {
                Ok(state) => writeln!(out, "ok restored {} ({} files)", raw.trim(), state.len())?,
                Err(message) => writeln!(out, "error: {message}")?,
            }
        }
        WatchCommand::Autosave(toggle) => {
            let current = tracker.status().autosave;
            let update = match toggle {
                None => None,
                Some(AutosaveToggle::On(minutes)) => {
                    Some((true, minutes.unwrap_or(current.interval_minutes)))
                }
                Some(AutosaveToggle::Off) => Some((false, current.interval_minutes)),
            };
            if let Some((enabled, minutes)) = update
                && let Err(e) = tracker.set_autosave(enabled, minutes)
            {
                return writeln!(out, "error: {e}");
            }
            let settings = tracker.status().autosave;
            let state = if settings.enabled { "on" } else { "off" };
            writeln!(
                out,
                "ok autosave {state} every {} minute(s)",
                settings.interval_minutes
            )?;
        }
        WatchCommand::Help => writeln!(out, "ok {HELP}")?,
        WatchCommand::Quit => {}
    }
    Ok(())
}

fn restore_failure(error: &TrackerError) -> String {
    match error {
        TrackerError::PartialRestore { missing, .. } => {
            format!("{error}; could not restore: {}", missing.join(" "))
        }
        other => other.to_string(),
    }
}

fn print_event<W: Write>(event: &TrackerEvent, out: &mut W) -> io::Result<()> {
    match event {
        TrackerEvent::Changes(changes) => {
            writeln!(out, "event: {} change(s)", changes.len())?;
            for change in changes.iter() {
                writeln!(out, "  {}", format_change_short(&change))?;
            }
        }
        TrackerEvent::Autosaved(report) => writeln!(out, "event: autosaved {}", report.id)?,
        TrackerEvent::AutosaveFailed(e) => writeln!(out, "event: autosave failed: {e}")?,
    }
    Ok(())
}
