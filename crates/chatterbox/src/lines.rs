//! Text lines the relay sends to clients.
//!
//! Clients render these verbatim, so the wording here is the user
//! interface. Chat traffic is prefixed with the relay's local time in
//! `h:mm a` form.

use chrono::{DateTime, Local};

/// Decoration around system notices.
const NOTICE: &str = " *** ";

/// Formats `time` as `h:mm a`, e.g. `9:05 PM`.
pub(crate) fn clock(time: DateTime<Local>) -> String {
    time.format("%-I:%M %p").to_string()
}

/// Prefixes `body` with the current local time.
pub(crate) fn stamped(body: &str) -> String {
    stamped_at(Local::now(), body)
}

pub(crate) fn stamped_at(time: DateTime<Local>, body: &str) -> String {
    format!("{} {}", clock(time), body)
}

pub(crate) fn notice(text: &str) -> String {
    format!("{NOTICE}{text}{NOTICE}")
}

pub(crate) fn joined(name: &str) -> String {
    notice(&format!("{name} has joined the chat room."))
}

pub(crate) fn left(name: &str) -> String {
    notice(&format!("{name} has left the chat room."))
}

pub(crate) fn chat(from: &str, text: &str) -> String {
    format!("{from}: {text}")
}

pub(crate) fn whisper(from: &str, text: &str) -> String {
    format!("{from} (private message): {text}")
}

pub(crate) fn whisper_sent(to: &str, text: &str) -> String {
    format!("You whispered to {to}: {text}")
}

pub(crate) fn no_such_user() -> String {
    notice("Sorry. No such user exists.")
}

pub(crate) fn unrecognized_command() -> String {
    "Command not recognized: Type '/help' for list of commands".to_string()
}

pub(crate) fn invalid_name(reason: &str) -> String {
    notice(&format!("Invalid display name: {reason}"))
}

pub(crate) fn roster_header(time: DateTime<Local>) -> String {
    format!("List of the users connected at {}", clock(time))
}

pub(crate) fn roster_entry(position: usize, name: &str, since: DateTime<Local>) -> String {
    format!("{position}) {name} since {}", since.format("%a %b %e %H:%M:%S %Y"))
}
