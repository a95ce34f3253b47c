//! Interactive command parsing: one line in, one verb + argument out.
//!
//! Canonical command set the core exposes (`dial`, `answer`, `hangup`, `reginfo`,
//! `quit`); anything else is reported as unknown rather than silently ignored.

use event_bus::{CallId, UaId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Dial { ua: UaId, target: String },
    Answer { call: CallId },
    Hangup { call: CallId },
    Reginfo,
    Uastat,
    Quit,
    Unknown(String),
}

/// Parses one line of interactive input. `dial`/`answer`/`hangup` take a numeric id as
/// their first argument (the ua for `dial`, the call for `answer`/`hangup`) since this
/// binary has no notion of a "currently selected" call the way a TUI might.
pub fn parse(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let mut parts = line.split_whitespace();
    let verb = parts.next()?;

    Some(match verb {
        "dial" => {
            let Some(ua_id) = parts.next().and_then(|s| s.parse().ok()) else {
                return Some(Command::Unknown(line.to_owned()));
            };
            let Some(target) = parts.next() else {
                return Some(Command::Unknown(line.to_owned()));
            };
            Command::Dial {
                ua: UaId(ua_id),
                target: target.to_owned(),
            }
        }
        "answer" => match parts.next().and_then(|s| s.parse().ok()) {
            Some(call_id) => Command::Answer {
                call: CallId(call_id),
            },
            None => Command::Unknown(line.to_owned()),
        },
        "hangup" => match parts.next().and_then(|s| s.parse().ok()) {
            Some(call_id) => Command::Hangup {
                call: CallId(call_id),
            },
            None => Command::Unknown(line.to_owned()),
        },
        "reginfo" => Command::Reginfo,
        "uastat" => Command::Uastat,
        "quit" | "q" => Command::Quit,
        _ => Command::Unknown(line.to_owned()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dial_with_ua_and_target() {
        let cmd = parse("dial 0 sip:bob@example.com").unwrap();
        assert_eq!(
            cmd,
            Command::Dial {
                ua: UaId(0),
                target: "sip:bob@example.com".to_owned()
            }
        );
    }

    #[test]
    fn blank_lines_produce_no_command() {
        assert_eq!(parse("   "), None);
    }

    #[test]
    fn unrecognised_verbs_are_reported_not_dropped() {
        assert_eq!(parse("frobnicate"), Some(Command::Unknown("frobnicate".to_owned())));
    }
}
