//! Action tokens: the opaque strings bound to start/stop edges
//!
//! Grammar, steps separated by `;`:
//!   key:<name>    press and release a key
//!   down:<name>   press and hold
//!   up:<name>     release
//!   text:<chars>  type literal text
//!   click:<left|right|middle>
//!   move:<dx>,<dy>
//!   scroll:<n>

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use crate::types::DispatchError;

lazy_static! {
    static ref RE_STEP: Regex = Regex::new(r"^(key|down|up|text|click|move|scroll):(.+)$").unwrap();

    // Named keys ("space", "F5", "ctrl") or a single printable character
    static ref RE_KEY: Regex = Regex::new(r"^([A-Za-z][A-Za-z0-9_]*|[[:graph:]])$").unwrap();

    static ref RE_MOVE: Regex = Regex::new(r"^(-?\d+)\s*,\s*(-?\d+)$").unwrap();

    static ref RE_SCROLL: Regex = Regex::new(r"^-?\d+$").unwrap();
}

/// Mouse buttons understood by `click:`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// One actuator step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", content = "arg", rename_all = "snake_case")]
pub enum ActionStep {
    KeyClick(String),
    KeyDown(String),
    KeyUp(String),
    Text(String),
    Click(MouseButton),
    Move(i32, i32),
    Scroll(i32),
}

impl std::fmt::Display for ActionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionStep::KeyClick(k) => write!(f, "key:{}", k),
            ActionStep::KeyDown(k) => write!(f, "down:{}", k),
            ActionStep::KeyUp(k) => write!(f, "up:{}", k),
            ActionStep::Text(t) => write!(f, "text:{}", t),
            ActionStep::Click(b) => write!(f, "click:{}", match b {
                MouseButton::Left => "left",
                MouseButton::Right => "right",
                MouseButton::Middle => "middle",
            }),
            ActionStep::Move(dx, dy) => write!(f, "move:{},{}", dx, dy),
            ActionStep::Scroll(n) => write!(f, "scroll:{}", n),
        }
    }
}

/// A parsed action token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionToken {
    pub raw: String,
    pub steps: Vec<ActionStep>,
}

impl ActionToken {
    /// Parse a token; an empty or blank token parses to no steps
    pub fn parse(raw: &str) -> Result<Self, DispatchError> {
        let steps = raw.split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| parse_step(raw, s))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { raw: raw.to_string(), steps })
    }

    /// Nothing to do
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }
}

fn parse_step(raw: &str, step: &str) -> Result<ActionStep, DispatchError> {
    let invalid = |reason: String| DispatchError::InvalidToken {
        token: raw.to_string(),
        reason,
    };

    let caps = RE_STEP.captures(step)
        .ok_or_else(|| invalid(format!("unknown step '{}'", step)))?;
    let arg = &caps[2];

    let key = |arg: &str| -> Result<String, DispatchError> {
        let arg = arg.trim();
        if RE_KEY.is_match(arg) {
            Ok(arg.to_string())
        } else {
            Err(invalid(format!("bad key name '{}'", arg)))
        }
    };

    match &caps[1] {
        "key" => Ok(ActionStep::KeyClick(key(arg)?)),
        "down" => Ok(ActionStep::KeyDown(key(arg)?)),
        "up" => Ok(ActionStep::KeyUp(key(arg)?)),
        "text" => Ok(ActionStep::Text(arg.to_string())),
        "click" => match arg.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(ActionStep::Click(MouseButton::Left)),
            "right" => Ok(ActionStep::Click(MouseButton::Right)),
            "middle" => Ok(ActionStep::Click(MouseButton::Middle)),
            other => Err(invalid(format!("bad mouse button '{}'", other))),
        },
        "move" => {
            let m = RE_MOVE.captures(arg.trim())
                .ok_or_else(|| invalid(format!("bad move '{}'", arg)))?;
            let dx = m[1].parse().map_err(|_| invalid(format!("bad move '{}'", arg)))?;
            let dy = m[2].parse().map_err(|_| invalid(format!("bad move '{}'", arg)))?;
            Ok(ActionStep::Move(dx, dy))
        }
        "scroll" => {
            let arg = arg.trim();
            if !RE_SCROLL.is_match(arg) {
                return Err(invalid(format!("bad scroll '{}'", arg)));
            }
            arg.parse()
                .map(ActionStep::Scroll)
                .map_err(|_| invalid(format!("bad scroll '{}'", arg)))
        }
        _ => Err(invalid(format!("unknown step '{}'", step))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_is_noop() {
        assert!(ActionToken::parse("").unwrap().is_noop());
        assert!(ActionToken::parse("  ; ").unwrap().is_noop());
    }

    #[test]
    fn test_parse_sequence() {
        let token = ActionToken::parse("down:ctrl; key:c ;up:ctrl").unwrap();
        assert_eq!(token.steps, vec![
            ActionStep::KeyDown("ctrl".into()),
            ActionStep::KeyClick("c".into()),
            ActionStep::KeyUp("ctrl".into()),
        ]);
    }

    #[test]
    fn test_parse_mouse() {
        let token = ActionToken::parse("click:Right;move:-10, 4;scroll:-3").unwrap();
        assert_eq!(token.steps, vec![
            ActionStep::Click(MouseButton::Right),
            ActionStep::Move(-10, 4),
            ActionStep::Scroll(-3),
        ]);
    }

    #[test]
    fn test_text_keeps_spaces() {
        let token = ActionToken::parse("text:hello world").unwrap();
        assert_eq!(token.steps, vec![ActionStep::Text("hello world".into())]);
    }

    #[test]
    fn test_invalid_steps() {
        assert!(ActionToken::parse("press:space").is_err());
        assert!(ActionToken::parse("key:two words").is_err());
        assert!(ActionToken::parse("click:thumb").is_err());
        assert!(ActionToken::parse("move:1").is_err());
        assert!(ActionToken::parse("scroll:up").is_err());
    }

    #[test]
    fn test_display_round_trips_step() {
        let step = ActionStep::Move(3, -7);
        assert_eq!(step.to_string(), "move:3,-7");
    }
}
