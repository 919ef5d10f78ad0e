use serde_json::Value;

use crate::types::{Direction, JoinMode};

#[derive(Debug, PartialEq)]
pub enum ParsedClientMessage {
    Join {
        name: String,
        room_id: Option<String>,
        mode: JoinMode,
    },
    Move {
        direction: Direction,
    },
    Restart,
    SetDuration {
        seconds: i64,
    },
    StartClock,
    StopClock,
    LoginHost {
        login: String,
        password: String,
    },
}

impl ParsedClientMessage {
    /// Controls reserved for an authenticated host connection.
    pub fn requires_host(&self) -> bool {
        matches!(
            self,
            Self::Restart | Self::SetDuration { .. } | Self::StartClock | Self::StopClock
        )
    }
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "join" => {
            let name = object.get("name")?.as_str()?.to_string();
            let room_id = match object.get("roomId") {
                None | Some(Value::Null) => None,
                Some(value) => Some(value.as_str()?.to_string()),
            };
            let mode = match object.get("mode") {
                None => JoinMode::Player,
                Some(value) => JoinMode::parse(value.as_str()?)?,
            };
            Some(ParsedClientMessage::Join {
                name,
                room_id,
                mode,
            })
        }
        "move" => {
            let direction = Direction::parse_move(object.get("direction")?.as_str()?)?;
            Some(ParsedClientMessage::Move { direction })
        }
        "restart" => Some(ParsedClientMessage::Restart),
        "setDuration" => {
            let seconds = parse_whole_number(object.get("seconds")?)?;
            Some(ParsedClientMessage::SetDuration { seconds })
        }
        "startClock" => Some(ParsedClientMessage::StartClock),
        "stopClock" => Some(ParsedClientMessage::StopClock),
        "loginHost" => {
            let login = object.get("login")?.as_str()?.to_string();
            let password = object.get("password")?.as_str()?.to_string();
            Some(ParsedClientMessage::LoginHost { login, password })
        }
        _ => None,
    }
}

/// Integers pass through; finite floats are floored. Anything outside the
/// safe JSON integer range is rejected.
fn parse_whole_number(value: &Value) -> Option<i64> {
    const MAX_SAFE_INTEGER_F64: f64 = 9_007_199_254_740_991.0;

    if let Some(number) = value.as_i64() {
        return Some(number);
    }
    if value.is_u64() {
        return None;
    }
    let number = value.as_f64()?;
    if !number.is_finite() {
        return None;
    }
    let floored = number.floor();
    if floored.abs() > MAX_SAFE_INTEGER_F64 {
        return None;
    }
    Some(floored as i64)
}
