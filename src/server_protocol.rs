use serde_json::Value;

use crate::types::Vec3;

/// Client messages the relay understands. Anything else, including messages
/// with non-finite numbers, parses to `None` and is dropped.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedClientMessage {
    Join { name: String },
    Input { dir: Option<Vec3>, split: bool },
    Ping { t: u64 },
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let obj = value.as_object()?;
    let msg_type = obj.get("type")?.as_str()?;

    match msg_type {
        "join" => {
            let name = obj.get("name")?.as_str()?.to_string();
            Some(ParsedClientMessage::Join { name })
        }
        "input" => {
            let dir = match obj.get("dir") {
                Some(dir_value) => Some(parse_vec3(dir_value)?),
                None => None,
            };
            let split = obj
                .get("split")
                .map(|v| v.as_bool().unwrap_or(false))
                .unwrap_or(false);
            Some(ParsedClientMessage::Input { dir, split })
        }
        "ping" => {
            let t = obj.get("t")?.as_u64()?;
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

fn parse_vec3(value: &Value) -> Option<Vec3> {
    let obj = value.as_object()?;
    let x = finite_f32(obj.get("x")?)?;
    let y = finite_f32(obj.get("y")?)?;
    let z = finite_f32(obj.get("z")?)?;
    Some(Vec3::new(x, y, z))
}

fn finite_f32(value: &Value) -> Option<f32> {
    let number = value.as_f64()?;
    let number = number as f32;
    if number.is_finite() {
        Some(number)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_join() {
        let parsed = parse_client_message(r#"{"type":"join","name":"Alice"}"#);
        assert_eq!(
            parsed,
            Some(ParsedClientMessage::Join {
                name: "Alice".to_string()
            })
        );
    }

    #[test]
    fn parses_input_with_direction_and_split() {
        let parsed = parse_client_message(
            r#"{"type":"input","dir":{"x":0.0,"y":1.0,"z":0.0},"split":true}"#,
        );
        assert_eq!(
            parsed,
            Some(ParsedClientMessage::Input {
                dir: Some(Vec3::new(0.0, 1.0, 0.0)),
                split: true
            })
        );
    }

    #[test]
    fn input_without_direction_is_valid() {
        let parsed = parse_client_message(r#"{"type":"input","split":true}"#);
        assert_eq!(
            parsed,
            Some(ParsedClientMessage::Input {
                dir: None,
                split: true
            })
        );
    }

    #[test]
    fn rejects_non_finite_direction() {
        // JSON has no NaN literal; a string smuggled into a numeric field
        // must also fail.
        assert_eq!(
            parse_client_message(r#"{"type":"input","dir":{"x":"nan","y":0,"z":0}}"#),
            None
        );
        assert_eq!(
            parse_client_message(r#"{"type":"input","dir":{"x":1e999,"y":0,"z":0}}"#),
            None
        );
    }

    #[test]
    fn rejects_incomplete_direction() {
        assert_eq!(
            parse_client_message(r#"{"type":"input","dir":{"x":1.0,"y":2.0}}"#),
            None
        );
    }

    #[test]
    fn parses_ping() {
        assert_eq!(
            parse_client_message(r#"{"type":"ping","t":123456}"#),
            Some(ParsedClientMessage::Ping { t: 123_456 })
        );
    }

    #[test]
    fn rejects_unknown_and_malformed_messages() {
        assert_eq!(parse_client_message("not json"), None);
        assert_eq!(parse_client_message(r#"{"type":"teleport"}"#), None);
        assert_eq!(parse_client_message(r#"{"name":"Alice"}"#), None);
        assert_eq!(parse_client_message(r#"{"type":"join"}"#), None);
        assert_eq!(parse_client_message("[1,2,3]"), None);
    }
}
