//! Pure classification of backend responses.
//!
//! Every endpoint answers with a `{code, msg, data}` envelope. This module
//! turns a raw status + body into either the envelope payload or a
//! [`ClientError`]; deciding what to show the user happens elsewhere.

use clear_shared::Envelope;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ClientError;

/// Successful envelope contents.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub data: Value,
    pub msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    msg: Option<String>,
}

pub fn decode(status: u16, body: &[u8]) -> Result<Decoded, ClientError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|err| non_empty(err.msg));
        return Err(match message {
            Some(message) => ClientError::Api(message),
            None => ClientError::Http(status),
        });
    }

    let envelope: Envelope<Value> = serde_json::from_slice(body)?;
    if !envelope.is_success() {
        // Once the body parsed, the HTTP status is never used as the message.
        return Err(match non_empty(envelope.msg) {
            Some(message) => ClientError::Api(message),
            None => ClientError::Rejected {
                code: envelope.code,
            },
        });
    }

    Ok(Decoded {
        data: envelope.data.unwrap_or(Value::Null),
        msg: non_empty(envelope.msg),
    })
}

/// Text for a success toast: the envelope message, else string data.
pub fn success_message(decoded: &Decoded) -> Option<String> {
    decoded
        .msg
        .clone()
        .or_else(|| decoded.data.as_str().map(str::to_string))
        .filter(|text| !text.trim().is_empty())
}

fn non_empty(msg: Option<String>) -> Option<String> {
    msg.filter(|m| !m.trim().is_empty())
}
