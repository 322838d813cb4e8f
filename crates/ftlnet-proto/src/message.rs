use rmpv::Value;

use crate::error::{ProtoError, Result};

/// Message kind tag for notifications and calls.
pub const KIND_REQUEST: u64 = 0;
/// Message kind tag for responses.
pub const KIND_RESPONSE: u64 = 1;

/// One decoded socket message.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// `[0, name, args]`: fire-and-forget, never answered.
    Notification { name: String, args: Vec<Value> },
    /// `[0, call_id, name, args]`: expects exactly one response.
    Call {
        id: u64,
        name: String,
        args: Vec<Value>,
    },
    /// `[1, call_id, error, result]`.
    Response {
        id: u64,
        error: Option<String>,
        result: Value,
    },
}

impl WireMessage {
    /// Successful response to a call.
    pub fn ok(id: u64, result: Value) -> Self {
        Self::Response {
            id,
            error: None,
            result,
        }
    }

    /// Error-tagged response to a call.
    pub fn err(id: u64, error: impl Into<String>) -> Self {
        Self::Response {
            id,
            error: Some(error.into()),
            result: Value::Nil,
        }
    }

    /// Procedure name for notifications and calls.
    pub fn procedure(&self) -> Option<&str> {
        match self {
            Self::Notification { name, .. } | Self::Call { name, .. } => Some(name),
            Self::Response { .. } => None,
        }
    }

    /// Positional array form.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Notification { name, args } => Value::Array(vec![
                Value::from(KIND_REQUEST),
                Value::from(name.as_str()),
                Value::Array(args.clone()),
            ]),
            Self::Call { id, name, args } => Value::Array(vec![
                Value::from(KIND_REQUEST),
                Value::from(*id),
                Value::from(name.as_str()),
                Value::Array(args.clone()),
            ]),
            Self::Response { id, error, result } => Value::Array(vec![
                Value::from(KIND_RESPONSE),
                Value::from(*id),
                error.as_deref().map(Value::from).unwrap_or(Value::Nil),
                result.clone(),
            ]),
        }
    }

    /// Parse the positional array form. Any other shape is rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(ProtoError::InvalidMessage(format!(
                    "expected array, got {other}"
                )))
            }
        };

        let kind = items.first().and_then(Value::as_u64);
        let len = items.len();
        let mut fields = items.into_iter().skip(1);
        // Length was checked by the match arm, so every field is present.
        let mut field = || fields.next().unwrap_or(Value::Nil);

        match (kind, len) {
            (Some(KIND_REQUEST), 3) => {
                let name = expect_name(field())?;
                let args = expect_args(field())?;
                Ok(Self::Notification { name, args })
            }
            (Some(KIND_REQUEST), 4) => {
                let id = expect_call_id(field())?;
                let name = expect_name(field())?;
                let args = expect_args(field())?;
                Ok(Self::Call { id, name, args })
            }
            (Some(KIND_RESPONSE), 4) => {
                let id = expect_call_id(field())?;
                let error = match field() {
                    Value::Nil => None,
                    Value::String(text) => Some(text.into_str().unwrap_or_default()),
                    other => Some(other.to_string()),
                };
                let result = field();
                Ok(Self::Response { id, error, result })
            }
            (Some(kind), len) => Err(ProtoError::InvalidMessage(format!(
                "unknown shape: kind {kind} with {len} elements"
            ))),
            (None, _) => Err(ProtoError::InvalidMessage(
                "missing or non-integer kind tag".to_string(),
            )),
        }
    }
}

fn expect_name(value: Value) -> Result<String> {
    match value {
        Value::String(name) => name
            .into_str()
            .ok_or_else(|| ProtoError::InvalidMessage("procedure name is not utf-8".to_string())),
        other => Err(ProtoError::InvalidMessage(format!(
            "procedure name must be a string, got {other}"
        ))),
    }
}

fn expect_call_id(value: Value) -> Result<u64> {
    value
        .as_u64()
        .ok_or_else(|| ProtoError::InvalidMessage(format!("call id must be unsigned, got {value}")))
}

fn expect_args(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(args) => Ok(args),
        Value::Nil => Ok(Vec::new()),
        other => Err(ProtoError::InvalidMessage(format!(
            "arguments must be an array, got {other}"
        ))),
    }
}
