use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const JSONRPC_VERSION: &str = "2.0";

pub const REJECTED_CODE: i64 = 3;
pub const REJECTED_DATA_CODE: i64 = 104;
pub const DISCONNECTED_CODE: i64 = 4900;
pub const INTERNAL_ERROR_CODE: i64 = -32603;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    Text(String),
}

impl RequestId {
    /// Reads the `id` member of a raw JSON-RPC message.
    pub fn from_message(message: &Value) -> Option<Self> {
        match message.get("id")? {
            Value::Number(n) => n.as_i64().map(Self::Number),
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// The error every declined signing path reports. Dapps match on this exact shape.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            code: REJECTED_CODE,
            message: message.into(),
            data: Some(json!([{ "code": REJECTED_DATA_CODE, "message": "Rejected" }])),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            code: DISCONNECTED_CODE,
            message: "Disconnected".to_owned(),
            data: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: INTERNAL_ERROR_CODE,
            message: message.into(),
            data: None,
        }
    }
}

/// A call received from the embedded document, after the version gate.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundCall {
    pub id: Option<RequestId>,
    pub method: String,
    pub params: Vec<Value>,
}

impl InboundCall {
    /// Returns `None` when the message is not a `2.0` request with a method.
    pub fn parse(message: &Value) -> Option<Self> {
        if message.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return None;
        }
        let method = message.get("method")?.as_str()?.to_owned();
        let params = match message.get("params") {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other.clone()],
        };
        Some(Self {
            id: RequestId::from_message(message),
            method,
            params,
        })
    }

    pub fn param(&self, index: usize) -> Option<&Value> {
        self.params.get(index)
    }
}

/// Anything the bridge sends to the embedded document.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Result {
        id: Option<RequestId>,
        result: Value,
    },
    Error {
        id: Option<RequestId>,
        error: RpcError,
    },
    Notification {
        method: &'static str,
        params: Value,
    },
    /// Node message passed through without modification.
    Relayed(Value),
}

impl Outbound {
    pub fn result(id: Option<RequestId>, result: impl Into<Value>) -> Self {
        Self::Result {
            id,
            result: result.into(),
        }
    }

    pub fn error(id: Option<RequestId>, error: RpcError) -> Self {
        Self::Error { id, error }
    }

    pub fn accounts_changed(address: &str) -> Self {
        Self::Notification {
            method: "accountsChanged",
            params: json!([[address]]),
        }
    }

    pub fn chain_changed(hex_chain_id: &str) -> Self {
        Self::Notification {
            method: "chainChanged",
            params: json!([hex_chain_id]),
        }
    }

    pub fn id(&self) -> Option<RequestId> {
        match self {
            Self::Result { id, .. } | Self::Error { id, .. } => id.clone(),
            Self::Notification { .. } => None,
            Self::Relayed(message) => RequestId::from_message(message),
        }
    }

    pub fn to_message(&self) -> Value {
        match self {
            Self::Relayed(message) => message.clone(),
            Self::Result { id, result } => {
                let mut map = base_envelope(id.as_ref());
                map.insert("result".to_owned(), result.clone());
                Value::Object(map)
            }
            Self::Error { id, error } => {
                let mut map = base_envelope(id.as_ref());
                map.insert(
                    "error".to_owned(),
                    serde_json::to_value(error).unwrap_or(Value::Null),
                );
                Value::Object(map)
            }
            Self::Notification { method, params } => {
                let mut map = base_envelope(None);
                map.insert("method".to_owned(), Value::String((*method).to_owned()));
                map.insert("params".to_owned(), params.clone());
                Value::Object(map)
            }
        }
    }
}

fn base_envelope(id: Option<&RequestId>) -> Map<String, Value> {
    let mut map = Map::new();
    if let Some(id) = id {
        map.insert(
            "id".to_owned(),
            serde_json::to_value(id).unwrap_or(Value::Null),
        );
    }
    map.insert(
        "jsonrpc".to_owned(),
        Value::String(JSONRPC_VERSION.to_owned()),
    );
    map
}
