//! RPC method routing over the note service.
//!
//! # Responsibility
//! - Decode one request line into a note operation and its arguments.
//! - Convert every service outcome and fault into a response value.
//!
//! # Invariants
//! - Holds no document state; all shared state lives behind the store lock.
//! - Never panics outward: handler panics become `INTERNAL_ERROR` replies.
//! - "Not found" is a normal result value, never a protocol error.

use crate::protocol::{
    error_codes, JsonRpcId, JsonRpcRequest, JsonRpcResponse, WireNote, JSONRPC_VERSION,
};
use log::{debug, error, warn};
use serde_json::{json, Value};
use std::panic::{self, AssertUnwindSafe};
use topicnote_core::{DocumentStore, EnrichmentClient, NoteService};

/// Response to send (none for notifications) plus whether the connection
/// must be closed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub response: Option<JsonRpcResponse>,
    pub close: bool,
}

impl Reply {
    fn keep(response: JsonRpcResponse) -> Self {
        Self {
            response: Some(response),
            close: false,
        }
    }

    fn close(response: JsonRpcResponse) -> Self {
        Self {
            response: Some(response),
            close: true,
        }
    }

    /// Drops the response when the request was a notification.
    fn for_request(self, id: Option<&JsonRpcId>) -> Self {
        match id {
            Some(_) => self,
            None => Self {
                response: None,
                close: self.close,
            },
        }
    }
}

/// Method-level failure mapped onto a JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MethodError {
    code: i32,
    message: String,
}

impl MethodError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Stateless router shared by every connection worker.
pub struct Dispatcher<S: DocumentStore, E: EnrichmentClient> {
    service: NoteService<S, E>,
}

impl<S: DocumentStore, E: EnrichmentClient> Dispatcher<S, E> {
    pub fn new(service: NoteService<S, E>) -> Self {
        Self { service }
    }

    /// Handles one request line as read off the wire. Lines that are not
    /// UTF-8 are a parse error; nothing is executed.
    pub fn handle_bytes(&self, raw: &[u8]) -> Reply {
        match std::str::from_utf8(raw) {
            Ok(line) => self.handle_line(line),
            Err(err) => {
                warn!(
                    "event=rpc_decode module=dispatcher status=error error_code=invalid_utf8 error={err}"
                );
                Reply::close(JsonRpcResponse::error(
                    None,
                    error_codes::PARSE_ERROR,
                    format!("parse error: request is not valid UTF-8 ({err})"),
                ))
            }
        }
    }

    /// Handles one raw request line.
    ///
    /// Unparsable input and handler panics ask the caller to close the
    /// connection; every other outcome keeps it open. Requests without an
    /// `id` are notifications: they run but produce no response.
    pub fn handle_line(&self, line: &str) -> Reply {
        let raw: Value = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    "event=rpc_decode module=dispatcher status=error error_code=parse_error error={err}"
                );
                return Reply::close(JsonRpcResponse::error(
                    None,
                    error_codes::PARSE_ERROR,
                    format!("parse error: {err}"),
                ));
            }
        };

        let fallback_id = raw
            .get("id")
            .and_then(|id| serde_json::from_value::<JsonRpcId>(id.clone()).ok());
        let request: JsonRpcRequest = match serde_json::from_value(raw) {
            Ok(request) => request,
            Err(err) => {
                return Reply::keep(JsonRpcResponse::error(
                    fallback_id,
                    error_codes::INVALID_REQUEST,
                    format!("invalid request: {err}"),
                ));
            }
        };
        if request.jsonrpc != JSONRPC_VERSION {
            return Reply::keep(JsonRpcResponse::error(
                request.id,
                error_codes::INVALID_REQUEST,
                format!("unsupported jsonrpc version `{}`", request.jsonrpc),
            ));
        }

        self.handle_request(request)
    }

    /// Routes a decoded request, isolating handler panics.
    pub fn handle_request(&self, request: JsonRpcRequest) -> Reply {
        let id = request.id.clone();
        let method = request.method.clone();
        debug!(
            "event=rpc_call module=dispatcher status=start method={method} notification={}",
            id.is_none()
        );

        let reply = match panic::catch_unwind(AssertUnwindSafe(|| self.route(&request))) {
            Ok(Ok(result)) => Reply::keep(JsonRpcResponse::success(id.clone(), result)),
            Ok(Err(err)) => {
                debug!(
                    "event=rpc_call module=dispatcher status=error method={method} code={}",
                    err.code
                );
                Reply::keep(JsonRpcResponse::error(id.clone(), err.code, err.message))
            }
            Err(_) => {
                error!("event=rpc_call module=dispatcher status=panic method={method}");
                Reply::close(JsonRpcResponse::error(
                    id.clone(),
                    error_codes::INTERNAL_ERROR,
                    format!("internal error while handling `{method}`"),
                ))
            }
        };
        reply.for_request(id.as_ref())
    }

    fn route(&self, request: &JsonRpcRequest) -> Result<Value, MethodError> {
        let params = request.params.as_ref();
        match request.method.as_str() {
            "add_note" => {
                let [topic, name, text] = string_params(params, ["topic", "name", "text"])?;
                Ok(json!(self.add_note(&topic, &name, &text)))
            }
            "get_notes_by_topic" => {
                let [topic] = string_params(params, ["topic"])?;
                self.get_notes_by_topic(&topic)
            }
            "add_wikipedia_info" => {
                let [topic, name] = string_params(params, ["topic", "name"])?;
                Ok(json!(self.add_wikipedia_info(&topic, &name)))
            }
            "delete_note" => {
                let [topic, name] = string_params(params, ["topic", "name"])?;
                Ok(json!(self.delete_note(&topic, &name)))
            }
            "ping" => Ok(json!(topicnote_core::ping())),
            "core_version" => Ok(json!(topicnote_core::core_version())),
            other => Err(MethodError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("method not found: `{other}`"),
            )),
        }
    }

    /// `true` when the note was stored, `false` on store failure.
    fn add_note(&self, topic: &str, name: &str, text: &str) -> bool {
        match self.service.add_note(topic, name, text) {
            Ok(()) => true,
            Err(err) => {
                error!("event=rpc_add_note module=dispatcher status=error error={err}");
                false
            }
        }
    }

    /// Empty list for missing topics; store failure is a `STORAGE_ERROR`.
    fn get_notes_by_topic(&self, topic: &str) -> Result<Value, MethodError> {
        let notes = self.service.get_notes_by_topic(topic).map_err(|err| {
            error!("event=rpc_get_notes module=dispatcher status=error error={err}");
            MethodError::new(
                error_codes::STORAGE_ERROR,
                format!("Failed to get notes: {err}"),
            )
        })?;
        let wire = notes.into_iter().map(WireNote::from).collect::<Vec<_>>();
        serde_json::to_value(wire)
            .map_err(|err| MethodError::new(error_codes::INTERNAL_ERROR, err.to_string()))
    }

    fn add_wikipedia_info(&self, topic: &str, name: &str) -> String {
        match self.service.enrich_note(topic, name) {
            Ok(outcome) => outcome.status_message(topic, name),
            Err(err) => {
                error!("event=rpc_enrich module=dispatcher status=error error={err}");
                format!("Failed to add Wikipedia info: {err}")
            }
        }
    }

    fn delete_note(&self, topic: &str, name: &str) -> String {
        match self.service.delete_note(topic, name) {
            Ok(outcome) => outcome.status_message(topic, name),
            Err(err) => {
                error!("event=rpc_delete module=dispatcher status=error error={err}");
                format!("Failed to delete note: {err}")
            }
        }
    }
}

/// Extracts `N` string arguments given positionally (`["a","b"]`) or by
/// name (`{"topic":"a","name":"b"}`).
fn string_params<const N: usize>(
    params: Option<&Value>,
    names: [&'static str; N],
) -> Result<[String; N], MethodError> {
    let invalid = |message: String| MethodError::new(error_codes::INVALID_PARAMS, message);

    let values: Vec<&Value> = match params {
        Some(Value::Array(items)) => {
            if items.len() != N {
                return Err(invalid(format!(
                    "expected {N} positional params ({}), got {}",
                    names.join(", "),
                    items.len()
                )));
            }
            items.iter().collect()
        }
        Some(Value::Object(map)) => names
            .iter()
            .map(|name| {
                map.get(*name)
                    .ok_or_else(|| invalid(format!("missing param `{name}`")))
            })
            .collect::<Result<_, _>>()?,
        None | Some(Value::Null) if N == 0 => Vec::new(),
        _ => {
            return Err(invalid(format!(
                "expected params ({}) as array or object",
                names.join(", ")
            )))
        }
    };

    let mut out: [String; N] = std::array::from_fn(|_| String::new());
    for (slot, (name, value)) in out.iter_mut().zip(names.iter().zip(values)) {
        *slot = value
            .as_str()
            .ok_or_else(|| invalid(format!("param `{name}` must be a string")))?
            .to_string();
    }
    Ok(out)
}
