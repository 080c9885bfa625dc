//! Minimal blocking RPC client for the note server.

use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, WireNote};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};

/// Client-side call failure.
#[derive(Debug)]
pub enum ClientError {
    Io(io::Error),
    /// Response line or result payload had an unexpected shape.
    Decode(String),
    /// Server answered with a JSON-RPC error object.
    Rpc(JsonRpcError),
    /// Server closed the connection without answering.
    Closed,
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Decode(message) => write!(f, "invalid response: {message}"),
            Self::Rpc(err) => write!(f, "rpc error {}: {}", err.code, err.message),
            Self::Closed => write!(f, "connection closed by server"),
        }
    }
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ClientError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// One connection, requests issued sequentially.
pub struct RpcClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    next_id: i64,
}

impl RpcClient {
    pub fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let writer = TcpStream::connect(addr)?;
        let reader = BufReader::new(writer.try_clone()?);
        Ok(Self {
            reader,
            writer,
            next_id: 1,
        })
    }

    /// Sends one request and returns its `result`.
    pub fn call(&mut self, method: &str, params: Value) -> Result<Value, ClientError> {
        let request = JsonRpcRequest::new(self.next_id, method, params);
        self.next_id += 1;
        let line =
            serde_json::to_string(&request).map_err(|err| ClientError::Decode(err.to_string()))?;
        let response = self.send_raw(&line)?.ok_or(ClientError::Closed)?;
        match (response.result, response.error) {
            (_, Some(err)) => Err(ClientError::Rpc(err)),
            (Some(result), None) => Ok(result),
            (None, None) => Err(ClientError::Decode(
                "response has neither result nor error".to_string(),
            )),
        }
    }

    /// Writes `line` verbatim and reads one response line; `None` on EOF.
    /// Notifications (no `id`) get no response, so do not send them here.
    pub fn send_raw(&mut self, line: &str) -> Result<Option<JsonRpcResponse>, ClientError> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        let mut buf = String::new();
        if self.reader.read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        serde_json::from_str(&buf)
            .map(Some)
            .map_err(|err| ClientError::Decode(err.to_string()))
    }

    pub fn add_note(&mut self, topic: &str, name: &str, text: &str) -> Result<bool, ClientError> {
        self.typed_call("add_note", json!([topic, name, text]))
    }

    pub fn get_notes_by_topic(&mut self, topic: &str) -> Result<Vec<WireNote>, ClientError> {
        self.typed_call("get_notes_by_topic", json!([topic]))
    }

    pub fn add_wikipedia_info(&mut self, topic: &str, name: &str) -> Result<String, ClientError> {
        self.typed_call("add_wikipedia_info", json!([topic, name]))
    }

    pub fn delete_note(&mut self, topic: &str, name: &str) -> Result<String, ClientError> {
        self.typed_call("delete_note", json!([topic, name]))
    }

    fn typed_call<T: DeserializeOwned>(
        &mut self,
        method: &str,
        params: Value,
    ) -> Result<T, ClientError> {
        let result = self.call(method, params)?;
        serde_json::from_value(result).map_err(|err| ClientError::Decode(err.to_string()))
    }
}
