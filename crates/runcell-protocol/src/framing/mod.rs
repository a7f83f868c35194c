//! Request and response framing over byte channels.
//!
//! A channel carries exactly one JSON document. The request side reads to
//! end-of-stream before decoding; the response side writes the document and a
//! trailing newline in a single call, flushes, and closes the channel.

use std::io::{Read, Write};

use serde_json::Value;
use tracing::debug;

use crate::config::ExecutionMode;
use crate::error::FrameError;
use crate::request::ExecutionRequest;
use crate::response::{ExecutionResult, WorkerResponse};

const FRAMING_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::framing");

/// Reads and decodes one request from the channel.
///
/// # Errors
///
/// Returns [`FrameError`] when the channel cannot be read, is empty, holds
/// anything other than a request document, or carries an invalid `config`.
pub fn read_request<R: Read>(mut reader: R) -> Result<ExecutionRequest, FrameError> {
    let bytes = read_to_end(&mut reader)?;
    debug!(target: FRAMING_TARGET, bytes = bytes.len(), "request received");
    ExecutionRequest::from_slice(&bytes)
}

/// Encodes `response` and writes it as the channel's only message.
///
/// The writer is consumed and dropped once the bytes are flushed, which
/// closes the underlying channel.
///
/// # Errors
///
/// Returns [`FrameError`] when encoding, writing, or flushing fails.
pub fn write_response<W: Write>(mut writer: W, response: &WorkerResponse) -> Result<(), FrameError> {
    let mut payload =
        serde_json::to_vec(response).map_err(|err| FrameError::Serialize(err.into()))?;
    payload.push(b'\n');
    writer.write_all(&payload).map_err(FrameError::write)?;
    writer.flush().map_err(FrameError::write)?;
    debug!(target: FRAMING_TARGET, bytes = payload.len(), "response written");
    drop(writer);
    Ok(())
}

/// Reads the worker's answer from a response channel.
///
/// `mode` must be the mode the request was sent with: an in-process value
/// and an execution result can share a shape, so the reader cannot tell them
/// apart otherwise. A `sandboxError` object is recognised in either mode.
///
/// # Errors
///
/// Returns [`FrameError::Empty`] when the worker closed the channel without
/// answering, and [`FrameError::Malformed`] when the bytes do not decode.
pub fn read_reply<R: Read>(mut reader: R, mode: ExecutionMode) -> Result<WorkerResponse, FrameError> {
    let bytes = read_to_end(&mut reader)?;
    let value: Value = serde_json::from_slice(&bytes).map_err(FrameError::decode)?;

    if let Some(message) = sandbox_error_message(&value) {
        return Ok(WorkerResponse::sandbox_error(message));
    }

    match mode {
        ExecutionMode::InProcess => Ok(WorkerResponse::Value(value)),
        ExecutionMode::Isolated => {
            let result: ExecutionResult =
                serde_json::from_value(value).map_err(FrameError::decode)?;
            if !result.is_consistent() {
                return Err(FrameError::malformed(
                    "execution result violates status/result invariants",
                ));
            }
            Ok(WorkerResponse::Execution(result))
        }
    }
}

fn read_to_end<R: Read>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(FrameError::read)?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(FrameError::Empty);
    }
    Ok(bytes)
}

fn sandbox_error_message(value: &Value) -> Option<&str> {
    let object = value.as_object()?;
    if object.len() != 1 {
        return None;
    }
    object.get("sandboxError")?.as_str()
}
