//! Framed IPC protocol between the UI process and the host
//!
//! Each frame is a `u32` big-endian length (type byte plus payload), one
//! message-type byte, and a JSON payload. Requests carry a request number
//! that the matching [`Response`] echoes. Host-originated change batches are
//! pushed as `SyncControllerChanges` frames with request number 0.

use bridge_types::{CallResult, ControllerChange, ControllerDescription, ControllerId, RemoteError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Request number used for unsolicited host pushes
pub const PUSH: u64 = 0;

/// Error type for the IPC layer
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(u8),

    #[error("Empty message")]
    EmptyFrame,

    #[error("Frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Unexpected {0:?} frame")]
    Unexpected(MessageType),
}

/// Message types for IPC protocol
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    // UI → Host
    CreateController = 1,
    CallMethod = 2,
    CallInternalMethod = 3,
    DestroyController = 4,
    GetDescription = 5,

    // Both directions
    SyncControllerChanges = 10,

    // Host → UI
    Response = 20,
}

impl TryFrom<u8> for MessageType {
    type Error = IpcError;

    fn try_from(value: u8) -> Result<Self, IpcError> {
        match value {
            1 => Ok(MessageType::CreateController),
            2 => Ok(MessageType::CallMethod),
            3 => Ok(MessageType::CallInternalMethod),
            4 => Ok(MessageType::DestroyController),
            5 => Ok(MessageType::GetDescription),
            10 => Ok(MessageType::SyncControllerChanges),
            20 => Ok(MessageType::Response),
            _ => Err(IpcError::UnknownMessageType(value)),
        }
    }
}

/// One framed message
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub msg_type: MessageType,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(msg_type: MessageType, payload: Vec<u8>) -> Self {
        Self { msg_type, payload }
    }

    /// Build a frame with a JSON payload
    pub fn json<T: Serialize>(msg_type: MessageType, data: &T) -> Result<Self, IpcError> {
        Ok(Self::new(msg_type, serde_json::to_vec(data)?))
    }

    /// Parse payload as JSON
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, IpcError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    request: u64,
    #[serde(flatten)]
    body: T,
}

#[derive(Serialize, Deserialize)]
struct NameBody {
    name: String,
}

#[derive(Serialize, Deserialize)]
struct CallBody {
    id: ControllerId,
    name: String,
    #[serde(default)]
    args: Vec<Value>,
}

#[derive(Serialize, Deserialize)]
struct IdBody {
    id: ControllerId,
}

#[derive(Serialize, Deserialize)]
struct ChangesBody {
    changes: Vec<ControllerChange>,
}

/// A request frame decoded by message type
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    CreateController { name: String },
    CallMethod { id: ControllerId, name: String, args: Vec<Value> },
    CallInternalMethod { id: ControllerId, name: String, args: Vec<Value> },
    DestroyController { id: ControllerId },
    GetDescription { id: ControllerId },
    SyncControllerChanges { changes: Vec<ControllerChange> },
}

impl Request {
    pub fn message_type(&self) -> MessageType {
        match self {
            Request::CreateController { .. } => MessageType::CreateController,
            Request::CallMethod { .. } => MessageType::CallMethod,
            Request::CallInternalMethod { .. } => MessageType::CallInternalMethod,
            Request::DestroyController { .. } => MessageType::DestroyController,
            Request::GetDescription { .. } => MessageType::GetDescription,
            Request::SyncControllerChanges { .. } => MessageType::SyncControllerChanges,
        }
    }

    /// Encode with the given request number
    pub fn to_frame(&self, request: u64) -> Result<Frame, IpcError> {
        fn framed<T: Serialize>(ty: MessageType, request: u64, body: T) -> Result<Frame, IpcError> {
            Frame::json(ty, &Envelope { request, body })
        }

        let ty = self.message_type();
        match self.clone() {
            Request::CreateController { name } => framed(ty, request, NameBody { name }),
            Request::CallMethod { id, name, args }
            | Request::CallInternalMethod { id, name, args } => {
                framed(ty, request, CallBody { id, name, args })
            }
            Request::DestroyController { id } | Request::GetDescription { id } => {
                framed(ty, request, IdBody { id })
            }
            Request::SyncControllerChanges { changes } => {
                framed(ty, request, ChangesBody { changes })
            }
        }
    }

    /// Decode a request frame into its request number and body
    pub fn from_frame(frame: &Frame) -> Result<(u64, Request), IpcError> {
        fn body<T: DeserializeOwned>(frame: &Frame) -> Result<(u64, T), IpcError> {
            let envelope: Envelope<T> = frame.parse_json()?;
            Ok((envelope.request, envelope.body))
        }

        Ok(match frame.msg_type {
            MessageType::CreateController => {
                let (request, NameBody { name }) = body(frame)?;
                (request, Request::CreateController { name })
            }
            MessageType::CallMethod => {
                let (request, CallBody { id, name, args }) = body(frame)?;
                (request, Request::CallMethod { id, name, args })
            }
            MessageType::CallInternalMethod => {
                let (request, CallBody { id, name, args }) = body(frame)?;
                (request, Request::CallInternalMethod { id, name, args })
            }
            MessageType::DestroyController => {
                let (request, IdBody { id }) = body(frame)?;
                (request, Request::DestroyController { id })
            }
            MessageType::GetDescription => {
                let (request, IdBody { id }) = body(frame)?;
                (request, Request::GetDescription { id })
            }
            MessageType::SyncControllerChanges => {
                let (request, ChangesBody { changes }) = body(frame)?;
                (request, Request::SyncControllerChanges { changes })
            }
            MessageType::Response => return Err(IpcError::Unexpected(frame.msg_type)),
        })
    }
}

/// Reply to one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub request: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
}

impl Response {
    pub fn ok(request: u64, result: Option<Value>) -> Self {
        Self {
            request,
            result,
            error: None,
        }
    }

    pub fn err(request: u64, error: RemoteError) -> Self {
        Self {
            request,
            result: None,
            error: Some(error),
        }
    }

    pub fn to_frame(&self) -> Result<Frame, IpcError> {
        Frame::json(MessageType::Response, self)
    }

    /// The result as a controller description
    pub fn description(&self) -> Option<ControllerDescription> {
        self.result
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// The result as a method call result
    pub fn call_result(&self) -> Option<CallResult> {
        self.result
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

/// Encode a host push of outbound changes
pub fn push_frame(changes: Vec<ControllerChange>) -> Result<Frame, IpcError> {
    Request::SyncControllerChanges { changes }.to_frame(PUSH)
}

// ─────────────────────────────────────────────────────────────────────────────
// Reader / Writer
// ─────────────────────────────────────────────────────────────────────────────

/// IPC writer for sending frames over any byte stream
pub struct IpcWriter<W> {
    writer: W,
    max_frame_len: usize,
}

impl<W: AsyncWrite + Unpin> IpcWriter<W> {
    pub fn new(writer: W, max_frame_len: usize) -> Self {
        Self {
            writer,
            max_frame_len,
        }
    }

    /// Send a frame
    ///
    /// Frames the peer would reject are refused before anything is written.
    pub async fn send(&mut self, frame: &Frame) -> Result<(), IpcError> {
        let len = 1 + frame.payload.len();
        let too_large = IpcError::FrameTooLarge {
            len,
            max: self.max_frame_len,
        };
        if len > self.max_frame_len {
            return Err(too_large);
        }
        let len = u32::try_from(len).map_err(|_| too_large)?;

        self.writer.write_all(&len.to_be_bytes()).await?;
        self.writer.write_all(&[frame.msg_type as u8]).await?;
        self.writer.write_all(&frame.payload).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Send a frame with JSON payload
    pub async fn send_json<T: Serialize>(
        &mut self,
        msg_type: MessageType,
        data: &T,
    ) -> Result<(), IpcError> {
        self.send(&Frame::json(msg_type, data)?).await
    }
}

/// IPC reader for receiving frames from any byte stream
pub struct IpcReader<R> {
    reader: R,
    max_frame_len: usize,
}

impl<R: AsyncRead + Unpin> IpcReader<R> {
    pub fn new(reader: R, max_frame_len: usize) -> Self {
        Self {
            reader,
            max_frame_len,
        }
    }

    /// Receive a frame; `None` when the stream ends cleanly
    pub async fn recv(&mut self) -> Result<Option<Frame>, IpcError> {
        // Read length (4 bytes, big-endian)
        let mut len_buf = [0u8; 4];
        match self.reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_be_bytes(len_buf) as usize;

        if len == 0 {
            return Err(IpcError::EmptyFrame);
        }
        if len > self.max_frame_len {
            return Err(IpcError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        // Read message type (1 byte)
        let mut type_buf = [0u8; 1];
        self.reader.read_exact(&mut type_buf).await?;
        let msg_type = MessageType::try_from(type_buf[0])?;

        // Read payload
        let mut payload = vec![0u8; len - 1];
        if !payload.is_empty() {
            self.reader.read_exact(&mut payload).await?;
        }

        Ok(Some(Frame::new(msg_type, payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_frames_over_a_pipe() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = IpcWriter::new(client, 1024);
        let mut reader = IpcReader::new(server, 1024);

        let request = Request::CallMethod {
            id: 3,
            name: "increment".to_string(),
            args: vec![json!(2)],
        };
        writer.send(&request.to_frame(7).unwrap()).await.unwrap();
        drop(writer);

        let frame = reader.recv().await.unwrap().unwrap();
        assert_eq!(frame.msg_type, MessageType::CallMethod);
        assert_eq!(Request::from_frame(&frame).unwrap(), (7, request));
        assert!(reader.recv().await.unwrap().is_none());
    }

    #[test]
    fn test_request_wire_shape() {
        let frame = Request::CreateController {
            name: "Counter".to_string(),
        }
        .to_frame(1)
        .unwrap();
        let payload: Value = frame.parse_json().unwrap();
        assert_eq!(payload, json!({"request": 1, "name": "Counter"}));
    }

    #[test]
    fn test_response_wire_shape() {
        let ok = serde_json::to_value(Response::ok(4, None)).unwrap();
        assert_eq!(ok, json!({"request": 4}));

        let err = Response::err(
            5,
            RemoteError::new(bridge_types::ErrorKind::NotFound, "missing"),
        );
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["error"]["kind"], json!("notFound"));
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = IpcWriter::new(client, 1024);
        let mut reader = IpcReader::new(server, 8);

        writer
            .send(&Frame::new(MessageType::Response, vec![b' '; 16]))
            .await
            .unwrap();
        assert!(matches!(
            reader.recv().await,
            Err(IpcError::FrameTooLarge { len: 17, max: 8 })
        ));
    }

    #[tokio::test]
    async fn test_writer_refuses_oversized_frame() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = IpcWriter::new(client, 8);
        let mut reader = IpcReader::new(server, 1024);

        assert!(matches!(
            writer
                .send(&Frame::new(MessageType::Response, vec![b' '; 16]))
                .await,
            Err(IpcError::FrameTooLarge { len: 17, max: 8 })
        ));

        // Nothing was written, so the stream stays in step
        writer
            .send(&Frame::new(MessageType::Response, b"{}".to_vec()))
            .await
            .unwrap();
        drop(writer);
        let frame = reader.recv().await.unwrap().unwrap();
        assert_eq!(frame.payload, b"{}".to_vec());
        assert!(reader.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_message_type() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut reader = IpcReader::new(server, 64);
        client.write_all(&[0, 0, 0, 1, 99]).await.unwrap();

        assert!(matches!(
            reader.recv().await,
            Err(IpcError::UnknownMessageType(99))
        ));
    }

    #[test]
    fn test_response_frame_is_not_a_request() {
        let frame = Response::ok(1, None).to_frame().unwrap();
        assert!(matches!(
            Request::from_frame(&frame),
            Err(IpcError::Unexpected(MessageType::Response))
        ));
    }
}
