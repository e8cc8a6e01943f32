//! Host-side IPC server
//!
//! Reads request frames from the UI, runs them against a [`ControllerHost`],
//! answers each with a [`Response`], and pushes queued host-originated
//! changes as soon as they appear.

use std::sync::Arc;

use bridge_runtime::ControllerHost;
use bridge_types::{ErrorKind, RemoteError};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::ipc::{Frame, IpcError, IpcReader, IpcWriter, Request, Response, push_frame};

/// Serves one UI connection
pub struct BridgeServer {
    host: Arc<ControllerHost>,
    max_frame_len: usize,
}

impl BridgeServer {
    pub fn new(host: Arc<ControllerHost>, max_frame_len: usize) -> Self {
        Self {
            host,
            max_frame_len,
        }
    }

    pub fn host(&self) -> &Arc<ControllerHost> {
        &self.host
    }

    /// Run one request against the host
    pub async fn handle_request(&self, request: Request) -> Result<Option<Value>, RemoteError> {
        let to_value = |value: serde_json::Result<Value>| {
            value.map(Some).map_err(|e| {
                RemoteError::new(ErrorKind::Internal, e.to_string())
            })
        };

        match request {
            Request::CreateController { name } => {
                let description = self.host.create_controller(&name)?;
                to_value(serde_json::to_value(description))
            }
            Request::CallMethod { id, name, args } => {
                let result = self.host.call_method(id, &name, &args)?;
                to_value(serde_json::to_value(result))
            }
            Request::CallInternalMethod { id, name, args } => {
                let result = self.host.call_internal_method_async(id, name, args).await?;
                to_value(serde_json::to_value(result))
            }
            Request::DestroyController { id } => {
                self.host.destroy_controller(id);
                Ok(None)
            }
            Request::GetDescription { id } => {
                let description = self.host.get_description(id)?;
                to_value(serde_json::to_value(description))
            }
            Request::SyncControllerChanges { changes } => {
                self.host.sync_controller_changes(&changes);
                Ok(None)
            }
        }
    }

    async fn respond(&self, frame: &Frame) -> Result<(u64, Frame), IpcError> {
        let (request_no, request) = Request::from_frame(frame)?;
        debug!("Request {} ({:?})", request_no, frame.msg_type);

        let response = match self.handle_request(request).await {
            Ok(result) => Response::ok(request_no, result),
            Err(e) => {
                warn!("Request {} failed: {}", request_no, e);
                Response::err(request_no, e)
            }
        };
        Ok((request_no, response.to_frame()?))
    }

    /// Send a reply, answering with an error when the reply is too large
    async fn send_reply<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut IpcWriter<W>,
        request_no: u64,
        reply: &Frame,
    ) -> Result<(), IpcError> {
        match writer.send(reply).await {
            Err(IpcError::FrameTooLarge { len, max }) => {
                warn!("Response to request {} is {} bytes, limit is {}", request_no, len, max);
                let error = RemoteError::new(
                    ErrorKind::Internal,
                    format!("Response of {len} bytes exceeds the {max} byte frame limit"),
                );
                writer.send(&Response::err(request_no, error).to_frame()?).await
            }
            result => result,
        }
    }

    async fn push_changes<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut IpcWriter<W>,
    ) -> Result<(), IpcError> {
        let changes = self.host.take_changes();
        if changes.is_empty() {
            return Ok(());
        }
        debug!("Pushing {} controller changes", changes.len());
        writer.send(&push_frame(changes)?).await
    }

    /// Serve until the reader reaches end of stream
    ///
    /// Frames are read on a separate task so waiting for host changes never
    /// interrupts a partially read frame.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), IpcError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin,
    {
        let mut writer = IpcWriter::new(writer, self.max_frame_len);
        let (frame_tx, mut frame_rx) = mpsc::channel::<Result<Frame, IpcError>>(32);

        let mut reader = IpcReader::new(reader, self.max_frame_len);
        let read_task = tokio::spawn(async move {
            loop {
                match reader.recv().await {
                    Ok(Some(frame)) => {
                        if frame_tx.send(Ok(frame)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = frame_tx.send(Err(e)).await;
                        break;
                    }
                }
            }
        });

        info!("Serving UI connection");
        let result = loop {
            tokio::select! {
                frame = frame_rx.recv() => {
                    let frame = match frame {
                        Some(Ok(frame)) => frame,
                        Some(Err(e)) => break Err(e),
                        None => break Ok(()),
                    };
                    let (request_no, reply) = match self.respond(&frame).await {
                        Ok(answer) => answer,
                        Err(e) => {
                            // Undecodable requests cannot be answered by number
                            error!("Dropping malformed {:?} frame: {}", frame.msg_type, e);
                            continue;
                        }
                    };
                    if let Err(e) = self.send_reply(&mut writer, request_no, &reply).await {
                        break Err(e);
                    }
                    if let Err(e) = self.push_changes(&mut writer).await {
                        break Err(e);
                    }
                }

                _ = self.host.changes_ready() => {
                    if let Err(e) = self.push_changes(&mut writer).await {
                        break Err(e);
                    }
                }
            }
        };

        read_task.abort();
        match &result {
            Ok(()) => info!("UI connection closed"),
            Err(e) => error!("UI connection failed: {}", e),
        }
        result
    }
}
