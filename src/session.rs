//! RPC session — correlates requests with responses over framed streams.
//!
//! The scenario in scope issues one request at a time, so the session is a
//! plain sequential loop over the transport rather than a task-per-stream
//! dispatcher: allocate an id, write the frame, read frames until the
//! matching response arrives. Server-initiated requests get a
//! "method not found" reply so the server never blocks on us; interleaved
//! notifications are logged and skipped.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{FrameReader, FrameWriter};
use crate::error::{FramingError, HarnessError};
use crate::protocol::{self, Incoming, Notification, Request, ResponsePayload};

pub struct Session<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    next_id: u64,
    /// The single in-flight request id, if any. A future extension to
    /// concurrent requests would widen this into a pending map.
    outstanding: Option<u64>,
    request_timeout: Duration,
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> Session<R, W> {
    pub fn new(reader: R, writer: W, request_timeout: Duration) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
            next_id: 1,
            outstanding: None,
            request_timeout,
        }
    }

    /// Send a request and return its freshly allocated id.
    pub async fn send_request(
        &mut self,
        method: &'static str,
        params: Option<serde_json::Value>,
    ) -> Result<u64, HarnessError> {
        debug_assert!(
            self.outstanding.is_none(),
            "protocol in scope never overlaps requests"
        );
        let id = self.next_id;
        self.next_id += 1;
        self.outstanding = Some(id);

        let request = Request::new(id, method, params);
        let frame = serde_json::to_value(&request).map_err(|e| HarnessError::Protocol {
            detail: format!("serializing {method} request: {e}"),
        })?;
        self.writer.write_frame(&frame).await?;
        tracing::debug!(method, id, "sent request");
        Ok(id)
    }

    /// Send a notification. Fire-and-forget by protocol contract.
    pub async fn send_notification(
        &mut self,
        method: &'static str,
        params: Option<serde_json::Value>,
    ) -> Result<(), HarnessError> {
        let notification = Notification::new(method, params);
        let frame = serde_json::to_value(&notification).map_err(|e| HarnessError::Protocol {
            detail: format!("serializing {method} notification: {e}"),
        })?;
        self.writer.write_frame(&frame).await?;
        tracing::debug!(method, "sent notification");
        Ok(())
    }

    /// Read one frame and classify it.
    ///
    /// A response whose id matches no outstanding request is a
    /// [`HarnessError::Correlation`]; a matching response settles the
    /// outstanding slot. EOF here means the server closed its stream while
    /// we still expected traffic.
    pub async fn receive(&mut self) -> Result<Incoming, HarnessError> {
        let body = match self.reader.read_frame().await? {
            Some(body) => body,
            None => return Err(FramingError::UnexpectedEof.into()),
        };

        let frame: serde_json::Value =
            serde_json::from_slice(&body).map_err(|e| HarnessError::Protocol {
                detail: format!("frame body is not valid JSON: {e}"),
            })?;

        let incoming = protocol::classify(&frame).ok_or_else(|| HarnessError::Protocol {
            detail: "frame fits no JSON-RPC shape (request, notification, or response)".to_string(),
        })?;

        if let Incoming::Response { id, .. } = &incoming {
            match self.outstanding {
                Some(expected) if expected == *id => self.outstanding = None,
                _ => return Err(HarnessError::Correlation { id: *id }),
            }
        }

        Ok(incoming)
    }

    /// Drive a request to its correlated response, under the session's
    /// timeout. Interleaved server requests are answered with -32601 and
    /// notifications are skipped.
    pub async fn request(
        &mut self,
        method: &'static str,
        params: Option<serde_json::Value>,
    ) -> Result<ResponsePayload, HarnessError> {
        self.send_request(method, params).await?;

        let timeout = self.request_timeout;
        let wait = async {
            loop {
                match self.receive().await? {
                    Incoming::Response { payload, .. } => return Ok(payload),
                    Incoming::ServerRequest { id, method } => {
                        tracing::debug!(%method, "server request while awaiting response; replying method not found");
                        self.writer
                            .write_frame(&protocol::method_not_found(&id, &method))
                            .await?;
                    }
                    Incoming::Notification { method, .. } => {
                        tracing::debug!(%method, "notification while awaiting response");
                    }
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.outstanding = None;
                Err(HarnessError::RequestTimeout {
                    method,
                    seconds: timeout.as_secs(),
                })
            }
        }
    }
}
