//! Transport framing — the per-connection decode state machine.
//!
//! A frame is: one framing byte (version high nibble, reserved low nibble,
//! both zero), one header-length byte, the encoded header record (declared
//! payload length and message type), then the payload. The session walks
//! the states below one completed I/O step at a time and never
//! desynchronises: every validation failure or premature end-of-stream is
//! a [`PeerError`] that tears the session down.
//!
//! ```text
//! WaitingForFrame → ReadFirstByte → ReadHeaderLength → WaitingForHeader
//!   → ReadingHeader → ParsingHeader → WaitingForPayload
//!   → ReadingPayload → ReadPayload → WaitingForFrame
//! ```
//!
//! [`Session::read_frame`] drives the walk up to `WaitingForPayload` and
//! returns the validated message type; a typed body reader finishes the
//! frame and hands the body to the caller. Calling either in the wrong
//! state is API misuse, not peer input, and fails the assertions below:
//! the offending worker task dies, the listener and other sessions do not.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use aquae_core::codec::{self, CodecError};
use aquae_core::schema::{Header, IdentitySignRequest};
use aquae_core::wire::{self, MessageType};

// ── Session state ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    WaitingForFrame,
    ReadFirstByte,
    ReadHeaderLength,
    WaitingForHeader,
    ReadingHeader,
    ParsingHeader,
    WaitingForPayload,
    ReadingPayload,
    ReadPayload,
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Malformed input read from the wire. Recoverable at session granularity:
/// log, close the session, leave the listener and other sessions alone.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("framing byte 0x{0:02x} is not version 0 with reserved bits clear")]
    BadFramingByte(u8),

    #[error("header length byte is zero")]
    EmptyHeader,

    #[error(transparent)]
    HeaderDecode(CodecError),

    #[error("frame header is missing required field {0}")]
    MissingHeaderField(&'static str),

    #[error("unknown message type tag {0}")]
    UnknownMessageType(u32),

    #[error("declared payload length {0} exceeds the {max}-byte ceiling", max = wire::MAX_PAYLOAD)]
    PayloadTooLarge(u64),

    #[error("stream ended mid-frame in state {0:?}")]
    UnexpectedEof(SessionState),

    #[error(transparent)]
    BodyDecode(CodecError),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("peer protocol error: {0}")]
    Peer(#[from] PeerError),

    #[error("stream error: {0}")]
    Io(#[from] std::io::Error),

    #[error("outbound payload of {0} bytes exceeds the frame ceiling")]
    OversizedWrite(usize),

    #[error("outbound frame header failed to encode: {0}")]
    HeaderEncode(CodecError),
}

// ── Session ───────────────────────────────────────────────────────────────────

/// One connection's framing state. Reads within a session are strictly
/// sequential; the state machine forbids overlap.
pub struct Session<S> {
    stream: S,
    state: SessionState,
    expected: Option<MessageType>,
    remaining: usize,
    payload: BytesMut,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            state: SessionState::WaitingForFrame,
            expected: None,
            remaining: 0,
            payload: BytesMut::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The payload type announced by the last decoded header, until its
    /// body has been read.
    pub fn expected(&self) -> Option<MessageType> {
        self.expected
    }

    /// Read and validate one frame up to its payload boundary.
    ///
    /// Returns the frame's message type, or `None` if the peer closed the
    /// stream cleanly between frames. End-of-stream anywhere else is a
    /// [`PeerError::UnexpectedEof`].
    pub async fn read_frame(&mut self) -> Result<Option<MessageType>, SessionError> {
        assert_eq!(
            self.state,
            SessionState::WaitingForFrame,
            "read_frame called mid-frame"
        );
        assert!(
            self.expected.is_none(),
            "read_frame called with an unread payload pending"
        );
        assert_eq!(self.remaining, 0, "read_frame called with payload bytes remaining");
        assert!(self.payload.is_empty(), "read_frame called with a payload buffer allocated");

        let mut byte = [0u8; 1];

        // Byte 0: framing byte. The only place end-of-stream is clean.
        if self.stream.read(&mut byte).await? == 0 {
            return Ok(None);
        }
        self.state = SessionState::ReadFirstByte;
        if byte[0] != wire::FRAMING_BYTE {
            return Err(PeerError::BadFramingByte(byte[0]).into());
        }

        // Byte 1: header length.
        if self.stream.read(&mut byte).await? == 0 {
            return Err(PeerError::UnexpectedEof(self.state).into());
        }
        self.state = SessionState::ReadHeaderLength;
        let header_len = byte[0] as usize;
        if header_len == 0 {
            // No header-less message is defined.
            return Err(PeerError::EmptyHeader.into());
        }

        // H header bytes.
        let mut header = vec![0u8; header_len];
        self.state = SessionState::WaitingForHeader;
        let mut filled = 0;
        while filled < header_len {
            let n = self.stream.read(&mut header[filled..]).await?;
            if n == 0 {
                return Err(PeerError::UnexpectedEof(self.state).into());
            }
            self.state = SessionState::ReadingHeader;
            filled += n;
        }
        self.state = SessionState::ParsingHeader;

        let record: Header = codec::decode("Header", &header).map_err(PeerError::HeaderDecode)?;
        let declared = record
            .payload_length
            .ok_or(PeerError::MissingHeaderField("payload_length"))?;
        let tag = record
            .message_type
            .ok_or(PeerError::MissingHeaderField("message_type"))?;
        // Bound the payload before anything is allocated for it.
        if declared > wire::MAX_PAYLOAD {
            return Err(PeerError::PayloadTooLarge(declared).into());
        }
        let message_type =
            MessageType::from_wire_tag(tag).ok_or(PeerError::UnknownMessageType(tag))?;

        self.expected = Some(message_type);
        self.remaining = declared as usize;
        self.state = SessionState::WaitingForPayload;
        Ok(Some(message_type))
    }

    /// Read the pending payload as raw bytes. `accept` must match the type
    /// announced by the frame header; the five reserved message types and
    /// SIGNED_QUERY are surfaced this way until their layers define bodies.
    pub async fn read_body(&mut self, accept: MessageType) -> Result<Bytes, SessionError> {
        assert_eq!(
            self.state,
            SessionState::WaitingForPayload,
            "body read without a parsed frame header"
        );
        assert_eq!(
            self.expected,
            Some(accept),
            "body read for the wrong message type"
        );

        if self.remaining == 0 {
            self.state = SessionState::ReadPayload;
        } else {
            self.state = SessionState::ReadingPayload;
            self.payload.resize(self.remaining, 0);
            let mut filled = 0;
            while filled < self.remaining {
                let n = self.stream.read(&mut self.payload[filled..]).await?;
                if n == 0 {
                    return Err(PeerError::UnexpectedEof(self.state).into());
                }
                filled += n;
            }
            self.state = SessionState::ReadPayload;
        }

        let body = self.payload.split().freeze();
        self.expected = None;
        self.remaining = 0;
        self.state = SessionState::WaitingForFrame;
        Ok(body)
    }

    /// Read and decode an IDENTITY_SIGN_REQUEST body.
    pub async fn read_identity_sign_request(&mut self) -> Result<IdentitySignRequest, SessionError> {
        let body = self.read_body(MessageType::IdentitySignRequest).await?;
        codec::decode("IdentitySignRequest", &body)
            .map_err(|e| PeerError::BodyDecode(e).into())
    }

    /// Read a SIGNED_QUERY body. Opaque at this layer; the signing layer
    /// decodes and verifies it.
    pub async fn read_signed_query(&mut self) -> Result<Bytes, SessionError> {
        self.read_body(MessageType::SignedQuery).await
    }

    /// Write one frame: framing byte, header length, header record,
    /// payload, in that order.
    pub async fn write_frame(
        &mut self,
        message_type: MessageType,
        payload: &[u8],
    ) -> Result<(), SessionError> {
        if payload.len() as u64 > wire::MAX_PAYLOAD {
            return Err(SessionError::OversizedWrite(payload.len()));
        }
        let header = Header {
            payload_length: Some(payload.len() as u64),
            message_type: Some(message_type.wire_tag()),
        };
        let header_bytes =
            codec::encode("Header", &header).map_err(SessionError::HeaderEncode)?;
        assert!(
            header_bytes.len() <= wire::MAX_HEADER_LEN,
            "encoded frame header exceeds one length byte"
        );

        self.stream
            .write_all(&[wire::FRAMING_BYTE, header_bytes.len() as u8])
            .await?;
        self.stream.write_all(&header_bytes).await?;
        self.stream.write_all(payload).await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
