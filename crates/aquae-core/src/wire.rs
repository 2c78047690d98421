//! Aquae wire constants — the fixed points of the framing protocol.
//!
//! These values ARE the protocol. The framing byte, the size ceilings, and
//! the tag assignments of [`MessageType`] and [`IdentityAttribute`] are
//! shared with every other federation node; changing any of them is a
//! breaking change.
//!
//! Tags are mapped through explicit match tables rather than enum ordinal
//! casts, so re-ordering a variant fails to compile instead of silently
//! re-mapping the wire.

// ── Framing constants ────────────────────────────────────────────────────────

/// Protocol version carried in the high nibble of byte 0 of every frame.
pub const PROTOCOL_VERSION: u8 = 0;

/// Byte 0 of every frame: version in the high nibble, reserved low nibble.
/// Both are currently zero, so the whole byte must be zero.
pub const FRAMING_BYTE: u8 = PROTOCOL_VERSION << 4;

/// Maximum declared payload length. A header announcing more is rejected
/// before a single payload byte is read or buffered.
pub const MAX_PAYLOAD: u64 = 1_048_576;

/// Maximum encoded header length. The header length is carried in one
/// byte, so this bound is structural.
pub const MAX_HEADER_LEN: usize = 255;

// ── Message types ─────────────────────────────────────────────────────────────

/// Frame payload type, carried in the header record.
///
/// The wire tags 0..=6 are the protocol contract. Only
/// `IdentitySignRequest` has a decoded body today; `SignedQuery` is opaque
/// until the signing layer decodes it, and the remaining five are reserved
/// (the transport surfaces the type and the raw body).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    IdentitySignRequest,
    SignedQuery,
    BadQueryResponse,
    QueryResponse,
    SecondWhistle,
    QueryAnswer,
    Finish,
}

impl MessageType {
    /// The tag this type is encoded as in a frame header.
    pub fn wire_tag(self) -> u32 {
        match self {
            MessageType::IdentitySignRequest => 0,
            MessageType::SignedQuery => 1,
            MessageType::BadQueryResponse => 2,
            MessageType::QueryResponse => 3,
            MessageType::SecondWhistle => 4,
            MessageType::QueryAnswer => 5,
            MessageType::Finish => 6,
        }
    }

    /// Look a wire tag up in the table. `None` for anything a newer (or
    /// hostile) peer might send.
    pub fn from_wire_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(MessageType::IdentitySignRequest),
            1 => Some(MessageType::SignedQuery),
            2 => Some(MessageType::BadQueryResponse),
            3 => Some(MessageType::QueryResponse),
            4 => Some(MessageType::SecondWhistle),
            5 => Some(MessageType::QueryAnswer),
            6 => Some(MessageType::Finish),
            _ => None,
        }
    }
}

impl TryFrom<u32> for MessageType {
    type Error = WireError;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        Self::from_wire_tag(tag).ok_or(WireError::UnknownMessageType(tag))
    }
}

impl From<MessageType> for u32 {
    fn from(t: MessageType) -> u32 {
        t.wire_tag()
    }
}

// ── Identity attributes ───────────────────────────────────────────────────────

/// One facet of a subject's identity that a matching process can require.
///
/// The wire tags 0..=5 are shared with the metadata schema's id-field
/// enumeration and must stay in lock-step with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentityAttribute {
    Surname,
    Postcode,
    YearOfBirth,
    Initials,
    HouseNumber,
    DateOfBirth,
}

impl IdentityAttribute {
    pub fn wire_tag(self) -> u32 {
        match self {
            IdentityAttribute::Surname => 0,
            IdentityAttribute::Postcode => 1,
            IdentityAttribute::YearOfBirth => 2,
            IdentityAttribute::Initials => 3,
            IdentityAttribute::HouseNumber => 4,
            IdentityAttribute::DateOfBirth => 5,
        }
    }

    pub fn from_wire_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(IdentityAttribute::Surname),
            1 => Some(IdentityAttribute::Postcode),
            2 => Some(IdentityAttribute::YearOfBirth),
            3 => Some(IdentityAttribute::Initials),
            4 => Some(IdentityAttribute::HouseNumber),
            5 => Some(IdentityAttribute::DateOfBirth),
            _ => None,
        }
    }
}

impl TryFrom<u32> for IdentityAttribute {
    type Error = WireError;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        Self::from_wire_tag(tag).ok_or(WireError::UnknownIdentityAttribute(tag))
    }
}

// ── Endpoint naming ───────────────────────────────────────────────────────────

/// The canonical URI naming a node endpoint.
pub fn endpoint_uri(host: &str, port: u16) -> String {
    format!("aquae://{host}:{port}/")
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format tags.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unknown message type tag: {0}")]
    UnknownMessageType(u32),

    #[error("unknown identity attribute tag: {0}")]
    UnknownIdentityAttribute(u32),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
