//! Raw record schemas — the shape of everything that crosses a wire or
//! lives in a file, before any validation.
//!
//! Every scalar field is an `Option` so a missing field is representable:
//! the codec only guarantees structural validity, and presence checking
//! belongs to the layer that owns the record (the metadata loader for the
//! federation file, the framing layer for the header, the configuration
//! loader for the daemon config). None of these records resolve
//! cross-references.

use serde::{Deserialize, Serialize};

// ── Frame header ─────────────────────────────────────────────────────────────

/// The header record of every frame: declared payload length and payload
/// type tag. Both fields are required on the wire; absence is a peer error
/// detected while parsing the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub payload_length: Option<u64>,
    pub message_type: Option<u32>,
}

// ── Message bodies ────────────────────────────────────────────────────────────

/// Body of an IDENTITY_SIGN_REQUEST frame: the subject whose identity is to
/// be attested, plus the names of the nodes forming the identity set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySignRequest {
    pub subject: Option<SubjectIdentity>,
    pub identity_set: Vec<String>,
}

/// A subject identity: one optional value per identity attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectIdentity {
    pub surname: Option<String>,
    pub postcode: Option<String>,
    pub year_of_birth: Option<String>,
    pub initials: Option<String>,
    pub house_number: Option<String>,
    pub date_of_birth: Option<String>,
}

// ── Metadata file ─────────────────────────────────────────────────────────────

/// Root record of a federation metadata file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationFile {
    pub nodes: Vec<NodeRecord>,
    pub agreements: Vec<DsaRecord>,
    pub confidence_attributes: Vec<ConfidenceRecord>,
    pub queries: Vec<QuerySpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: Option<String>,
    pub location: Option<LocationRecord>,
    pub certificate: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub hostname: Option<String>,
    pub port: Option<u32>,
}

/// A data-sharing agreement record. Downstream use is still stubbed, but
/// the record is carried through to the snapshot rather than dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsaRecord {
    pub name: Option<String>,
    pub justification: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceRecord {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub name: Option<String>,
    pub implementors: Vec<ImplementingNode>,
    pub choices: Vec<ChoiceSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementingNode {
    pub node_id: Option<String>,
    pub matching: Option<MatchingSpec>,
}

/// Matching requirements as declared in the file. Identity attributes are
/// wire tags here; the loader translates them through the explicit table.
/// Each list is optional, and an absent list is distinct from an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingSpec {
    pub required: Option<Vec<u32>>,
    pub disambiguators: Option<Vec<u32>>,
    pub confidence_builders: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceSpec {
    pub requires: Vec<String>,
}

// ── Daemon configuration ──────────────────────────────────────────────────────

/// Root record of the daemon configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    pub listeners: Vec<ListenerSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerSpec {
    pub node_name: Option<String>,
    pub port: Option<u32>,
    pub metadata_file: Option<String>,
    pub queries: Vec<String>,
}
