//! Aquae integration test harness.
//!
//! End-to-end scenarios against in-memory streams and loopback TCP: no
//! external environment is required. Each module covers one subsystem:
//! metadata loading, transport framing, and configuration binding.

mod config;
mod framing;
mod metadata;

use std::path::PathBuf;

use aquae_core::codec;
use aquae_core::schema::{
    ConfidenceRecord, FederationFile, ImplementingNode, LocationRecord, MatchingSpec, NodeRecord,
    QuerySpec,
};

// ── Shared builders ───────────────────────────────────────────────────────────

pub fn node_record(name: &str) -> NodeRecord {
    NodeRecord {
        name: Some(name.to_string()),
        location: Some(LocationRecord {
            hostname: Some(format!("{}.example.org", name.to_lowercase())),
            port: Some(9443),
        }),
        certificate: Some(format!("cert:{name}").into_bytes()),
    }
}

pub fn implementor(node: &str, required_tags: Option<Vec<u32>>) -> ImplementingNode {
    ImplementingNode {
        node_id: Some(node.to_string()),
        matching: required_tags.map(|tags| MatchingSpec {
            required: Some(tags),
            disambiguators: None,
            confidence_builders: None,
        }),
    }
}

pub fn query_spec(name: &str, implementors: Vec<ImplementingNode>) -> QuerySpec {
    QuerySpec {
        name: Some(name.to_string()),
        implementors,
        choices: Vec::new(),
    }
}

/// The federation of the load-and-look-up scenario: nodes `A` and `B`,
/// confidence attribute `confA`, query `bb?` implemented by both nodes
/// with required = {SURNAME, POSTCODE}.
pub fn sample_federation() -> FederationFile {
    FederationFile {
        nodes: vec![node_record("A"), node_record("B")],
        agreements: Vec::new(),
        confidence_attributes: vec![ConfidenceRecord {
            name: Some("confA".into()),
            description: Some("supplementary identifier".into()),
        }],
        queries: vec![query_spec(
            "bb?",
            vec![
                implementor("A", Some(vec![0, 1])),
                implementor("B", Some(vec![0, 1])),
            ],
        )],
    }
}

pub fn metadata_bytes(file: &FederationFile) -> Vec<u8> {
    codec::encode("Federation", file).expect("test federation must encode")
}

/// Fresh scratch directory for tests that need real files.
pub fn test_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("aquae-integration-{}-{tag}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create test dir");
    dir
}
