//! Metadata loader — turns a federation file into a resolved snapshot.
//!
//! The load runs in phases, each completing before the next: decode the
//! root record, check structural completeness of every record, intern
//! nodes, intern confidence attributes, intern agreements, then build the
//! query graph in declaration order. Choice references resolve only against
//! queries already interned, so forward references (and therefore cycles)
//! are rejected.
//!
//! Any failure aborts the whole load; a partially-valid snapshot is never
//! produced.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aquae_core::codec::{self, CodecError};
use aquae_core::schema::{
    ConfidenceRecord, DsaRecord, FederationFile, MatchingSpec, NodeRecord, QuerySpec,
};
use aquae_core::IdentityAttribute;

use crate::model::{
    hostname_round_trips, Agreement, Choice, ConfidenceAttribute, Federation, Implementor,
    MatchingRequirements, Node, Query, QueryId,
};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Fatal metadata errors. Every variant names the record kind, the record
/// (by name, or by position when the name itself is missing), and the
/// offending field; the caller that knows the file path attaches it.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error(transparent)]
    Decode(#[from] CodecError),

    #[error("{record} record {name}: missing required field {field}")]
    MissingField {
        record: &'static str,
        name: String,
        field: &'static str,
    },

    #[error("node {0} declared more than once")]
    DuplicateNode(String),

    #[error("nodes {first} and {second} share a TLS certificate")]
    DuplicateCertificate { first: String, second: String },

    #[error("node {node}: hostname {hostname:?} does not round-trip as a URI host")]
    InvalidHostname { node: String, hostname: String },

    #[error("node {node}: port {port} is outside 1..=65535")]
    InvalidPort { node: String, port: u32 },

    #[error("node {0}: certificate is empty")]
    EmptyCertificate(String),

    #[error("confidence attribute {0} declared more than once")]
    DuplicateConfidenceAttribute(String),

    #[error("agreement {0} declared more than once")]
    DuplicateAgreement(String),

    #[error("query {0} declared more than once")]
    DuplicateQuery(String),

    #[error("query {query}: implementing node {node} is not declared in this federation")]
    UnknownNode { query: String, node: String },

    #[error("query {query}: unknown identity attribute tag {tag} in {field}")]
    UnknownIdentityAttribute {
        query: String,
        field: &'static str,
        tag: u32,
    },

    #[error("query {query}: duplicate entry in {field}")]
    DuplicateListEntry { query: String, field: &'static str },

    #[error("query {query}: confidence builder {name} is not declared in this federation")]
    UnknownConfidenceAttribute { query: String, name: String },

    #[error("query {query}: node {node} implements it twice with identical matching requirements")]
    DuplicateImplementor { query: String, node: String },

    #[error("query {query}: choice requires {requires}, which is not declared earlier in the file")]
    UnresolvedChoice { query: String, requires: String },

    #[error("query {query}: duplicate choice [{requires}]")]
    DuplicateChoice { query: String, requires: String },
}

// ── Entry points ──────────────────────────────────────────────────────────────

/// Load and resolve a federation metadata file.
pub fn load_file(path: &Path) -> Result<Federation, MetadataError> {
    let bytes = std::fs::read(path).map_err(|e| MetadataError::Read(path.to_path_buf(), e))?;
    load_bytes(&bytes)
}

/// Load and resolve a federation from an in-memory buffer.
pub fn load_bytes(bytes: &[u8]) -> Result<Federation, MetadataError> {
    let file: FederationFile = codec::decode("Federation", bytes)?;
    check_completeness(&file)?;

    let mut federation = Federation::default();
    intern_nodes(&file, &mut federation)?;
    intern_confidence_attributes(&file, &mut federation)?;
    intern_agreements(&file, &mut federation)?;
    build_queries(&file, &mut federation)?;

    tracing::debug!(
        nodes = federation.node_count(),
        queries = federation.query_count(),
        agreements = federation.agreements.len(),
        "federation snapshot loaded"
    );
    Ok(federation)
}

// ── Phase 2: structural completeness ──────────────────────────────────────────

/// Positional label for a record whose own name is missing.
fn record_label(name: &Option<String>, index: usize) -> String {
    name.clone().unwrap_or_else(|| format!("#{index}"))
}

fn check_completeness(file: &FederationFile) -> Result<(), MetadataError> {
    for (index, node) in file.nodes.iter().enumerate() {
        node_fields(node, index)?;
    }
    for (index, dsa) in file.agreements.iter().enumerate() {
        dsa_fields(dsa, index)?;
    }
    for (index, attr) in file.confidence_attributes.iter().enumerate() {
        confidence_fields(attr, index)?;
    }
    for (index, query) in file.queries.iter().enumerate() {
        query_shape(query, index)?;
    }
    Ok(())
}

struct NodeFields<'a> {
    name: &'a str,
    hostname: &'a str,
    port: u32,
    certificate: &'a [u8],
}

fn node_fields(record: &NodeRecord, index: usize) -> Result<NodeFields<'_>, MetadataError> {
    let label = record_label(&record.name, index);
    let missing = |field| MetadataError::MissingField {
        record: "Node",
        name: label.clone(),
        field,
    };
    let name = record.name.as_deref().ok_or_else(|| missing("name"))?;
    let location = record.location.as_ref().ok_or_else(|| missing("location"))?;
    let hostname = location.hostname.as_deref().ok_or_else(|| missing("hostname"))?;
    let port = location.port.ok_or_else(|| missing("port"))?;
    let certificate = record
        .certificate
        .as_deref()
        .ok_or_else(|| missing("certificate"))?;
    Ok(NodeFields {
        name,
        hostname,
        port,
        certificate,
    })
}

fn dsa_fields(record: &DsaRecord, index: usize) -> Result<(&str, &str), MetadataError> {
    let name = record.name.as_deref().ok_or_else(|| MetadataError::MissingField {
        record: "DSA",
        name: record_label(&record.name, index),
        field: "name",
    })?;
    // Justification is carried as-is; an absent one is tolerated while the
    // agreement layer is stubbed.
    Ok((name, record.justification.as_deref().unwrap_or("")))
}

fn confidence_fields(record: &ConfidenceRecord, index: usize) -> Result<(&str, &str), MetadataError> {
    let label = record_label(&record.name, index);
    let missing = |field| MetadataError::MissingField {
        record: "ConfidenceAttribute",
        name: label.clone(),
        field,
    };
    let name = record.name.as_deref().ok_or_else(|| missing("name"))?;
    let description = record.description.as_deref().ok_or_else(|| missing("description"))?;
    Ok((name, description))
}

fn query_shape(record: &QuerySpec, index: usize) -> Result<&str, MetadataError> {
    let label = record_label(&record.name, index);
    let missing = |record_kind, name: &String, field| MetadataError::MissingField {
        record: record_kind,
        name: name.clone(),
        field,
    };
    let name = record
        .name
        .as_deref()
        .ok_or_else(|| missing("Query", &label, "name"))?;
    if record.implementors.is_empty() {
        return Err(missing("Query", &label, "implementors"));
    }
    for implementor in &record.implementors {
        if implementor.node_id.is_none() {
            return Err(missing("ImplementingNode", &label, "node_id"));
        }
    }
    for choice in &record.choices {
        if choice.requires.is_empty() {
            return Err(missing("Choice", &label, "requires"));
        }
    }
    Ok(name)
}

// ── Phase 3: nodes ────────────────────────────────────────────────────────────

fn intern_nodes(file: &FederationFile, federation: &mut Federation) -> Result<(), MetadataError> {
    for (index, record) in file.nodes.iter().enumerate() {
        let fields = node_fields(record, index)?;

        if !(1..=u32::from(u16::MAX)).contains(&fields.port) {
            return Err(MetadataError::InvalidPort {
                node: fields.name.to_string(),
                port: fields.port,
            });
        }
        if !hostname_round_trips(fields.hostname) {
            return Err(MetadataError::InvalidHostname {
                node: fields.name.to_string(),
                hostname: fields.hostname.to_string(),
            });
        }
        if fields.certificate.is_empty() {
            return Err(MetadataError::EmptyCertificate(fields.name.to_string()));
        }
        if federation.nodes.contains_key(fields.name) {
            return Err(MetadataError::DuplicateNode(fields.name.to_string()));
        }
        if let Some(holder) = federation.nodes_by_certificate.get(fields.certificate) {
            return Err(MetadataError::DuplicateCertificate {
                first: holder.name.clone(),
                second: fields.name.to_string(),
            });
        }

        let node = Arc::new(Node {
            name: fields.name.to_string(),
            hostname: fields.hostname.to_string(),
            port: fields.port as u16,
            certificate: fields.certificate.to_vec(),
        });
        tracing::trace!(node = %node.name, endpoint = %node.endpoint(), "interned node");
        federation
            .nodes_by_certificate
            .insert(node.certificate.clone(), node.clone());
        federation.nodes.insert(node.name.clone(), node);
    }
    Ok(())
}

// ── Phase 4: confidence attributes ────────────────────────────────────────────

fn intern_confidence_attributes(
    file: &FederationFile,
    federation: &mut Federation,
) -> Result<(), MetadataError> {
    for (index, record) in file.confidence_attributes.iter().enumerate() {
        let (name, description) = confidence_fields(record, index)?;
        if federation.confidence_attributes.contains_key(name) {
            return Err(MetadataError::DuplicateConfidenceAttribute(name.to_string()));
        }
        federation.confidence_attributes.insert(
            name.to_string(),
            ConfidenceAttribute {
                name: name.to_string(),
                description: description.to_string(),
            },
        );
    }
    Ok(())
}

// ── Phase 5: agreements ───────────────────────────────────────────────────────

fn intern_agreements(file: &FederationFile, federation: &mut Federation) -> Result<(), MetadataError> {
    for (index, record) in file.agreements.iter().enumerate() {
        let (name, justification) = dsa_fields(record, index)?;
        if federation.agreements.contains_key(name) {
            return Err(MetadataError::DuplicateAgreement(name.to_string()));
        }
        tracing::trace!(agreement = name, "interned agreement");
        federation.agreements.insert(
            name.to_string(),
            Agreement {
                justification: justification.to_string(),
            },
        );
    }
    Ok(())
}

// ── Phase 6: queries ──────────────────────────────────────────────────────────

fn build_queries(file: &FederationFile, federation: &mut Federation) -> Result<(), MetadataError> {
    for (index, spec) in file.queries.iter().enumerate() {
        let name = query_shape(spec, index)?;
        if federation.query_ids.contains_key(name) {
            return Err(MetadataError::DuplicateQuery(name.to_string()));
        }

        let mut implementors: Vec<Implementor> = Vec::with_capacity(spec.implementors.len());
        for record in &spec.implementors {
            let node_id = record.node_id.as_deref().ok_or_else(|| {
                MetadataError::MissingField {
                    record: "ImplementingNode",
                    name: name.to_string(),
                    field: "node_id",
                }
            })?;
            let node = federation
                .nodes
                .get(node_id)
                .cloned()
                .ok_or_else(|| MetadataError::UnknownNode {
                    query: name.to_string(),
                    node: node_id.to_string(),
                })?;
            let requirements = match &record.matching {
                Some(spec) => Some(build_requirements(name, spec, federation)?),
                None => None,
            };
            let implementor = Implementor { node, requirements };
            if implementors.contains(&implementor) {
                return Err(MetadataError::DuplicateImplementor {
                    query: name.to_string(),
                    node: node_id.to_string(),
                });
            }
            implementors.push(implementor);
        }

        let mut choices: Vec<Choice> = Vec::with_capacity(spec.choices.len());
        for record in &spec.choices {
            // Canonical order first, then resolve against the queries
            // interned so far. Forward references never resolve.
            let mut required_names: Vec<&String> = record.requires.iter().collect();
            required_names.sort();
            let mut requires = Vec::with_capacity(required_names.len());
            for required in required_names {
                let id = federation.query_ids.get(required).copied().ok_or_else(|| {
                    MetadataError::UnresolvedChoice {
                        query: name.to_string(),
                        requires: required.clone(),
                    }
                })?;
                requires.push(id);
            }
            let choice = Choice { requires };
            if choices.contains(&choice) {
                return Err(MetadataError::DuplicateChoice {
                    query: name.to_string(),
                    requires: record.requires.join(", "),
                });
            }
            choices.push(choice);
        }

        let id = QueryId(federation.queries.len());
        federation
            .queries
            .push(Query::new(name.to_string(), implementors, choices));
        federation.query_ids.insert(name.to_string(), id);
        tracing::trace!(query = name, "interned query");
    }
    Ok(())
}

fn build_requirements(
    query: &str,
    spec: &MatchingSpec,
    federation: &Federation,
) -> Result<MatchingRequirements, MetadataError> {
    let required = match &spec.required {
        Some(tags) => Some(attribute_set(query, "required", tags)?),
        None => None,
    };
    let disambiguators = match &spec.disambiguators {
        Some(tags) => Some(attribute_set(query, "disambiguators", tags)?),
        None => None,
    };
    let confidence = match &spec.confidence_builders {
        Some(names) => {
            let mut set = BTreeSet::new();
            for builder in names {
                let attribute = federation
                    .confidence_attributes
                    .get(builder)
                    .cloned()
                    .ok_or_else(|| MetadataError::UnknownConfidenceAttribute {
                        query: query.to_string(),
                        name: builder.clone(),
                    })?;
                if !set.insert(attribute) {
                    return Err(MetadataError::DuplicateListEntry {
                        query: query.to_string(),
                        field: "confidence_builders",
                    });
                }
            }
            Some(set)
        }
        None => None,
    };
    Ok(MatchingRequirements {
        required,
        disambiguators,
        confidence,
    })
}

fn attribute_set(
    query: &str,
    field: &'static str,
    tags: &[u32],
) -> Result<BTreeSet<IdentityAttribute>, MetadataError> {
    let mut set = BTreeSet::new();
    for &tag in tags {
        let attribute = IdentityAttribute::from_wire_tag(tag).ok_or_else(|| {
            MetadataError::UnknownIdentityAttribute {
                query: query.to_string(),
                field,
                tag,
            }
        })?;
        if !set.insert(attribute) {
            return Err(MetadataError::DuplicateListEntry {
                query: query.to_string(),
                field,
            });
        }
    }
    Ok(set)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
