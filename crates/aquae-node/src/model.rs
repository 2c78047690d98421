//! Sanitised domain model — the in-memory federation graph.
//!
//! Everything here is produced by the metadata loader and immutable
//! afterwards. A [`Federation`] snapshot is shared between workers as an
//! `Arc`; workers resolve references against it without locking, which is
//! sound because nothing is ever mutated after load. A metadata reload is
//! a wholesale snapshot replacement, never an in-place edit.
//!
//! Queries live in an arena (`Vec<Query>`, in file declaration order) and
//! reference each other by [`QueryId`] index. Choices can only name queries
//! declared earlier in the file, so the graph is acyclic by construction.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use aquae_core::IdentityAttribute;
use url::Url;

// ── Nodes ─────────────────────────────────────────────────────────────────────

/// A federation peer: named, located, and identified by its TLS certificate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    pub name: String,
    pub hostname: String,
    pub port: u16,
    /// Opaque certificate bytes; also the peer's key in the snapshot's
    /// by-certificate index. Never empty.
    pub certificate: Vec<u8>,
}

impl Node {
    /// The `aquae://host:port/` URI naming this node's endpoint.
    pub fn endpoint(&self) -> String {
        aquae_core::wire::endpoint_uri(&self.hostname, self.port)
    }
}

/// A hostname is acceptable iff it parses as the host component of an
/// `aquae://` URI and survives the round trip byte-for-byte. Anything the
/// URI parser normalises away (ports, userinfo, stray brackets) is rejected.
pub fn hostname_round_trips(hostname: &str) -> bool {
    if hostname.is_empty() {
        return false;
    }
    let candidate = format!("aquae://{hostname}/");
    match Url::parse(&candidate) {
        Ok(url) => url.host_str() == Some(hostname),
        Err(_) => false,
    }
}

// ── Attributes and matching ───────────────────────────────────────────────────

/// A named way a matching process can gain confidence in an identity match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfidenceAttribute {
    pub name: String,
    pub description: String,
}

/// The identity attributes a node needs before it will execute a query.
///
/// Each set is optional and an absent set is distinct from an empty one:
/// "no requirements stated" and "explicitly requires nothing" mean
/// different things to the matching process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MatchingRequirements {
    pub required: Option<BTreeSet<IdentityAttribute>>,
    pub disambiguators: Option<BTreeSet<IdentityAttribute>>,
    pub confidence: Option<BTreeSet<ConfidenceAttribute>>,
}

/// "Node X implements query Q with these matching requirements."
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Implementor {
    pub node: Arc<Node>,
    pub requirements: Option<MatchingRequirements>,
}

// ── Queries ───────────────────────────────────────────────────────────────────

/// Index of a query in the snapshot arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(pub(crate) usize);

impl QueryId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One alternative way to satisfy a query's dependencies: every referenced
/// query must be satisfied. Stored in canonical order (lexicographic by
/// query name), so two choices that differ only in input ordering compare
/// equal. A query may legitimately appear more than once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Choice {
    pub requires: Vec<QueryId>,
}

/// A named question offered by one or more nodes.
#[derive(Debug, Clone)]
pub struct Query {
    name: String,
    implementors: Vec<Implementor>,
    choices: Vec<Choice>,
    by_node: HashMap<String, Vec<usize>>,
    by_requirements: HashMap<Option<MatchingRequirements>, Vec<usize>>,
}

impl Query {
    /// Assemble a query and both secondary indices in one step, so no
    /// caller can observe the indices out of step with the implementors.
    pub(crate) fn new(name: String, implementors: Vec<Implementor>, choices: Vec<Choice>) -> Self {
        let mut by_node: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_requirements: HashMap<Option<MatchingRequirements>, Vec<usize>> = HashMap::new();
        for (position, implementor) in implementors.iter().enumerate() {
            by_node
                .entry(implementor.node.name.clone())
                .or_default()
                .push(position);
            by_requirements
                .entry(implementor.requirements.clone())
                .or_default()
                .push(position);
        }
        Self {
            name,
            implementors,
            choices,
            by_node,
            by_requirements,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn implementors(&self) -> &[Implementor] {
        &self.implementors
    }

    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    /// Implementors contributed by one node.
    pub fn implementors_of(&self, node_name: &str) -> impl Iterator<Item = &Implementor> {
        self.by_node
            .get(node_name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(|&i| &self.implementors[i])
    }

    /// Implementors carrying exactly these matching requirements.
    pub fn implementors_requiring(
        &self,
        requirements: &Option<MatchingRequirements>,
    ) -> impl Iterator<Item = &Implementor> {
        self.by_requirements
            .get(requirements)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(|&i| &self.implementors[i])
    }
}

// ── Agreements ────────────────────────────────────────────────────────────────

/// A data-sharing agreement. Downstream consumers are still stubbed, but
/// the slot is carried in the snapshot and keyed so queries can reference
/// it once the planner lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agreement {
    pub justification: String,
}

// ── Federation snapshot ───────────────────────────────────────────────────────

/// The fully-resolved federation: every reference inside resolves within
/// the snapshot. Built once by the loader, then read-only.
#[derive(Debug, Default)]
pub struct Federation {
    pub(crate) queries: Vec<Query>,
    pub(crate) query_ids: HashMap<String, QueryId>,
    pub(crate) nodes: HashMap<String, Arc<Node>>,
    pub(crate) nodes_by_certificate: HashMap<Vec<u8>, Arc<Node>>,
    pub(crate) confidence_attributes: HashMap<String, ConfidenceAttribute>,
    pub(crate) agreements: HashMap<String, Agreement>,
}

impl Federation {
    pub fn find_query(&self, name: &str) -> Option<&Query> {
        self.query_ids.get(name).map(|&id| &self.queries[id.0])
    }

    pub fn query_id(&self, name: &str) -> Option<QueryId> {
        self.query_ids.get(name).copied()
    }

    /// Arena lookup. A [`QueryId`] can only come from this snapshot, so an
    /// out-of-range index is in-process corruption, not peer input.
    pub fn query(&self, id: QueryId) -> &Query {
        &self.queries[id.0]
    }

    pub fn node(&self, name: &str) -> Option<&Arc<Node>> {
        self.nodes.get(name)
    }

    pub fn node_by_certificate(&self, certificate: &[u8]) -> Option<&Arc<Node>> {
        self.nodes_by_certificate.get(certificate)
    }

    pub fn confidence_attribute(&self, name: &str) -> Option<&ConfidenceAttribute> {
        self.confidence_attributes.get(name)
    }

    pub fn agreement(&self, name: &str) -> Option<&Agreement> {
        self.agreements.get(name)
    }

    pub fn queries(&self) -> impl Iterator<Item = &Query> {
        self.queries.iter()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.values()
    }

    pub fn agreements(&self) -> impl Iterator<Item = (&String, &Agreement)> {
        self.agreements.iter()
    }

    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
