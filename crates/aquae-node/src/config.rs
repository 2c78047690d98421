//! Configuration loader — binds listener ports to federation snapshots.
//!
//! The daemon config names one metadata file per listener. Identical
//! canonicalised paths load once and share one snapshot; every binding
//! holds an `Arc` to its federation. All validation failures are fatal
//! before any listener is opened. Two conditions are deliberately only
//! warnings: a listener port that differs from the node's declared port,
//! and an offered query name the snapshot does not know.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aquae_core::codec::{self, CodecError};
use aquae_core::schema::{DaemonConfig, ListenerSpec};

use crate::loader::{self, MetadataError};
use crate::model::Federation;

/// One listener's identity, port, snapshot, and offered queries.
#[derive(Clone, Debug)]
pub struct ListenerBinding {
    /// Our node name on this port. Always resolves in `federation`.
    pub node_name: String,
    pub port: u16,
    pub federation: Arc<Federation>,
    /// Offered query names as configured; names the snapshot does not know
    /// were warned about at load time but are kept verbatim.
    pub queries: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("{0}: {1}")]
    Decode(PathBuf, CodecError),

    #[error("listener {0}: missing required field {1}")]
    MissingField(String, &'static str),

    #[error("listener {0}: port {1} is outside 1..=65535")]
    InvalidPort(String, u32),

    #[error("metadata file {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: MetadataError,
    },

    #[error("listener {listener}: node {node} is not declared in {path}")]
    UnknownListenerNode {
        listener: String,
        node: String,
        path: PathBuf,
    },
}

/// Load the daemon configuration and build one binding per listener.
pub fn load(path: &Path) -> Result<Vec<ListenerBinding>, ConfigError> {
    let bytes = std::fs::read(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    let config: DaemonConfig =
        codec::decode("DaemonConfig", &bytes).map_err(|e| ConfigError::Decode(path.to_path_buf(), e))?;
    bind(&config)
}

/// Build bindings from an already-decoded configuration.
pub fn bind(config: &DaemonConfig) -> Result<Vec<ListenerBinding>, ConfigError> {
    let mut snapshots: HashMap<PathBuf, Arc<Federation>> = HashMap::new();
    let mut bindings = Vec::with_capacity(config.listeners.len());

    for (index, spec) in config.listeners.iter().enumerate() {
        bindings.push(bind_listener(spec, index, &mut snapshots)?);
    }
    Ok(bindings)
}

fn bind_listener(
    spec: &ListenerSpec,
    index: usize,
    snapshots: &mut HashMap<PathBuf, Arc<Federation>>,
) -> Result<ListenerBinding, ConfigError> {
    let label = spec
        .node_name
        .clone()
        .unwrap_or_else(|| format!("#{index}"));
    let missing = |field| ConfigError::MissingField(label.clone(), field);

    let node_name = spec.node_name.as_deref().ok_or_else(|| missing("node_name"))?;
    let port = spec.port.ok_or_else(|| missing("port"))?;
    if !(1..=u32::from(u16::MAX)).contains(&port) {
        return Err(ConfigError::InvalidPort(label.clone(), port));
    }
    let metadata_file = spec
        .metadata_file
        .as_deref()
        .ok_or_else(|| missing("metadata_file"))?;

    // Canonicalise so two spellings of one file share one snapshot. A path
    // that cannot canonicalise is left as-is and fails in the loader with
    // a readable error.
    let nominal = PathBuf::from(metadata_file);
    let canonical = std::fs::canonicalize(&nominal).unwrap_or(nominal);

    let federation = match snapshots.get(&canonical) {
        Some(existing) => existing.clone(),
        None => {
            let loaded =
                loader::load_file(&canonical).map_err(|source| ConfigError::Metadata {
                    path: canonical.clone(),
                    source,
                })?;
            let loaded = Arc::new(loaded);
            snapshots.insert(canonical.clone(), loaded.clone());
            loaded
        }
    };

    let node = federation
        .node(node_name)
        .ok_or_else(|| ConfigError::UnknownListenerNode {
            listener: label.clone(),
            node: node_name.to_string(),
            path: canonical.clone(),
        })?;
    if u32::from(node.port) != port {
        tracing::warn!(
            listener = node_name,
            declared = node.port,
            bound = port,
            "listener port differs from the node's declared port"
        );
    }
    for query in &spec.queries {
        if federation.find_query(query).is_none() {
            tracing::warn!(
                listener = node_name,
                query = %query,
                "offered query is not declared in the federation"
            );
        }
    }

    Ok(ListenerBinding {
        node_name: node_name.to_string(),
        port: port as u16,
        federation,
        queries: spec.queries.clone(),
    })
}
