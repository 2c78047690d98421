//! Configuration binding scenarios against real files.

use crate::*;

use std::sync::Arc;

use anyhow::Result;

use aquae_core::codec;
use aquae_core::schema::{DaemonConfig, ListenerSpec};
use aquae_node::config;

fn write_sample_files(tag: &str, listeners: Vec<ListenerSpec>) -> Result<std::path::PathBuf> {
    let dir = test_dir(tag);
    let metadata_path = dir.join("federation.meta");
    std::fs::write(&metadata_path, metadata_bytes(&sample_federation()))?;

    let listeners = listeners
        .into_iter()
        .map(|mut spec| {
            if spec.metadata_file.is_none() {
                spec.metadata_file = Some(metadata_path.to_string_lossy().into_owned());
            }
            spec
        })
        .collect();
    let config_path = dir.join("aquae.conf");
    std::fs::write(
        &config_path,
        codec::encode("DaemonConfig", &DaemonConfig { listeners })?,
    )?;
    Ok(config_path)
}

fn listener_spec(node: &str, port: u32, queries: &[&str]) -> ListenerSpec {
    ListenerSpec {
        node_name: Some(node.to_string()),
        port: Some(port),
        metadata_file: None,
        queries: queries.iter().map(|q| q.to_string()).collect(),
    }
}

#[test]
fn two_listeners_share_one_snapshot() {
    let config_path = write_sample_files(
        "share",
        vec![
            listener_spec("A", 9443, &["bb?"]),
            listener_spec("B", 9444, &["bb?"]),
        ],
    )
    .unwrap();

    let bindings = config::load(&config_path).unwrap();
    assert_eq!(bindings.len(), 2);
    assert!(Arc::ptr_eq(&bindings[0].federation, &bindings[1].federation));
    assert!(bindings[0].federation.find_query("bb?").is_some());

    let _ = std::fs::remove_dir_all(config_path.parent().unwrap());
}

#[test]
fn mismatched_port_and_unknown_query_still_bind() {
    // Node A declares 9443 in the metadata; binding it on 10443 and
    // offering an unknown query both warn and continue.
    let config_path = write_sample_files(
        "warns",
        vec![listener_spec("A", 10443, &["bb?", "ghost?"])],
    )
    .unwrap();

    let bindings = config::load(&config_path).unwrap();
    assert_eq!(bindings[0].port, 10443);
    assert_eq!(bindings[0].queries, vec!["bb?", "ghost?"]);

    let _ = std::fs::remove_dir_all(config_path.parent().unwrap());
}

#[test]
fn unknown_listener_node_aborts_startup() {
    let config_path =
        write_sample_files("ghostnode", vec![listener_spec("ghost", 9443, &[])]).unwrap();

    let err = config::load(&config_path).unwrap_err();
    assert!(matches!(err, config::ConfigError::UnknownListenerNode { .. }), "{err}");

    let _ = std::fs::remove_dir_all(config_path.parent().unwrap());
}
