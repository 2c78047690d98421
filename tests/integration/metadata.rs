//! Metadata loading scenarios: resolution, uniqueness, choice ordering.

use crate::*;

use aquae_core::schema::ChoiceSpec;
use aquae_core::IdentityAttribute;
use aquae_node::loader::{self, MetadataError};

#[test]
fn load_and_look_up() {
    let federation = loader::load_bytes(&metadata_bytes(&sample_federation())).unwrap();

    let query = federation.find_query("bb?").expect("bb? should resolve");
    let mut names: Vec<&str> = query
        .implementors()
        .iter()
        .map(|i| i.node.name.as_str())
        .collect();
    names.sort();
    assert_eq!(names, vec!["A", "B"]);

    for implementor in query.implementors() {
        let requirements = implementor.requirements.as_ref().expect("matching declared");
        assert_eq!(
            requirements.required,
            Some(
                [IdentityAttribute::Surname, IdentityAttribute::Postcode]
                    .into_iter()
                    .collect()
            )
        );
    }

    assert!(federation.confidence_attribute("confA").is_some());
    assert!(federation.node("A").is_some());
    assert!(federation.node("B").is_some());
    assert!(federation.find_query("cc?").is_none());
}

#[test]
fn duplicate_node_is_reported_by_name() {
    let mut file = sample_federation();
    file.nodes.push(node_record("A"));
    // Distinct certificate so the name clash is what trips.
    file.nodes[2].certificate = Some(b"cert:A2".to_vec());

    let err = loader::load_bytes(&metadata_bytes(&file)).unwrap_err();
    match err {
        MetadataError::DuplicateNode(name) => assert_eq!(name, "A"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn certificate_uniqueness_is_enforced() {
    let mut file = sample_federation();
    file.nodes[1].certificate = file.nodes[0].certificate.clone();

    let err = loader::load_bytes(&metadata_bytes(&file)).unwrap_err();
    assert!(matches!(err, MetadataError::DuplicateCertificate { .. }), "{err}");
}

#[test]
fn forward_reference_in_choice_is_fatal() {
    let mut q1 = query_spec("Q1", vec![implementor("A", None)]);
    q1.choices = vec![ChoiceSpec {
        requires: vec!["Q2".into()],
    }];
    let q2 = query_spec("Q2", vec![implementor("B", None)]);

    let mut file = sample_federation();
    file.queries = vec![q1, q2];

    let err = loader::load_bytes(&metadata_bytes(&file)).unwrap_err();
    match err {
        MetadataError::UnresolvedChoice { query, requires } => {
            assert_eq!(query, "Q1");
            assert_eq!(requires, "Q2");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn backward_reference_in_choice_resolves() {
    let q2 = query_spec("Q2", vec![implementor("B", None)]);
    let mut q1 = query_spec("Q1", vec![implementor("A", None)]);
    q1.choices = vec![ChoiceSpec {
        requires: vec!["Q2".into()],
    }];

    let mut file = sample_federation();
    file.queries = vec![q2, q1];

    let federation = loader::load_bytes(&metadata_bytes(&file)).unwrap();
    let q1 = federation.find_query("Q1").unwrap();
    assert_eq!(q1.choices().len(), 1);
    assert_eq!(
        q1.choices()[0].requires,
        vec![federation.query_id("Q2").unwrap()]
    );
}

#[test]
fn choices_are_stored_in_canonical_order() {
    let alpha = query_spec("alpha?", vec![implementor("A", None)]);
    let beta = query_spec("beta?", vec![implementor("B", None)]);
    let mut top = query_spec("top?", vec![implementor("A", None)]);
    top.choices = vec![ChoiceSpec {
        // Deliberately out of lexicographic order.
        requires: vec!["beta?".into(), "alpha?".into()],
    }];

    let mut file = sample_federation();
    file.queries = vec![alpha, beta, top];

    let federation = loader::load_bytes(&metadata_bytes(&file)).unwrap();
    let top = federation.find_query("top?").unwrap();
    assert_eq!(
        top.choices()[0].requires,
        vec![
            federation.query_id("alpha?").unwrap(),
            federation.query_id("beta?").unwrap(),
        ]
    );
}

#[test]
fn reordered_duplicate_choice_is_rejected() {
    let alpha = query_spec("alpha?", vec![implementor("A", None)]);
    let beta = query_spec("beta?", vec![implementor("B", None)]);
    let mut top = query_spec("top?", vec![implementor("A", None)]);
    top.choices = vec![
        ChoiceSpec {
            requires: vec!["alpha?".into(), "beta?".into()],
        },
        ChoiceSpec {
            requires: vec!["beta?".into(), "alpha?".into()],
        },
    ];

    let mut file = sample_federation();
    file.queries = vec![alpha, beta, top];

    let err = loader::load_bytes(&metadata_bytes(&file)).unwrap_err();
    assert!(matches!(err, MetadataError::DuplicateChoice { .. }), "{err}");
}
