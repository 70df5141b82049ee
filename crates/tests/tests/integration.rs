//! Integration tests for the ensemble update round trip.
//!
//! These tests verify the full pipeline:
//! Config → Initialize → Load matrix → Update → Save → Verify

use enkf_node::{alloc_mean, ActiveList, AnyNode, EnkfNode, Multflt, NodeError};
use enkf_storage::checkpoint::DEFAULT_COMPRESSION_LEVEL;
use enkf_storage::{EnsembleFs, RealizationState};
use enkf_tests::TestEnsemble;

const RAW: &str = r#"{
    "key": "MULTFLT",
    "parameters": [
        { "name": "F1", "prior": { "distribution": "RAW" } },
        { "name": "F2", "prior": { "distribution": "RAW" } },
        { "name": "F3", "prior": { "distribution": "RAW" } }
    ]
}"#;

const BOUNDED: &str = r#"{
    "key": "MULTFLT",
    "parameters": [
        { "name": "F1", "prior": { "distribution": "UNIFORM", "min": 0.0, "max": 1.0 }, "bounds": [-2.0, 2.0] },
        { "name": "F2", "prior": { "distribution": "LOGUNIF", "min": 0.001, "max": 1.0 }, "bounds": [-2.0, 2.0] },
        { "name": "F3", "prior": { "distribution": "CONST", "value": 0.5 } }
    ]
}"#;

fn multflt(node: &AnyNode) -> &Multflt {
    node.as_multflt().expect("MULTFLT node")
}

/// Loading and saving an untouched matrix leaves every node bit-identical.
#[test]
fn test_unchanged_update_is_lossless() {
    let mut ensemble = TestEnsemble::from_json(RAW, 5, 3);
    let before: Vec<Vec<f64>> = (0..5).map(|iens| ensemble.data(iens)).collect();

    let matrix = ensemble.load_matrix(ActiveList::All);
    assert_eq!(matrix.shape(), (3, 5));
    ensemble.save_matrix(ActiveList::All, &matrix);

    for (iens, data) in before.iter().enumerate() {
        let after = ensemble.data(iens);
        for (a, b) in data.iter().zip(&after) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}

/// A linear update applied to the matrix lands in every realization.
///
/// Verifies: load_parameters → y = f(X) → save_parameters → node data
#[test]
fn test_linear_update_reaches_nodes() {
    let mut ensemble = TestEnsemble::from_json(RAW, 4, 9);
    let before: Vec<Vec<f64>> = (0..4).map(|iens| ensemble.data(iens)).collect();

    let matrix = ensemble.load_matrix(ActiveList::All);
    let updated = matrix.map(|x| 0.5 * x + 1.0);
    ensemble.save_matrix(ActiveList::All, &updated);

    for (iens, data) in before.iter().enumerate() {
        let expected: Vec<f64> = data.iter().map(|x| 0.5 * x + 1.0).collect();
        assert_eq!(ensemble.data(iens), expected);
    }
}

/// Only active entries take part; inactive ones keep their stored values.
#[test]
fn test_partial_update_keeps_inactive_entries() {
    let mut ensemble = TestEnsemble::from_json(RAW, 3, 21);
    let before: Vec<Vec<f64>> = (0..3).map(|iens| ensemble.data(iens)).collect();

    let active = ActiveList::partial(vec![1]);
    let matrix = ensemble.load_matrix(active.clone());
    assert_eq!(matrix.nrows(), 1);
    for (j, data) in before.iter().enumerate() {
        assert_eq!(matrix[(0, j)], data[1]);
    }

    let updated = matrix.map(|_| 7.5);
    ensemble.save_matrix(active, &updated);

    for (iens, data) in before.iter().enumerate() {
        assert_eq!(ensemble.data(iens), vec![data[0], 7.5, data[2]]);
    }
}

/// Values pushed out of bounds by an update are clamped on save.
#[test]
fn test_update_is_truncated_on_save() {
    let mut ensemble = TestEnsemble::from_json(BOUNDED, 3, 5);
    let matrix = ensemble.load_matrix(ActiveList::All);
    let updated = matrix.map(|_| 50.0);
    ensemble.save_matrix(ActiveList::All, &updated);

    for iens in 0..3 {
        let data = ensemble.data(iens);
        assert_eq!(data[0], 2.0);
        assert_eq!(data[1], 2.0);
        // F3 has no bounds
        assert_eq!(data[2], 50.0);
    }
}

/// Outputs follow the priors whatever the latent values are.
#[test]
fn test_outputs_respect_priors() {
    let ensemble = TestEnsemble::from_json(BOUNDED, 10, 17);
    for mut node in ensemble.nodes() {
        let node = node.as_multflt_mut().expect("MULTFLT node");
        let output = node.output_ref().to_vec();
        assert!((0.0..=1.0).contains(&output[0]));
        assert!((0.001..=1.0).contains(&output[1]));
        assert_eq!(output[2], 0.5);
    }
}

/// The node-level mean agrees with the row means of the parameter matrix.
#[test]
fn test_mean_matches_matrix_rows() {
    let mut ensemble = TestEnsemble::from_json(RAW, 6, 13);
    let matrix = ensemble.load_matrix(ActiveList::All);
    let nodes = ensemble.nodes();
    let members: Vec<&AnyNode> = nodes.iter().collect();
    let mean = alloc_mean(&members).unwrap();

    for (i, value) in multflt(&mean).data_ref().iter().enumerate() {
        let row_mean = matrix.row(i).sum() / matrix.ncols() as f64;
        assert!((value - row_mean).abs() < 1e-12);
    }
}

/// The same seed yields the same ensemble in a different case.
#[test]
fn test_initialization_is_reproducible() {
    let a = TestEnsemble::from_json(RAW, 3, 99);
    let b = TestEnsemble::from_json(RAW, 3, 99);
    let c = TestEnsemble::from_json(RAW, 3, 100);
    for iens in 0..3 {
        assert_eq!(a.data(iens), b.data(iens));
        assert_ne!(a.data(iens), c.data(iens));
    }
}

/// A checkpoint restores the ensemble into a fresh case.
#[test]
fn test_checkpoint_restores_into_new_case() {
    let ensemble = TestEnsemble::from_json(RAW, 4, 1);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("MULTFLT.ckpt");
    ensemble
        .fs()
        .write_checkpoint(
            &path,
            &ensemble.template(),
            ensemble.realizations(),
            DEFAULT_COMPRESSION_LEVEL,
        )
        .unwrap();

    let mut restored = EnsembleFs::create(&dir.path().join("restored")).unwrap();
    let members = restored
        .restore_checkpoint(&path, &ensemble.template())
        .unwrap();
    assert_eq!(members, vec![0, 1, 2, 3]);
    assert_eq!(
        restored.realizations(RealizationState::Initialized),
        vec![0, 1, 2, 3]
    );

    let nodes = restored
        .load_ensemble(&ensemble.template(), &members)
        .unwrap();
    for (iens, node) in nodes.iter().enumerate() {
        assert_eq!(multflt(node).data_ref(), ensemble.data(iens).as_slice());
    }
}

/// A checkpoint taken under one config is refused by another of equal size.
#[test]
fn test_checkpoint_refuses_other_config() {
    let raw = TestEnsemble::from_json(RAW, 2, 1);
    let renamed = TestEnsemble::from_json(&RAW.replace("F3", "F9"), 2, 1);

    let node = raw.node(0);
    let mut bytes = Vec::new();
    node.fwrite(&mut bytes).unwrap();

    let mut other = renamed.template();
    assert!(matches!(
        other.fread(&mut bytes.as_slice()),
        Err(NodeError::ConfigMismatch(_))
    ));
    assert_eq!(multflt(&other).data_ref(), &[0.0, 0.0, 0.0]);
}

/// Copying realizations to a new case carries their nodes and states.
#[test]
fn test_copy_case() {
    let mut ensemble = TestEnsemble::from_json(RAW, 3, 4);
    ensemble
        .fs_mut()
        .set_state(2, RealizationState::LoadFailure)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut target = EnsembleFs::create(dir.path()).unwrap();
    let key = ensemble.config().key().clone();
    ensemble
        .fs()
        .copy_to(&mut target, &[key], &[0, 1, 2])
        .unwrap();

    assert_eq!(
        target.realizations(RealizationState::Initialized),
        vec![0, 1]
    );
    assert_eq!(
        target.realizations(RealizationState::ParentFailure),
        vec![2]
    );
    let mut node = ensemble.template();
    target.load_node(1, &mut node).unwrap();
    assert_eq!(multflt(&node).data_ref(), ensemble.data(1).as_slice());
}
