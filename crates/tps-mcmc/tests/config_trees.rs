use std::io::Write;
use std::sync::Arc;

use tempfile::NamedTempFile;
use tps_core::errors::TpsError;
use tps_core::toy::{AllInEnsemble, Interval, ToyEngine, TransitionEnsemble, UniformSelector};
use tps_core::EnsembleRef;
use tps_mcmc::config::from_yaml_str;
use tps_mcmc::{describe_tree, MoverConfig, MoverContext, MoverKind, PairList, RunConfig};

fn context() -> MoverContext {
    let mut ctx = MoverContext::new(Arc::new(ToyEngine::new(0.5, 200)), Arc::new(UniformSelector));
    ctx.register(EnsembleRef::new(TransitionEnsemble::new(
        "ab",
        Interval::new(-10.0, 0.0),
        Interval::new(5.0, 10.0),
    )));
    ctx.register(EnsembleRef::new(AllInEnsemble::new(
        "all",
        Interval::new(-100.0, 100.0),
    )));
    ctx
}

fn build(yaml: &str) -> Result<(), TpsError> {
    let config: MoverConfig = from_yaml_str(yaml)?;
    config.build(&context()).map(|_| ())
}

const RUN_FILE: &str = r#"
steps: 25
seed_policy:
  master_seed: 42
  label: smoke
mover:
  type: random-choice
  name: root
  weights: [3, 1]
  movers:
    - type: one-way-shoot
      ensembles: [ab]
    - type: path-reversal
      replicas: [0]
"#;

#[test]
fn run_file_loads_and_builds_a_tree() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(RUN_FILE.as_bytes()).unwrap();

    let config = RunConfig::load(file.path()).unwrap();
    assert_eq!(config.steps, 25);
    assert_eq!(config.seed_policy.master_seed, 42);
    assert_eq!(config.chain().seed_policy.label.as_deref(), Some("smoke"));

    let root = config.mover.build(&context()).unwrap();
    assert_eq!(root.name(), "root");
    assert_eq!(root.info().kind(), MoverKind::RandomChoice);
    assert_eq!(root.submovers().len(), 2);
    assert_eq!(root.submovers()[0].name(), "OneWayShootingMover");
    assert_eq!(root.submovers()[0].submovers().len(), 2);

    let tree = describe_tree(root.as_ref());
    let lines: Vec<&str> = tree.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "root");
    assert!(lines[1].contains("ensembles=[ab]"));
    assert!(lines[4].contains("replicas=[r0]"));
}

#[test]
fn defaults_fill_missing_run_fields() {
    let config = RunConfig::from_yaml_str("mover:\n  type: path-reversal\n").unwrap();
    assert_eq!(config.steps, 100);
    assert_eq!(config.seed_policy.master_seed, 0x05EE_D5EE_DD15_5EED);
    assert!(config.seed_policy.label.is_none());
    assert_eq!(config.chain().workers, 1);
}

#[test]
fn hop_pairs_accept_nested_and_flat_lists() {
    let nested: MoverConfig =
        from_yaml_str("type: ensemble-hop\npairs: [[all, ab]]\nbias: [2.0]\n").unwrap();
    let flat: MoverConfig = from_yaml_str("type: ensemble-hop\npairs: [all, ab]\n").unwrap();

    let MoverConfig::EnsembleHop(nested) = nested else {
        panic!("expected an ensemble hop node");
    };
    let MoverConfig::EnsembleHop(flat) = flat else {
        panic!("expected an ensemble hop node");
    };
    assert!(matches!(nested.pairs, PairList::Pairs(_)));
    assert!(matches!(flat.pairs, PairList::Flat(_)));
    assert_eq!(nested.pairs.to_pairs().unwrap(), flat.pairs.to_pairs().unwrap());

    build("type: ensemble-hop\npairs: [[all, ab]]\nbias: [2.0]\n").unwrap();
}

#[test]
fn malformed_trees_are_config_errors() {
    let odd = build("type: ensemble-hop\npairs: [all, ab, all]\n").unwrap_err();
    assert_eq!(odd.code(), "malformed-pairs");

    let unknown = build("type: path-reversal\nensembles: [nowhere]\n").unwrap_err();
    assert!(matches!(unknown, TpsError::Config(_)));
    assert_eq!(unknown.code(), "unknown-ensemble");

    let weights = build(
        "type: random-choice\nweights: [1]\nmovers:\n  - type: path-reversal\n  - type: path-reversal\n",
    )
    .unwrap_err();
    assert_eq!(weights.code(), "weight-mismatch");

    let exchange = build("type: replica-exchange\nensembles: [ab, all, ab]\n").unwrap_err();
    assert_eq!(exchange.code(), "malformed-pairs");

    let empty = build("type: sequential\nmovers: []\n").unwrap_err();
    assert_eq!(empty.code(), "empty-mover-list");
}

#[test]
fn unparseable_yaml_is_a_serde_error() {
    let err = RunConfig::from_yaml_str("mover:\n  type: teleport\n").unwrap_err();
    assert!(matches!(err, TpsError::Serde(_)));
}
