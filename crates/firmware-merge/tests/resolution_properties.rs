//! Property-based tests for the environment precedence chain.
//! Each property holds for arbitrary environment names, not just fixtures.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::fs;
use std::path::Path;

use firmware_merge::environment::{build_root, FIRMWARE_BIN};
use firmware_merge::project_config::PROJECT_CONFIG;
use firmware_merge::{resolve, Environment, MergeError, ResolveRequest, ResolvedTarget};
use proptest::prelude::*;
use tempfile::TempDir;

fn env_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,11}"
}

fn mark_built(root: &Path, env: &str) {
    let dir = build_root(root).join(env);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(FIRMWARE_BIN), b"APP").unwrap();
}

fn resolved_name(target: ResolvedTarget) -> String {
    match target {
        ResolvedTarget::Single(env) => env.name().to_owned(),
        ResolvedTarget::Batch(_) => panic!("expected a single environment"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// An explicit environment wins over config and build output.
    #[test]
    fn explicit_override_always_wins(
        explicit in env_name(),
        declared in env_name(),
        built in proptest::collection::btree_set(env_name(), 0..4),
    ) {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(PROJECT_CONFIG), format!("default_envs = {declared}\n")).unwrap();
        for env in &built {
            mark_built(tmp.path(), env);
        }
        let req = ResolveRequest { env: Some(explicit.clone()), ..Default::default() };
        prop_assert_eq!(resolved_name(resolve(&req, tmp.path()).unwrap()), explicit);
    }

    /// `default_envs = a,b,c` resolves to `a`.
    #[test]
    fn first_declared_default_is_used(
        declared in proptest::collection::vec(env_name(), 1..5),
    ) {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(PROJECT_CONFIG),
            format!("[platformio]\ndefault_envs = {}\n", declared.join(",")),
        )
        .unwrap();
        let first = declared.first().cloned().unwrap();
        let resolved = resolve(&ResolveRequest::default(), tmp.path()).unwrap();
        prop_assert_eq!(resolved_name(resolved), first);
    }

    /// Inference succeeds only when exactly one environment is built.
    #[test]
    fn inference_requires_exactly_one(
        built in proptest::collection::btree_set(env_name(), 0..4),
    ) {
        let tmp = TempDir::new().unwrap();
        for env in &built {
            mark_built(tmp.path(), env);
        }
        let result = resolve(&ResolveRequest::default(), tmp.path());
        if built.len() == 1 {
            let only = built.iter().next().cloned().unwrap();
            prop_assert_eq!(resolved_name(result.unwrap()), only);
        } else {
            let is_unresolved = matches!(result, Err(MergeError::Unresolved { .. }));
            prop_assert!(is_unresolved);
        }
    }

    /// Batch selection is sorted and repeatable.
    #[test]
    fn batch_is_sorted_and_deterministic(
        built in proptest::collection::btree_set(env_name(), 1..6),
    ) {
        let tmp = TempDir::new().unwrap();
        for env in &built {
            mark_built(tmp.path(), env);
        }
        let req = ResolveRequest { all: true, ..Default::default() };
        let first = resolve(&req, tmp.path()).unwrap();
        let second = resolve(&req, tmp.path()).unwrap();
        prop_assert_eq!(&first, &second);

        let names: Vec<String> = first.environments().iter().map(|e| e.name().to_owned()).collect();
        let expected: Vec<String> = built.into_iter().collect();
        prop_assert_eq!(names, expected);
    }

    /// `--all` with `--out` is rejected whatever the project contains.
    #[test]
    fn all_with_out_always_rejected(out in "[a-z]{1,8}\\.bin") {
        let req = ResolveRequest { all: true, out: Some(out.into()), env: None };
        let err = resolve(&req, Path::new("/nonexistent/project")).unwrap_err();
        let is_flag_error = matches!(err, MergeError::IncompatibleFlags { .. });
        prop_assert!(is_flag_error);
    }
}

#[test]
fn explicit_env_is_not_validated_against_build_root() {
    let tmp = TempDir::new().unwrap();
    mark_built(tmp.path(), "real");
    let req = ResolveRequest {
        env: Some("typo".into()),
        ..Default::default()
    };
    assert_eq!(
        resolve(&req, tmp.path()).unwrap(),
        ResolvedTarget::Single(Environment::new("typo"))
    );
}
