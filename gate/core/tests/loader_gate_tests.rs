// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the loader gate.
//!
//! Covers the guarantees callers rely on:
//! - one protection domain per distinct code source, shared by identity
//! - one policy evaluation per code source under concurrent first use
//! - nothing happens on a gate that is not initialized
//! - range errors and origin-less loads never touch the cache
//! - verified and preverified loads bind identically

use async_trait::async_trait;
use codegate_core::application::{GateBuilder, LoadRequest, LoaderGate};
use codegate_core::domain::capability::CapabilitySet;
use codegate_core::domain::code_source::{CodeSource, Signer};
use codegate_core::domain::config::GrantConfig;
use codegate_core::domain::error::{
    AuthorizationError, CapabilityError, GateError, MaterializeError, PolicyViolation,
};
use codegate_core::domain::loaded_unit::LoadedUnit;
use codegate_core::domain::materializer::{DefineRequest, Materializer};
use codegate_core::domain::policy::{CapabilityPolicy, CreationAuthorizer};
use codegate_core::infrastructure::{ModuleMaterializer, StaticCapabilityPolicy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;
use tokio_test::{assert_err, assert_ok};

const EMPTY_MODULE: &[u8] = b"\0asm\x01\x00\x00\x00";
const UNSUPPORTED_VERSION: &[u8] = b"\0asm\x02\x00\x00\x00";
const A_JAR: &str = "https://example.test/a.jar";
const B_JAR: &str = "https://example.test/b.jar";

/// Static grants plus an evaluation counter and an optional delay to widen
/// race windows.
struct CountingPolicy {
    inner: StaticCapabilityPolicy,
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingPolicy {
    fn new(grants: &[GrantConfig], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: StaticCapabilityPolicy::from_config(grants).unwrap(),
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CapabilityPolicy for CountingPolicy {
    async fn capabilities_for(&self, source: &CodeSource) -> Result<CapabilitySet, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.capabilities_for(source).await
    }
}

#[derive(Default)]
struct CountingMaterializer {
    inner: ModuleMaterializer,
    calls: AtomicUsize,
}

impl Materializer for CountingMaterializer {
    fn materialize(&self, request: DefineRequest) -> Result<LoadedUnit, MaterializeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.materialize(request)
    }
}

fn read_tmp_grant() -> Vec<GrantConfig> {
    vec![GrantConfig {
        location: A_JAR.to_string(),
        signers: vec![],
        capabilities: vec!["read:/tmp".to_string()],
    }]
}

fn gate_with(policy: Arc<CountingPolicy>) -> LoaderGate {
    GateBuilder::new().policy(policy).build().unwrap()
}

#[tokio::test]
async fn test_equal_sources_share_one_domain() {
    let policy = CountingPolicy::new(&read_tmp_grant(), Duration::ZERO);
    let gate = gate_with(policy.clone());

    // Separately constructed but equal
    let first = CodeSource::unsigned(A_JAR).unwrap();
    let second = CodeSource::unsigned(A_JAR).unwrap();
    let other = CodeSource::unsigned(B_JAR).unwrap();

    let d1 = assert_ok!(gate.protection_domain(&first).await);
    let d2 = assert_ok!(gate.protection_domain(&second).await);
    let d3 = assert_ok!(gate.protection_domain(&other).await);

    assert!(Arc::ptr_eq(&d1, &d2));
    assert!(!Arc::ptr_eq(&d1, &d3));
    assert_eq!(d1.loader(), gate.id());
    assert_eq!(policy.calls(), 2);
    assert_eq!(gate.cached_domains(), 2);
}

#[tokio::test]
async fn test_signers_distinguish_sources() {
    let gate = LoaderGate::builder().build().unwrap();
    let fp = "bb".repeat(32);
    let unsigned = CodeSource::unsigned(A_JAR).unwrap();
    let signed = CodeSource::parse(A_JAR, vec![Signer::from_fingerprint("bob", &fp).unwrap()])
        .unwrap();

    let d1 = gate.protection_domain(&unsigned).await.unwrap();
    let d2 = gate.protection_domain(&signed).await.unwrap();
    assert!(!Arc::ptr_eq(&d1, &d2));
}

#[tokio::test]
async fn test_decoded_source_shares_domain_with_constructed_source() {
    let gate = LoaderGate::builder().build().unwrap();
    let fp = "ab".repeat(32);
    let constructed =
        CodeSource::parse(A_JAR, vec![Signer::from_fingerprint("carol", &fp).unwrap()]).unwrap();
    let json = format!(
        r#"{{"location":"{}","signers":[{{"subject":"carol","fingerprint":"{}"}}]}}"#,
        A_JAR,
        fp.to_uppercase()
    );
    let decoded: CodeSource = serde_json::from_str(&json).unwrap();

    let d1 = assert_ok!(gate.protection_domain(&constructed).await);
    let d2 = assert_ok!(gate.protection_domain(&decoded).await);
    assert!(Arc::ptr_eq(&d1, &d2));
    assert_eq!(gate.cached_domains(), 1);

    let forged = format!(
        r#"{{"location":"{}","signers":[{{"subject":"carol","fingerprint":"zz"}}]}}"#,
        A_JAR
    );
    assert!(serde_json::from_str::<CodeSource>(&forged).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_first_use_evaluates_policy_once() {
    const TASKS: usize = 16;
    let policy = CountingPolicy::new(&read_tmp_grant(), Duration::from_millis(50));
    let gate = Arc::new(gate_with(policy.clone()));
    let barrier = Arc::new(Barrier::new(TASKS));

    let handles: Vec<_> = (0..TASKS)
        .map(|_| {
            let gate = Arc::clone(&gate);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                let source = CodeSource::unsigned(A_JAR).unwrap();
                gate.load(LoadRequest::new(EMPTY_MODULE).from_source(source))
                    .await
            })
        })
        .collect();

    let units: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(policy.calls(), 1);
    let first = units[0].protection_domain().unwrap();
    for unit in &units {
        assert!(Arc::ptr_eq(first, unit.protection_domain().unwrap()));
    }
}

#[tokio::test]
async fn test_uninitialized_gate_never_materializes() {
    let policy = CountingPolicy::new(&read_tmp_grant(), Duration::ZERO);
    let materializer = Arc::new(CountingMaterializer::default());
    let gate = GateBuilder::new()
        .policy(policy.clone())
        .materializer(materializer.clone())
        .build_uninitialized();

    let source = CodeSource::unsigned(A_JAR).unwrap();
    let result = gate
        .load(LoadRequest::new(EMPTY_MODULE).named("M").from_source(source.clone()))
        .await;
    assert!(matches!(result, Err(GateError::UninitializedUse)));
    let result = gate
        .load_preverified(LoadRequest::new(EMPTY_MODULE).from_source(source))
        .await;
    assert!(matches!(result, Err(GateError::UninitializedUse)));

    assert_eq!(materializer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(policy.calls(), 0);
    assert_eq!(gate.cached_domains(), 0);

    // Becomes usable once initialized
    gate.initialize().unwrap();
    assert_ok!(gate.load(LoadRequest::new(EMPTY_MODULE)).await);
    assert_eq!(materializer.calls.load(Ordering::SeqCst), 1);
}

struct DenyCreation;

impl CreationAuthorizer for DenyCreation {
    fn check_create_permitted(&self) -> Result<(), AuthorizationError> {
        Err(AuthorizationError::Denied("no loaders in this sandbox".to_string()))
    }
}

#[tokio::test]
async fn test_rejected_gate_fails_every_load_with_uninitialized_use() {
    let materializer = Arc::new(CountingMaterializer::default());
    let gate = GateBuilder::new()
        .authorizer(Arc::new(DenyCreation))
        .materializer(materializer.clone())
        .build_uninitialized();

    assert!(matches!(
        gate.initialize(),
        Err(GateError::Authorization(AuthorizationError::Denied(_)))
    ));
    for _ in 0..3 {
        let source = CodeSource::unsigned(A_JAR).unwrap();
        let result = gate
            .load(LoadRequest::new(EMPTY_MODULE).named("M").from_source(source))
            .await;
        assert!(matches!(result, Err(GateError::UninitializedUse)));
    }
    assert_eq!(materializer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(gate.cached_domains(), 0);
}

#[tokio::test]
async fn test_range_error_leaves_cache_untouched() {
    let policy = CountingPolicy::new(&read_tmp_grant(), Duration::ZERO);
    let gate = gate_with(policy.clone());
    let source = CodeSource::unsigned(A_JAR).unwrap();

    let err = assert_err!(
        gate.load(
            LoadRequest::new(EMPTY_MODULE)
                .with_range(4, 10)
                .from_source(source)
        )
        .await
    );
    assert!(matches!(
        err,
        GateError::Range { offset: 4, length: 10, available: 8 }
    ));
    assert_eq!(policy.calls(), 0);
    assert_eq!(gate.cached_domains(), 0);
}

#[tokio::test]
async fn test_load_without_origin_binds_no_domain() {
    let policy = CountingPolicy::new(&read_tmp_grant(), Duration::ZERO);
    let gate = gate_with(policy.clone());

    let unit = gate
        .load(LoadRequest::new(EMPTY_MODULE).named("anon.Unit"))
        .await
        .unwrap();
    assert!(unit.protection_domain().is_none());
    assert_eq!(policy.calls(), 0);
    assert_eq!(gate.cached_domains(), 0);
}

#[tokio::test]
async fn test_preverified_load_binds_like_verified_load() {
    let policy = CountingPolicy::new(&read_tmp_grant(), Duration::ZERO);
    let gate = gate_with(policy.clone());
    let source = CodeSource::unsigned(A_JAR).unwrap();

    let verified = gate
        .load(LoadRequest::new(EMPTY_MODULE).named("app.V").from_source(source.clone()))
        .await
        .unwrap();
    let preverified = gate
        .load_preverified(LoadRequest::new(EMPTY_MODULE).named("app.P").from_source(source))
        .await
        .unwrap();

    assert!(verified.is_verified());
    assert!(!preverified.is_verified());
    assert!(Arc::ptr_eq(
        verified.protection_domain().unwrap(),
        preverified.protection_domain().unwrap()
    ));
    assert_eq!(policy.calls(), 1);

    // Range errors are the same on both paths
    let source = CodeSource::unsigned(A_JAR).unwrap();
    let err = assert_err!(
        gate.load_preverified(LoadRequest::new(EMPTY_MODULE).with_range(9, 0).from_source(source))
            .await
    );
    assert!(matches!(err, GateError::Range { .. }));
}

/// Fails the first call, succeeds afterwards.
struct FlakyPolicy {
    calls: AtomicUsize,
    fail_with: fn() -> CapabilityError,
}

#[async_trait]
impl CapabilityPolicy for FlakyPolicy {
    async fn capabilities_for(&self, _source: &CodeSource) -> Result<CapabilitySet, CapabilityError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Err((self.fail_with)())
        } else {
            Ok(CapabilitySet::empty())
        }
    }
}

#[tokio::test]
async fn test_policy_failure_propagates_and_is_not_cached() {
    let policy = Arc::new(FlakyPolicy {
        calls: AtomicUsize::new(0),
        fail_with: || CapabilityError::Rejected {
            location: A_JAR.to_string(),
            reason: "revoked certificate".to_string(),
        },
    });
    let gate = GateBuilder::new().policy(policy.clone()).build().unwrap();
    let source = CodeSource::unsigned(A_JAR).unwrap();

    let err = assert_err!(
        gate.load(LoadRequest::new(EMPTY_MODULE).from_source(source.clone()))
            .await
    );
    assert!(matches!(
        err,
        GateError::Capability(CapabilityError::Rejected { ref reason, .. }) if reason == "revoked certificate"
    ));
    assert_eq!(gate.cached_domains(), 0);

    assert_ok!(gate.load(LoadRequest::new(EMPTY_MODULE).from_source(source)).await);
    assert_eq!(policy.calls.load(Ordering::SeqCst), 2);
    assert_eq!(gate.cached_domains(), 1);
}

#[tokio::test]
async fn test_unexpected_policy_failure_is_wrapped() {
    let policy = Arc::new(FlakyPolicy {
        calls: AtomicUsize::new(0),
        fail_with: || CapabilityError::Other(anyhow::anyhow!("disk on fire")),
    });
    let gate = GateBuilder::new().policy(policy).build().unwrap();
    let source = CodeSource::unsigned(A_JAR).unwrap();

    let err = assert_err!(gate.protection_domain(&source).await);
    match err {
        GateError::Internal { context, source } => {
            assert_eq!(context, "resolving capabilities");
            assert_eq!(source.to_string(), "disk on fire");
        }
        other => panic!("expected Internal, got {other:?}"),
    }
}

#[tokio::test]
async fn test_materializer_violations_surface_as_gate_errors() {
    let gate = LoaderGate::builder().build().unwrap();
    let a = CodeSource::unsigned(A_JAR).unwrap();
    let b = CodeSource::unsigned(B_JAR).unwrap();

    let err = assert_err!(gate.load(LoadRequest::new(EMPTY_MODULE).named("core.Object")).await);
    assert!(matches!(
        err,
        GateError::PolicyViolation(PolicyViolation::ReservedNamespace { .. })
    ));

    assert_ok!(
        gate.load(LoadRequest::new(EMPTY_MODULE).named("app.M").from_source(a))
            .await
    );
    let err = assert_err!(
        gate.load(LoadRequest::new(EMPTY_MODULE).named("app.M").from_source(b))
            .await
    );
    assert!(matches!(
        err,
        GateError::PolicyViolation(PolicyViolation::ConflictingDefinition { .. })
    ));

    let err = assert_err!(gate.load(LoadRequest::new(UNSUPPORTED_VERSION)).await);
    assert!(matches!(err, GateError::Format(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_end_to_end_shared_origin_and_empty_grant() {
    let policy = CountingPolicy::new(&read_tmp_grant(), Duration::from_millis(20));
    let gate = Arc::new(gate_with(policy.clone()));
    let barrier = Arc::new(Barrier::new(2));

    let load_m = |gate: Arc<LoaderGate>, barrier: Arc<Barrier>| async move {
        barrier.wait().await;
        let source = CodeSource::unsigned(A_JAR).unwrap();
        gate.load(LoadRequest::new(EMPTY_MODULE).named("M").from_source(source))
            .await
    };
    let t1 = tokio::spawn(load_m(Arc::clone(&gate), Arc::clone(&barrier)));
    let t2 = tokio::spawn(load_m(Arc::clone(&gate), Arc::clone(&barrier)));
    let u1 = t1.await.unwrap().unwrap();
    let u2 = t2.await.unwrap().unwrap();

    let d1 = u1.protection_domain().unwrap();
    let d2 = u2.protection_domain().unwrap();
    assert!(Arc::ptr_eq(d1, d2));
    assert_eq!(d1.capabilities().to_string(), "{read:/tmp}");
    assert!(d1.implies(&"read:/tmp".parse().unwrap()));
    assert_eq!(policy.calls(), 1);

    let source = CodeSource::unsigned(B_JAR).unwrap();
    let n = gate
        .load(LoadRequest::new(EMPTY_MODULE).named("N").from_source(source))
        .await
        .unwrap();
    let d3 = n.protection_domain().unwrap();
    assert!(!Arc::ptr_eq(d1, d3));
    assert!(d3.capabilities().is_empty());
    assert_eq!(policy.calls(), 2);
    assert_eq!(gate.cached_domains(), 2);
}

#[tokio::test]
async fn test_gates_do_not_share_caches() {
    let source = CodeSource::unsigned(A_JAR).unwrap();
    let first = LoaderGate::builder().build().unwrap();
    let second = LoaderGate::builder().build().unwrap();

    let d1 = first.protection_domain(&source).await.unwrap();
    let d2 = second.protection_domain(&source).await.unwrap();
    assert!(!Arc::ptr_eq(&d1, &d2));
    assert_eq!(d1.loader(), first.id());
    assert_eq!(d2.loader(), second.id());
}
