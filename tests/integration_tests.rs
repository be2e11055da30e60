//! Integration tests for component interactions.
//!
//! These tests drive the signing service end to end with in-memory
//! collaborators, a manual clock and identities stored in temporary
//! directories.

use chrono::Duration;
use contract_core::config::{SigningConfig, SigningMode};
use contract_core::fixtures::sample_contract;
use contract_core::format::{amount_in_words, format_currency};
use contract_core::types::{Recipient, SigningStatus};
use contract_core::{DocumentRenderer, Error};
use identity::{verify_document, CertificateManager, IdentityProvider};
use rust_decimal::Decimal;
use signing_engine::{
    FsDocumentStore, LogNotifier, ManualClock, MemoryContractSource,
    MemorySigningRequestRepository, SigningService,
};
use std::sync::Arc;

struct TestEnv {
    service: Arc<SigningService>,
    clock: Arc<ManualClock>,
    identity: Arc<CertificateManager>,
    _dir: tempfile::TempDir,
}

fn env(mode: SigningMode) -> TestEnv {
    let dir = tempfile::tempdir().unwrap();
    let config = SigningConfig {
        mode,
        ..SigningConfig::for_dir(dir.path())
    };

    let contracts = Arc::new(MemoryContractSource::new());
    contracts.insert(sample_contract());
    let identity = Arc::new(CertificateManager::from_config(&config));
    let clock = Arc::new(ManualClock::default());

    let service = SigningService::with_clock(
        config.clone(),
        Arc::new(MemorySigningRequestRepository::new()),
        contracts,
        Arc::new(FsDocumentStore::new(&config.document_dir)),
        identity.clone(),
        Arc::new(LogNotifier),
        clock.clone(),
    );

    TestEnv {
        service: Arc::new(service),
        clock,
        identity,
        _dir: dir,
    }
}

fn tenant() -> Recipient {
    Recipient::new("tenant-1", "andres@example.com")
}

/// Seven-day request signed immediately, then rejected.
#[tokio::test]
async fn test_sign_then_reject_is_terminal() {
    let env = env(SigningMode::Production);
    let request = env
        .service
        .request_signature_with_retention("C1", &tenant(), Duration::days(7))
        .await
        .unwrap();

    let signed = env.service.sign(request.id()).await.unwrap();
    assert_eq!(signed.request.status(), SigningStatus::Signed);
    assert!(!signed.document.is_empty());
    assert!(signed.request.signed_at().is_some());

    let path = signed.request.signed_document_path().unwrap();
    assert_eq!(std::fs::read(path).unwrap(), signed.document);

    let err = env.service.reject(request.id()).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyTerminal { .. }));

    let stored = env.service.get(request.id()).await.unwrap();
    assert_eq!(stored, signed.request);
}

/// Zero-day request: signing after the deadline fails, the sweep expires it.
#[tokio::test]
async fn test_expired_request_then_sweep() {
    let env = env(SigningMode::Production);
    let request = env
        .service
        .request_signature_with_retention("C1", &tenant(), Duration::zero())
        .await
        .unwrap();
    env.clock.advance(Duration::minutes(1));

    let err = env.service.sign(request.id()).await.unwrap_err();
    assert!(matches!(err, Error::ExpiredRequest { .. }));

    assert_eq!(env.service.expire_sweep().await.unwrap(), 1);
    assert_eq!(
        env.service.get(request.id()).await.unwrap().status(),
        SigningStatus::Expired
    );

    let err = env.service.sign(request.id()).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyTerminal { .. }));
}

#[tokio::test]
async fn test_sweep_is_idempotent() {
    let env = env(SigningMode::Production);
    env.service
        .request_signature_with_retention("C1", &tenant(), Duration::days(1))
        .await
        .unwrap();
    env.clock.advance(Duration::days(3));

    let first = env.service.expire_sweep().await.unwrap();
    let snapshot = env.service.list_for_contract("C1").await.unwrap();
    let second = env.service.expire_sweep().await.unwrap();

    assert_eq!(first, 1);
    assert_eq!(second, 0);
    assert_eq!(env.service.list_for_contract("C1").await.unwrap(), snapshot);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sweeps_expire_once() {
    let env = env(SigningMode::Production);
    env.service
        .request_signature_with_retention("C1", &tenant(), Duration::days(1))
        .await
        .unwrap();
    env.clock.advance(Duration::days(2));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let service = env.service.clone();
            tokio::spawn(async move { service.expire_sweep().await.unwrap() })
        })
        .collect();

    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap();
    }
    assert_eq!(total, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sign_has_one_winner() {
    let env = env(SigningMode::Production);
    let id = env
        .service
        .request_signature_with_retention("C1", &tenant(), Duration::days(7))
        .await
        .unwrap()
        .id();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let service = env.service.clone();
            tokio::spawn(async move { service.sign(id).await })
        })
        .collect();

    let mut signed = 0;
    let mut terminal = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => signed += 1,
            Err(Error::AlreadyTerminal { .. }) => terminal += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!((signed, terminal), (1, 1));
}

#[tokio::test]
async fn test_signed_document_verifies_only_with_signer() {
    let env = env(SigningMode::Production);
    let request = env
        .service
        .request_signature("C1", &tenant())
        .await
        .unwrap();
    let signed = env.service.sign(request.id()).await.unwrap();

    let identity = env.identity.identity().unwrap();
    assert!(verify_document(&signed.document, &identity));
    assert!(env.service.verify(request.id()).await.unwrap());

    let other_dir = tempfile::tempdir().unwrap();
    let other = CertificateManager::in_dir(other_dir.path(), Default::default())
        .load_or_generate()
        .unwrap();
    assert!(!verify_document(&signed.document, &other));
}

#[tokio::test]
async fn test_development_mode_without_identity_still_signs_request() {
    let dir = tempfile::tempdir().unwrap();
    let config = SigningConfig {
        mode: SigningMode::Development,
        auto_generate_identity: false,
        ..SigningConfig::for_dir(dir.path())
    };
    let contracts = Arc::new(MemoryContractSource::new());
    contracts.insert(sample_contract());

    let service = SigningService::new(
        config.clone(),
        Arc::new(MemorySigningRequestRepository::new()),
        contracts,
        Arc::new(FsDocumentStore::new(&config.document_dir)),
        Arc::new(CertificateManager::from_config(&config)),
        Arc::new(LogNotifier),
    );

    let request = service.request_signature("C1", &tenant()).await.unwrap();
    let signed = service.sign(request.id()).await.unwrap();

    assert_eq!(signed.request.status(), SigningStatus::Signed);
    assert!(!signed.cryptographically_signed);
    assert_eq!(
        signed.document,
        DocumentRenderer::new(config.render.clone())
            .render(&sample_contract())
            .unwrap()
    );
    assert!(!config.key_path().exists());
}

#[test]
fn test_load_or_generate_twice_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let config = SigningConfig::for_dir(dir.path());
    let manager = CertificateManager::from_config(&config);

    manager.load_or_generate().unwrap();
    let key = std::fs::read(config.key_path()).unwrap();
    let cert = std::fs::read(config.certificate_path()).unwrap();

    let again = CertificateManager::from_config(&config).load_or_generate().unwrap();
    assert_eq!(std::fs::read(config.key_path()).unwrap(), key);
    assert_eq!(std::fs::read(config.certificate_path()).unwrap(), cert);
    assert_eq!(again.certificate_pem().as_bytes(), cert.as_slice());
}

#[test]
fn test_render_is_deterministic() {
    let renderer = DocumentRenderer::default();
    let mut contract = sample_contract();

    assert_eq!(
        renderer.render(&contract).unwrap(),
        renderer.render(&contract).unwrap()
    );

    contract.co_signer = None;
    contract.witness = None;
    contract.pricing = None;
    assert_eq!(
        renderer.render(&contract).unwrap(),
        renderer.render(&contract.clone()).unwrap()
    );
}

#[test]
fn test_formatter_matches_rendered_terms() {
    let rent = Decimal::new(1_600_000, 0);
    assert_eq!(format_currency(rent), "$1,600,000.00");
    assert_eq!(amount_in_words(rent), "un millón seiscientos mil");
}
