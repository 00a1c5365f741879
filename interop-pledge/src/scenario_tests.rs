use crate::clock::{Clock, ManualClock};
use crate::network::InteropNetwork;
use crate::protocol::{fast_pledge_claim, fast_pledge_reclaim};
use crate::tms::Tms;
use crate::vault::FilePledgeVault;
use chrono::Duration;
use interop_core::config::InteropConfig;
use interop_core::driver::PledgeVault;
use interop_core::error::{ErrorKind, InteropError};
use interop_core::id::{Identity, TokenId, TxId};
use interop_core::ledger_url::TmsId;
use interop_core::quantity::Quantity;
use std::sync::Arc;
use tempfile::tempdir;

const ALPHA: &str = "fabric://alpha.testchannel.zkat/";
const BETA: &str = "fabric://beta.testchannel.zkat/";
const SCAN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(1);

struct Fixture {
    network: InteropNetwork,
    clock: Arc<ManualClock>,
    alpha: Arc<Tms>,
    beta: Arc<Tms>,
    issuer: Identity,
    alice: Identity,
    bob: Identity,
}

fn config(driver: &str, auditors: &[&str]) -> InteropConfig {
    let auditors = serde_json::to_string(auditors).unwrap();
    InteropConfig::from_json_str(&format!(
        r#"{{
            "tms": [
                {{"network": "alpha", "channel": "testchannel", "namespace": "zkat",
                  "driver": "{driver}", "issuers": ["issuer"], "auditors": {auditors}}},
                {{"network": "beta", "channel": "testchannel", "namespace": "zkat",
                  "driver": "{driver}", "issuers": ["issuer"], "auditors": {auditors}}}
            ],
            "scan": {{"poll_interval_ms": 100}}
        }}"#
    ))
    .unwrap()
}

fn fixture(driver: &str) -> Fixture {
    let clock = Arc::new(ManualClock::default());
    let network = InteropNetwork::new(&config(driver, &[]), clock.clone()).unwrap();
    let alpha = network.open(&TmsId::new("alpha", "testchannel", "zkat")).unwrap();
    let beta = network.open(&TmsId::new("beta", "testchannel", "zkat")).unwrap();
    Fixture {
        issuer: network.wallet("issuer"),
        alice: network.wallet("alice"),
        bob: network.wallet("bob"),
        network,
        clock,
        alpha,
        beta,
    }
}

fn q(value: u64) -> Quantity {
    Quantity::from_u64(value, 64).unwrap()
}

fn pledged(tx: &TxId) -> TokenId {
    TokenId::new(tx.clone(), 0)
}

/// Pledge on `origin` and hand the pledge record to `destination`
fn pledge(
    f: &Fixture,
    origin: &Tms,
    destination: &Tms,
    sender: &Identity,
    recipient: &Identity,
    amount: u64,
    deadline: Duration,
) -> TokenId {
    let (tx, pledge_id) = origin
        .pledge(
            sender,
            "USD",
            amount,
            recipient,
            &f.issuer,
            destination.url(),
            f.clock.now() + deadline,
        )
        .unwrap();
    assert!(origin.scan_pledge(&pledge_id, &tx, SCAN_TIMEOUT).unwrap());
    destination
        .accept_pledge(&origin.pledge_by_id(&pledge_id).unwrap().unwrap())
        .unwrap();
    pledged(&tx)
}

fn run_pledge_lifecycle(driver: &str) {
    let f = fixture(driver);
    assert_eq!(f.alpha.url(), ALPHA);
    assert_eq!(f.beta.url(), BETA);

    f.alpha.issue(&f.issuer, "USD", 50, &f.alice).unwrap();
    assert_eq!(f.alpha.balance(&f.alice, "USD").unwrap(), q(50));

    // pledge, claim, redeem
    let token = pledge(&f, &f.alpha, &f.beta, &f.alice, &f.bob, 10, Duration::hours(1));
    assert_eq!(f.alpha.balance(&f.alice, "USD").unwrap(), q(40));
    f.beta.claim(&f.bob, &f.issuer, &token).unwrap();
    assert_eq!(f.beta.balance(&f.bob, "USD").unwrap(), q(10));

    f.alpha.redeem(&f.issuer, &token).unwrap();
    assert!(matches!(
        f.alpha.redeem(&f.issuer, &token),
        Err(InteropError::AlreadyRedeemed(_))
    ));
    assert!(matches!(
        f.alpha.reclaim(&f.alice, &token),
        Err(InteropError::DeadlineNotReached { .. })
    ));

    // pledge, let the deadline pass, reclaim
    let (tx, pledge_id) = f
        .alpha
        .pledge(&f.alice, "USD", 5, &f.bob, &f.issuer, BETA, f.clock.now() + Duration::seconds(10))
        .unwrap();
    let token = pledged(&tx);
    f.beta
        .accept_pledge(&f.alpha.pledge_by_id(&pledge_id).unwrap().unwrap())
        .unwrap();
    assert!(matches!(
        f.alpha.reclaim(&f.alice, &token),
        Err(InteropError::DeadlineNotReached { .. })
    ));
    f.clock.advance(Duration::seconds(15));
    let reclaim_tx = f.alpha.reclaim(&f.alice, &token).unwrap();
    assert_eq!(f.alpha.balance(&f.alice, "USD").unwrap(), q(40));

    // the reclaim does not carry the pledge id
    assert!(matches!(
        f.alpha.scan_pledge(&pledge_id, &reclaim_tx, SCAN_TIMEOUT),
        Err(InteropError::ScanTimeout)
    ));
    assert!(matches!(
        f.alpha.reclaim(&f.alice, &token),
        Err(InteropError::AlreadyClaimedOrReclaimed(_))
    ));
    let err = f.beta.claim(&f.bob, &f.issuer, &token).unwrap_err();
    assert!(matches!(err, InteropError::AlreadyClaimedOrReclaimed(_)), "unexpected error: {}", err);
    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert!(matches!(
        f.alpha.redeem(&f.issuer, &token),
        Err(InteropError::AlreadyClaimedOrReclaimed(_))
    ));

    // a claimed pledge cannot be reclaimed
    let token = pledge(&f, &f.alpha, &f.beta, &f.alice, &f.bob, 5, Duration::seconds(10));
    f.beta.claim(&f.bob, &f.issuer, &token).unwrap();
    f.clock.advance(Duration::seconds(15));
    let err = f.alpha.reclaim(&f.alice, &token).unwrap_err();
    assert!(matches!(err, InteropError::AlreadyClaimedOrReclaimed(_)), "unexpected error: {}", err);
    assert!(!err.is_retryable());
    assert_eq!(f.alpha.balance(&f.alice, "USD").unwrap(), q(35));
    assert_eq!(f.beta.balance(&f.bob, "USD").unwrap(), q(15));

    // reverse direction, claimed once only
    let token = pledge(&f, &f.beta, &f.alpha, &f.bob, &f.alice, 3, Duration::hours(1));
    f.alpha.claim(&f.alice, &f.issuer, &token).unwrap();
    assert!(matches!(
        f.alpha.claim(&f.alice, &f.issuer, &token),
        Err(InteropError::AlreadyClaimedOrReclaimed(_))
    ));
    f.beta.redeem(&f.issuer, &token).unwrap();
    assert_eq!(f.alpha.balance(&f.alice, "USD").unwrap(), q(38));
    assert_eq!(f.beta.balance(&f.bob, "USD").unwrap(), q(12));

    // requests without a transaction id
    let empty = TokenId::new(TxId::new(""), 0);
    assert!(matches!(
        f.beta.claim(&f.bob, &f.issuer, &empty),
        Err(InteropError::InvalidRequest(_))
    ));
    assert!(matches!(
        f.alpha.reclaim(&f.alice, &empty),
        Err(InteropError::InvalidRequest(_))
    ));
}

#[test]
fn test_pledge_lifecycle_fabtoken() {
    run_pledge_lifecycle("fabtoken");
}

#[test]
fn test_pledge_lifecycle_zkatdlog() {
    run_pledge_lifecycle("zkatdlog");
}

fn run_full_pledge_claim_redeem(driver: &str) {
    let f = fixture(driver);
    f.alpha.issue(&f.issuer, "USD", 50, &f.alice).unwrap();

    let token = pledge(&f, &f.alpha, &f.beta, &f.alice, &f.bob, 50, Duration::minutes(1));
    f.beta.claim(&f.bob, &f.issuer, &token).unwrap();
    assert_eq!(f.alpha.balance(&f.alice, "USD").unwrap(), q(0));
    assert_eq!(f.beta.balance(&f.bob, "USD").unwrap(), q(50));

    f.clock.advance(Duration::minutes(2));
    f.alpha.redeem(&f.issuer, &token).unwrap();
    assert_eq!(f.alpha.balance(&f.alice, "USD").unwrap(), q(0));
    assert_eq!(f.beta.balance(&f.bob, "USD").unwrap(), q(50));

    let err = f.alpha.redeem(&f.issuer, &token).unwrap_err();
    assert!(matches!(err, InteropError::AlreadyRedeemed(_)));
    assert_eq!(err.kind(), ErrorKind::StateConflict);
}

fn run_full_pledge_reclaim(driver: &str) {
    let f = fixture(driver);
    f.alpha.issue(&f.issuer, "USD", 50, &f.alice).unwrap();

    let deadline = f.clock.now() + Duration::seconds(10);
    let (tx, pledge_id) = f
        .alpha
        .pledge(&f.alice, "USD", 50, &f.bob, &f.issuer, BETA, deadline)
        .unwrap();
    let token = pledged(&tx);
    f.beta
        .accept_pledge(&f.alpha.pledge_by_id(&pledge_id).unwrap().unwrap())
        .unwrap();
    assert_eq!(f.alpha.balance(&f.alice, "USD").unwrap(), q(0));

    f.clock.sleep(std::time::Duration::from_secs(15));
    let reclaim_tx = f.alpha.reclaim(&f.alice, &token).unwrap();
    assert_eq!(f.alpha.balance(&f.alice, "USD").unwrap(), q(50));

    let err = f.alpha.scan_pledge(&pledge_id, &reclaim_tx, SCAN_TIMEOUT).unwrap_err();
    assert!(matches!(err, InteropError::ScanTimeout));
    assert_eq!(err.kind(), ErrorKind::Timeout);

    let err = f.alpha.reclaim(&f.alice, &token).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert!(matches!(
        f.beta.claim(&f.bob, &f.issuer, &token),
        Err(InteropError::AlreadyClaimedOrReclaimed(_))
    ));
    assert_eq!(f.beta.balance(&f.bob, "USD").unwrap(), q(0));
}

#[test]
fn test_full_pledge_claim_redeem() {
    run_full_pledge_claim_redeem("fabtoken");
    run_full_pledge_claim_redeem("zkatdlog");
}

#[test]
fn test_full_pledge_reclaim() {
    run_full_pledge_reclaim("fabtoken");
    run_full_pledge_reclaim("zkatdlog");
}

#[test]
fn test_claim_checks_recipient_and_deadline() {
    let f = fixture("fabtoken");
    f.alpha.issue(&f.issuer, "USD", 20, &f.alice).unwrap();
    let token = pledge(&f, &f.alpha, &f.beta, &f.alice, &f.bob, 20, Duration::seconds(10));

    let err = f.beta.claim(&f.alice, &f.issuer, &token).unwrap_err();
    assert!(matches!(err, InteropError::ProofMismatch { .. }));

    // past the deadline the destination ledger refuses the claim
    f.clock.advance(Duration::seconds(15));
    assert!(matches!(
        f.beta.claim(&f.bob, &f.issuer, &token),
        Err(InteropError::LedgerRejected(_))
    ));
    f.alpha.reclaim(&f.alice, &token).unwrap();
    assert_eq!(f.alpha.balance(&f.alice, "USD").unwrap(), q(20));
}

#[test]
fn test_operations_run_on_their_side_of_the_pledge() {
    let f = fixture("fabtoken");
    f.alpha.issue(&f.issuer, "USD", 20, &f.alice).unwrap();
    let token = pledge(&f, &f.alpha, &f.beta, &f.alice, &f.bob, 20, Duration::seconds(10));

    // The origin cannot claim its own pledge
    assert!(matches!(
        f.alpha.claim(&f.bob, &f.issuer, &token),
        Err(InteropError::InvalidRequest(_))
    ));

    // The destination only holds a copy of the record
    f.clock.advance(Duration::seconds(15));
    assert!(matches!(
        f.beta.reclaim(&f.alice, &token),
        Err(InteropError::InvalidRequest(_))
    ));
    assert!(matches!(
        f.beta.redeem(&f.issuer, &token),
        Err(InteropError::InvalidRequest(_))
    ));
    assert_eq!(f.beta.balance(&f.alice, "USD").unwrap(), q(0));

    f.alpha.reclaim(&f.alice, &token).unwrap();
    assert_eq!(f.alpha.balance(&f.alice, "USD").unwrap(), q(20));
}

#[test]
fn test_pledged_tokens_of_local_wallets() {
    let f = fixture("zkatdlog");
    f.alpha.issue(&f.issuer, "USD", 30, &f.alice).unwrap();
    let token = pledge(&f, &f.alpha, &f.beta, &f.alice, &f.bob, 12, Duration::hours(1));

    let pledged = f.alpha.pledged_tokens(&f.alice).unwrap();
    assert_eq!(pledged.len(), 1);
    assert_eq!(pledged[0].id, token);
    assert_eq!(pledged[0].script.recipient, f.bob);
    assert_eq!(f.alpha.pledged_tokens(&f.issuer).unwrap().len(), 1);
    assert!(f.beta.pledged_tokens(&f.bob).unwrap().is_empty());

    assert!(matches!(
        f.alpha.pledged_tokens(&Identity::from_label("mallory")),
        Err(InteropError::InvalidRequest(_))
    ));

    // Redeemed pledges are burned
    f.beta.claim(&f.bob, &f.issuer, &token).unwrap();
    f.alpha.redeem(&f.issuer, &token).unwrap();
    assert!(f.alpha.pledged_tokens(&f.alice).unwrap().is_empty());
}

#[test]
fn test_pledge_requires_funds_and_known_destination() {
    let f = fixture("zkatdlog");
    f.alpha.issue(&f.issuer, "USD", 5, &f.alice).unwrap();
    let deadline = f.clock.now() + Duration::hours(1);
    assert!(matches!(
        f.alpha.pledge(&f.alice, "USD", 6, &f.bob, &f.issuer, BETA, deadline),
        Err(InteropError::InsufficientBalance { .. })
    ));
    assert!(matches!(
        f.alpha.pledge(&f.alice, "USD", 0, &f.bob, &f.issuer, BETA, deadline),
        Err(InteropError::InvalidRequest(_))
    ));
    assert!(f.alpha.pledge(&f.alice, "USD", 1, &f.bob, &f.issuer, "not a url", deadline).is_err());

    // the destination of a pledge must be the accepting ledger
    let (_, pledge_id) = f
        .alpha
        .pledge(&f.alice, "USD", 1, &f.bob, &f.issuer, BETA, deadline)
        .unwrap();
    let info = f.alpha.pledge_by_id(&pledge_id).unwrap().unwrap();
    assert!(f.alpha.accept_pledge(&info).is_err());
    f.beta.accept_pledge(&info).unwrap();
}

#[test]
fn test_only_configured_issuers_mint() {
    let f = fixture("fabtoken");
    let mallory = f.network.wallet("mallory");
    assert!(matches!(
        f.alpha.issue(&mallory, "USD", 10, &mallory),
        Err(InteropError::InvalidRequest(_))
    ));
    assert!(f.alpha.issue(&f.issuer, "USD", 0, &f.alice).is_err());
}

#[test]
fn test_fast_flows() {
    for driver in ["fabtoken", "zkatdlog"] {
        let f = fixture(driver);
        f.alpha.issue(&f.issuer, "USD", 30, &f.alice).unwrap();

        let deadline = f.clock.now() + Duration::hours(1);
        let receipt = fast_pledge_claim(
            &f.alpha, &f.beta, &f.alice, &f.bob, &f.issuer, &f.issuer, "USD", 12, deadline,
        )
        .unwrap();
        assert_eq!(f.beta.balance(&f.bob, "USD").unwrap(), q(12));
        f.alpha.redeem(&f.issuer, &receipt.pledged_token()).unwrap();

        let deadline = f.clock.now() + Duration::seconds(30);
        let receipt = fast_pledge_reclaim(&f.alpha, BETA, &f.alice, &f.bob, &f.issuer, "USD", 8, deadline).unwrap();
        assert!(f.clock.now() >= deadline);
        assert_ne!(receipt.completion_tx, receipt.pledge_tx);
        assert_eq!(f.alpha.balance(&f.alice, "USD").unwrap(), q(18));
    }
}

#[test]
fn test_audited_network() {
    for driver in ["fabtoken", "zkatdlog"] {
        let clock = Arc::new(ManualClock::default());
        let network = InteropNetwork::new(&config(driver, &["auditor"]), clock.clone()).unwrap();
        let alpha = network.open(&TmsId::new("alpha", "testchannel", "zkat")).unwrap();
        let beta = network.open(&TmsId::new("beta", "testchannel", "zkat")).unwrap();
        let (issuer, alice, bob) = (network.wallet("issuer"), network.wallet("alice"), network.wallet("bob"));

        // unaudited requests are refused once auditors are configured
        assert!(matches!(
            alpha.issue(&issuer, "USD", 10, &alice),
            Err(InteropError::LedgerRejected(_))
        ));
        assert!(alpha.register_auditor(&network.wallet("mallory")).is_err());

        let auditor = network.wallet("auditor");
        alpha.register_auditor(&auditor).unwrap();
        beta.register_auditor(&auditor).unwrap();
        alpha.issue(&issuer, "USD", 10, &alice).unwrap();

        let deadline = clock.now() + Duration::hours(1);
        let receipt =
            fast_pledge_claim(&alpha, &beta, &alice, &bob, &issuer, &issuer, "USD", 4, deadline).unwrap();
        alpha.redeem(&issuer, &receipt.pledged_token()).unwrap();
        assert_eq!(alpha.balance(&alice, "USD").unwrap(), q(6));
        assert_eq!(beta.balance(&bob, "USD").unwrap(), q(4));
    }
}

#[test]
fn test_pledges_survive_on_file_vault() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(ManualClock::default());
    let network = InteropNetwork::new(&config("fabtoken", &[]), clock.clone()).unwrap();
    let vault = Arc::new(FilePledgeVault::open(&dir.path().join("alpha.journal")).unwrap());
    let alpha = network
        .open_with_vault(&TmsId::new("alpha", "testchannel", "zkat"), vault)
        .unwrap();
    let (issuer, alice, bob) = (network.wallet("issuer"), network.wallet("alice"), network.wallet("bob"));
    alpha.issue(&issuer, "USD", 10, &alice).unwrap();
    let (_, pledge_id) = alpha
        .pledge(&alice, "USD", 10, &bob, &issuer, BETA, clock.now() + Duration::hours(1))
        .unwrap();

    let reopened = FilePledgeVault::open(&dir.path().join("alpha.journal")).unwrap();
    let info = reopened.pledge_by_id(&pledge_id).unwrap().unwrap();
    assert_eq!(info.amount, 10);
    assert_eq!(info.source, ALPHA);

    // opening again returns the running scope
    let again = network.open(&TmsId::new("alpha", "testchannel", "zkat")).unwrap();
    assert!(Arc::ptr_eq(&alpha, &again));
}

#[test]
fn test_unknown_scope_is_a_config_error() {
    let f = fixture("fabtoken");
    assert!(matches!(
        f.network.open(&TmsId::new("gamma", "testchannel", "zkat")),
        Err(InteropError::Config(_))
    ));
}
