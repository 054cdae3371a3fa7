use prcy_core::OutPoint;
use prcy_crypto::{hash256, Ed25519Signer, KeyPair};
use prcy_masternode::*;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};

/// Reports every sync query so the test can follow the loop's polls
struct ReportingSync {
    synced: AtomicBool,
    polls: mpsc::UnboundedSender<()>,
}

impl SyncStatus for ReportingSync {
    fn is_blockchain_synced(&self) -> bool {
        let _ = self.polls.send(());
        self.synced.load(Ordering::SeqCst)
    }
}

struct Unreachable;

impl NetworkProbe for Unreachable {
    fn try_connect(&self, _addr: SocketAddr) -> bool {
        false
    }
}

struct NoAddress;

impl AddressResolver for NoAddress {
    fn detect_local(&self) -> Option<SocketAddr> {
        None
    }
}

fn node(sync: Arc<ReportingSync>) -> Arc<Mutex<ActiveMasternode>> {
    let key = KeyPair::from_secret([7u8; 32]);
    let settings = NodeSettings {
        masternode: true,
        masternodeprivkey: key.private_key_hex(),
        ..NodeSettings::default()
    };

    let registry = Arc::new(InMemoryRegistry::new());
    registry.insert(MasternodeIdentity::new(
        OutPoint::new(hash256(b"scheduled"), 0),
        "203.0.113.9:53572".parse().unwrap(),
        key.public_key(),
        settings.protocol_version,
    ));

    let services = Collaborators {
        registry,
        sync,
        probe: Arc::new(Unreachable),
        resolver: Arc::new(NoAddress),
        broadcaster: Arc::new(LogBroadcaster),
        signer: Arc::new(Ed25519Signer),
        clock: Arc::new(SystemClock),
    };
    Arc::new(Mutex::new(ActiveMasternode::new(settings, Some(key), services)))
}

fn reporting_sync() -> (Arc<ReportingSync>, mpsc::UnboundedReceiver<()>) {
    let (polls, rx) = mpsc::unbounded_channel();
    let sync = Arc::new(ReportingSync {
        synced: AtomicBool::new(false),
        polls,
    });
    (sync, rx)
}

#[tokio::test(start_paused = true)]
async fn test_loop_drives_activation_until_shutdown() {
    let _ = env_logger::builder().is_test(true).try_init();

    let (sync, mut polls) = reporting_sync();
    let node = node(sync.clone());
    let (stop, stop_rx) = watch::channel(false);
    let handle = spawn_status_loop(node.clone(), STATUS_POLL_INTERVAL, stop_rx);

    polls.recv().await.unwrap();
    assert_eq!(node.lock().await.state(), &ActivationState::SyncInProcess);

    polls.recv().await.unwrap();
    assert_eq!(node.lock().await.state(), &ActivationState::SyncInProcess);

    sync.synced.store(true, Ordering::SeqCst);
    polls.recv().await.unwrap();
    assert!(node.lock().await.is_started());

    stop.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_loop_stops_when_sender_dropped() {
    let (sync, mut polls) = reporting_sync();
    let node = node(sync);
    let (stop, stop_rx) = watch::channel(false);
    let handle = spawn_status_loop(node, STATUS_POLL_INTERVAL, stop_rx);

    polls.recv().await.unwrap();
    drop(stop);
    handle.await.unwrap();
}
