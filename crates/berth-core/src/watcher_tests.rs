use super::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
struct Counter {
    scans: AtomicUsize,
}

#[async_trait]
impl Rescan for Counter {
    async fn rescan(&self) {
        self.scans.fetch_add(1, Ordering::SeqCst);
    }
}

fn weak(counter: &Arc<Counter>) -> Weak<dyn Rescan> {
    let target: Arc<dyn Rescan> = counter.clone();
    Arc::downgrade(&target)
}

#[tokio::test(start_paused = true)]
async fn test_rescans_on_interval() {
    let counter = Arc::new(Counter::default());
    let shutdown = ShutdownSignal::new();
    let handle = DirectoryWatcher::new(weak(&counter), Duration::from_secs(5), shutdown.clone())
        .watch("/nonexistent/apps")
        .spawn();

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert_eq!(counter.scans.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(10_200)).await;
    assert_eq!(counter.scans.load(Ordering::SeqCst), 3);

    shutdown.trigger();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stops_when_target_dropped() {
    let counter = Arc::new(Counter::default());
    let handle = DirectoryWatcher::new(weak(&counter), Duration::from_secs(1), ShutdownSignal::new())
        .spawn();
    drop(counter);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(handle.is_finished());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_before_first_scan() {
    let counter = Arc::new(Counter::default());
    let shutdown = ShutdownSignal::new();
    let handle = DirectoryWatcher::new(weak(&counter), Duration::from_secs(60), shutdown.clone())
        .spawn();

    shutdown.trigger();
    handle.await.unwrap();
    assert_eq!(counter.scans.load(Ordering::SeqCst), 0);
}

#[test]
fn test_is_relevant_event() {
    use notify::event::{AccessKind, CreateKind, RemoveKind};

    let create = Event {
        kind: EventKind::Create(CreateKind::File),
        paths: vec![PathBuf::from("/home/apps/orders-app.tar.gz")],
        attrs: Default::default(),
    };
    assert!(is_relevant_event(&create));

    let remove = Event {
        kind: EventKind::Remove(RemoveKind::File),
        paths: vec![PathBuf::from("/home/apps/orders-app-anchor.txt")],
        attrs: Default::default(),
    };
    assert!(is_relevant_event(&remove));

    let staging = Event {
        kind: EventKind::Create(CreateKind::File),
        paths: vec![PathBuf::from("/home/apps/.orders-app.installing/classes/a.xml")],
        attrs: Default::default(),
    };
    assert!(!is_relevant_event(&staging));

    let copy = Event {
        kind: EventKind::Create(CreateKind::File),
        paths: vec![PathBuf::from("/home/apps/.orders-app.staging/classes/a.xml")],
        attrs: Default::default(),
    };
    assert!(!is_relevant_event(&copy));

    let access = Event {
        kind: EventKind::Access(AccessKind::Any),
        paths: vec![PathBuf::from("/home/apps/orders-app")],
        attrs: Default::default(),
    };
    assert!(!is_relevant_event(&access));
}
