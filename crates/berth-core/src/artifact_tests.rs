use super::*;
use crate::testing::{MockFactory, empty_parent, write};
use berth_protocols::{ConfigurationError, LifecyclePhase, PluginDescriptor};
use tempfile::TempDir;

fn fixture(temp: &TempDir) -> ArtifactDescriptor {
    let app = temp.path().join("orders-app");
    write(&app, "classes/com/acme/orders/Orders.class", "orders");
    ArtifactDescriptor::new("orders-app", ArtifactKind::Application, &app)
        .with_code_path(app.join("classes"))
}

fn artifact(descriptor: ArtifactDescriptor, factory: Arc<MockFactory>) -> DeployableArtifact {
    let fingerprint = SourceFingerprint::new(&descriptor.location, SystemTime::UNIX_EPOCH);
    DeployableArtifact::new(descriptor, fingerprint, empty_parent(), Vec::new(), factory)
}

#[test]
fn test_state_from_u8() {
    assert_eq!(ArtifactState::from(3), ArtifactState::Started);
    assert_eq!(ArtifactState::from(42), ArtifactState::Failed);
    assert_eq!(ArtifactState::Initialised.to_string(), "initialised");
}

#[tokio::test]
async fn test_full_lifecycle() {
    let temp = TempDir::new().unwrap();
    let factory = Arc::new(MockFactory::default());
    let artifact = artifact(fixture(&temp), factory.clone());
    assert_eq!(artifact.state(), ArtifactState::Uninstalled);
    assert!(artifact.unit().is_none());

    artifact.install().unwrap();
    assert_eq!(artifact.state(), ArtifactState::Installed);
    let unit = artifact.unit().unwrap();
    assert!(unit.load_class("com.acme.orders.Orders").is_ok());

    artifact.init().await.unwrap();
    artifact.start().await.unwrap();
    assert_eq!(artifact.state(), ArtifactState::Started);

    artifact.stop().await.unwrap();
    assert_eq!(artifact.state(), ArtifactState::Stopped);
    artifact.start().await.unwrap();
    artifact.stop().await.unwrap();

    artifact.dispose().await.unwrap();
    assert_eq!(artifact.state(), ArtifactState::Disposed);
    assert!(unit.is_disposed());
    assert!(artifact.unit().is_none());

    assert_eq!(
        factory.calls(),
        vec![
            "orders-app:init",
            "orders-app:start",
            "orders-app:stop",
            "orders-app:start",
            "orders-app:stop",
            "orders-app:dispose",
        ]
    );
}

#[tokio::test]
async fn test_invalid_transition() {
    let temp = TempDir::new().unwrap();
    let artifact = artifact(fixture(&temp), Arc::new(MockFactory::default()));

    let err = artifact.start().await.unwrap_err();
    match err {
        DeploymentError::InvalidTransition { from, to, .. } => {
            assert_eq!(from, "uninstalled");
            assert_eq!(to, "started");
        }
        other => panic!("unexpected: {other:?}"),
    }

    artifact.install().unwrap();
    assert!(matches!(
        artifact.install(),
        Err(DeploymentError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_install_missing_location() {
    let temp = TempDir::new().unwrap();
    let descriptor = ArtifactDescriptor::new(
        "ghost",
        ArtifactKind::Application,
        temp.path().join("ghost"),
    );
    let artifact = artifact(descriptor, Arc::new(MockFactory::default()));

    let err = artifact.install().unwrap_err();
    assert!(matches!(err, DeploymentError::Descriptor { .. }));
    assert_eq!(artifact.state(), ArtifactState::Uninstalled);
}

#[tokio::test]
async fn test_install_configuration_error() {
    let temp = TempDir::new().unwrap();
    let plugin = temp.path().join("cache");
    write(&plugin, "com/acme/cache/Cache.class", "cache");
    let descriptor = fixture(&temp)
        .with_plugin(PluginDescriptor::new("cache", &plugin))
        .with_plugin(PluginDescriptor::new("cache", &plugin));
    let artifact = artifact(descriptor, Arc::new(MockFactory::default()));

    let err = artifact.install().unwrap_err();
    match err {
        DeploymentError::Configuration { source, .. } => {
            assert!(matches!(source, ConfigurationError::DuplicatePlugin { .. }));
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(artifact.state(), ArtifactState::Uninstalled);
}

#[tokio::test]
async fn test_init_failure_disposes() {
    let temp = TempDir::new().unwrap();
    let factory = Arc::new(MockFactory::failing(LifecyclePhase::Init));
    let artifact = artifact(fixture(&temp), factory.clone());

    artifact.install().unwrap();
    let units = artifact.units().unwrap();

    let err = artifact.init().await.unwrap_err();
    match &err {
        DeploymentError::Failed { artifact, source } => {
            assert_eq!(artifact, "orders-app");
            assert!(source.to_string().contains("init exploded"));
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(artifact.state(), ArtifactState::Failed);
    assert!(units.owned().iter().all(|unit| unit.is_disposed()));
    assert_eq!(factory.calls(), vec!["orders-app:init", "orders-app:dispose"]);
}

#[tokio::test]
async fn test_start_failure_disposes() {
    let temp = TempDir::new().unwrap();
    let factory = Arc::new(MockFactory::failing(LifecyclePhase::Start));
    let artifact = artifact(fixture(&temp), factory.clone());

    artifact.install().unwrap();
    artifact.init().await.unwrap();
    let units = artifact.units().unwrap();

    assert!(artifact.start().await.is_err());
    assert_eq!(artifact.state(), ArtifactState::Failed);
    assert_eq!(units.dispose_all(), 0);

    artifact.dispose().await.unwrap();
    assert_eq!(artifact.state(), ArtifactState::Failed);
}

#[tokio::test]
async fn test_stop_when_not_started_is_noop() {
    let temp = TempDir::new().unwrap();
    let factory = Arc::new(MockFactory::default());
    let artifact = artifact(fixture(&temp), factory.clone());

    artifact.stop().await.unwrap();
    artifact.install().unwrap();
    artifact.stop().await.unwrap();
    assert_eq!(artifact.state(), ArtifactState::Installed);
    assert!(factory.calls().is_empty());
}

#[tokio::test]
async fn test_stop_failure_still_stops() {
    let temp = TempDir::new().unwrap();
    let artifact = artifact(
        fixture(&temp),
        Arc::new(MockFactory::failing(LifecyclePhase::Stop)),
    );
    artifact.install().unwrap();
    artifact.init().await.unwrap();
    artifact.start().await.unwrap();

    assert!(artifact.stop().await.is_err());
    assert_eq!(artifact.state(), ArtifactState::Stopped);
    artifact.dispose().await.unwrap();
    assert_eq!(artifact.state(), ArtifactState::Disposed);
}

#[tokio::test]
async fn test_dispose_uninstalled_keeps_state_and_blocks_install() {
    let temp = TempDir::new().unwrap();
    let artifact = artifact(fixture(&temp), Arc::new(MockFactory::default()));

    artifact.dispose().await.unwrap();
    assert!(artifact.is_disposed());
    assert_eq!(artifact.state(), ArtifactState::Uninstalled);

    let err = artifact.install().unwrap_err();
    assert!(matches!(err, DeploymentError::InvalidTransition { from, .. } if from == "disposed"));
    assert!(artifact.units().is_none());
}

#[tokio::test]
async fn test_dispose_idempotent() {
    let temp = TempDir::new().unwrap();
    let factory = Arc::new(MockFactory::failing(LifecyclePhase::Dispose));
    let artifact = artifact(fixture(&temp), factory.clone());
    artifact.install().unwrap();
    artifact.init().await.unwrap();
    let units = artifact.units().unwrap();

    assert!(artifact.dispose().await.is_err());
    assert!(units.owned().iter().all(|unit| unit.is_disposed()));
    artifact.dispose().await.unwrap();

    let disposals = factory
        .calls()
        .iter()
        .filter(|call| call.ends_with(":dispose"))
        .count();
    assert_eq!(disposals, 1);
}

#[test]
fn test_fingerprint_of_directory_uses_manifest() {
    let temp = TempDir::new().unwrap();
    let app = temp.path().join("orders-app");
    fs::create_dir_all(&app).unwrap();

    let without = SourceFingerprint::of(&app).unwrap();
    assert_eq!(without.last_modified, fs::metadata(&app).unwrap().modified().unwrap());

    write(&app, ARTIFACT_MANIFEST, "");
    let manifest = app.join(ARTIFACT_MANIFEST);
    let stamp = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000);
    fs::File::options()
        .write(true)
        .open(&manifest)
        .unwrap()
        .set_modified(stamp)
        .unwrap();

    let with = SourceFingerprint::of(&app).unwrap();
    assert_eq!(with.path, app);
    assert_eq!(with.last_modified, stamp);
}

#[test]
fn test_fingerprint_of_missing_path() {
    let temp = TempDir::new().unwrap();
    assert!(SourceFingerprint::of(&temp.path().join("missing")).is_err());
}
