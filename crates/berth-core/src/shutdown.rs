//! Process shutdown.
//!
//! Two pieces live here: a [`ShutdownSignal`] broadcast to the tasks of one
//! component, and the process-wide hook table owned by the host binary. The hook
//! table must be explicitly [`install`]ed; hooks then run once, in reverse
//! registration order, when the host calls [`run`].

use std::future::Future;

use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::ShutdownError;

/// Shutdown signal for background tasks.
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    pub fn trigger(&self) {
        let _ = self.sender.send(());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

type Hook = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// `None` until installed, and again after the hooks ran.
static HOOKS: Lazy<Mutex<Option<Vec<(String, Hook)>>>> = Lazy::new(|| Mutex::new(None));

/// Install the hook table. Returns `false` if it was already installed.
pub fn install() -> bool {
    let mut hooks = HOOKS.lock();
    if hooks.is_some() {
        return false;
    }
    *hooks = Some(Vec::new());
    debug!("Shutdown hooks installed");
    true
}

pub fn is_installed() -> bool {
    HOOKS.lock().is_some()
}

/// Register a named hook.
pub fn register<F, Fut>(name: impl Into<String>, hook: F) -> Result<(), ShutdownError>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let name = name.into();
    let mut guard = HOOKS.lock();
    let hooks = guard.as_mut().ok_or(ShutdownError::NotInstalled)?;
    if hooks.iter().any(|(existing, _)| *existing == name) {
        return Err(ShutdownError::AlreadyRegistered(name));
    }
    debug!("Registered shutdown hook {}", name);
    hooks.push((name, Box::new(move || Box::pin(hook()) as BoxFuture<'static, ()>)));
    Ok(())
}

/// Remove a hook without running it.
pub fn unregister(name: &str) -> bool {
    let mut guard = HOOKS.lock();
    let Some(hooks) = guard.as_mut() else {
        return false;
    };
    let before = hooks.len();
    hooks.retain(|(existing, _)| existing != name);
    hooks.len() != before
}

/// Run every hook in reverse registration order and uninstall the table.
///
/// Returns how many hooks ran.
pub async fn run() -> usize {
    let hooks = HOOKS.lock().take().unwrap_or_default();
    let count = hooks.len();
    for (name, hook) in hooks.into_iter().rev() {
        info!("Running shutdown hook {}", name);
        hook().await;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_shutdown_signal() {
        let signal = ShutdownSignal::new();
        let mut rx = signal.subscribe();
        signal.trigger();
        assert!(rx.try_recv().is_ok());
    }

    // The hook table is process-wide, so its whole lifecycle is one test.
    #[tokio::test]
    async fn test_hook_lifecycle() {
        assert!(!is_installed());
        assert!(matches!(
            register("early", || async {}),
            Err(ShutdownError::NotInstalled)
        ));

        assert!(install());
        assert!(!install());

        let order = Arc::new(Mutex::new(Vec::new()));
        for name in ["container", "service", "dropped"] {
            let order = order.clone();
            register(name, move || async move {
                order.lock().push(name);
            })
            .unwrap();
        }
        assert!(matches!(
            register("service", || async {}),
            Err(ShutdownError::AlreadyRegistered(_))
        ));

        assert!(unregister("dropped"));
        assert!(!unregister("dropped"));

        assert_eq!(run().await, 2);
        assert_eq!(*order.lock(), vec!["service", "container"]);
        assert!(!is_installed());
        assert_eq!(run().await, 0);
    }
}
