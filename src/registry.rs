//! Process-wide instance registry
//!
//! Explicit lifecycle for the set of live instances: inserted on create,
//! removed on destroy, guarded by one lock. Broadcast cookie operations go
//! to the first live instance.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::instance::WebView;

static INSTANCES: OnceLock<Mutex<Vec<Arc<WebView>>>> = OnceLock::new();

fn table() -> &'static Mutex<Vec<Arc<WebView>>> {
    INSTANCES.get_or_init(|| Mutex::new(Vec::new()))
}

/// Insert a newly created instance
pub(crate) fn register(instance: Arc<WebView>) {
    table().lock().push(instance);
}

/// Remove an instance by id; idempotent
pub(crate) fn remove(id: Uuid) {
    table().lock().retain(|instance| instance.id() != id);
}

/// Look up a live instance by id
pub(crate) fn get(id: Uuid) -> Option<Arc<WebView>> {
    table()
        .lock()
        .iter()
        .find(|instance| instance.id() == id)
        .cloned()
}

/// The first live instance, for broadcast operations
pub(crate) fn first() -> Option<Arc<WebView>> {
    table().lock().first().cloned()
}

/// Number of live instances
pub(crate) fn count() -> usize {
    table().lock().len()
}
