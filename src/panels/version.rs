//! Version badge shown in the page footer.

use serde_derive::Serialize;

use crate::store::ConsoleStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionView {
    pub version: String,
}

/// `None` until the status has been fetched with a non-empty version.
pub fn version_view(store: &ConsoleStore) -> Option<VersionView> {
    store.select(|s| {
        s.dashboard.dns_version.as_ref().map(|version| VersionView {
            version: version.clone(),
        })
    })
}
