//! Update checks against the persisted record.
//!
//! [`UpdaterState`] bundles the store with the installed build and is built
//! once per run. The check functions decide whether a descriptor is worth
//! telling the user about and keep the stored update in sync with that
//! decision.

use anyhow::{Context, Result};
use std::path::Path;

use crate::control::CancelToken;
use crate::descriptor::BuildDescriptor;
use crate::freshness::{up_to_date, DeviceIdentity};
use crate::installed::InstalledState;
use crate::store::UpdateStore;
use crate::transport::{fetch_bytes, Transport};

/// Descriptor documents are small; anything bigger is not a descriptor.
const DESCRIPTOR_LIMIT: usize = 1024 * 1024;

/// Result of a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckReport {
    /// An update is available and notifications are on.
    Notify(BuildDescriptor),
    /// An update is available but notifications are off.
    Suppressed(BuildDescriptor),
    NoUpdate,
    /// The installed build has no ROM id, so no update can apply to it.
    Unsupported,
}

impl CheckReport {
    pub fn update(&self) -> Option<&BuildDescriptor> {
        match self {
            CheckReport::Notify(d) | CheckReport::Suppressed(d) => Some(d),
            CheckReport::NoUpdate | CheckReport::Unsupported => None,
        }
    }
}

pub struct UpdaterState {
    pub store: UpdateStore,
    pub installed: InstalledState,
    pub identity: DeviceIdentity,
    /// Whether `identity` matches the one recorded by the previous run.
    pub identity_up_to_date: bool,
}

impl UpdaterState {
    /// Read the record for `installed`. A changed identity (re-flash or
    /// client upgrade) resets the ignored data warning.
    pub async fn load(store: UpdateStore, installed: InstalledState) -> Result<Self> {
        let identity = DeviceIdentity::current(&installed);
        let last = store.last_identity().await?;
        let identity_up_to_date = last
            .as_ref()
            .is_some_and(|last| up_to_date(&identity, last));
        if !identity_up_to_date {
            tracing::info!(?identity, ?last, "device identity changed since last run");
            store.set_ignored_data_warn(false).await?;
        }
        Ok(Self {
            store,
            installed,
            identity,
            identity_up_to_date,
        })
    }

    /// Persist the current identity as last seen.
    pub async fn mark_current(&mut self) -> Result<()> {
        self.store.set_values_to_current(&self.identity).await?;
        self.identity_up_to_date = true;
        Ok(())
    }

    async fn report(&self, descriptor: BuildDescriptor) -> Result<CheckReport> {
        if self.store.show_notif().await? {
            Ok(CheckReport::Notify(descriptor))
        } else {
            Ok(CheckReport::Suppressed(descriptor))
        }
    }
}

/// Re-evaluate the stored update against the installed build. A stored
/// update that no longer applies (the user flashed it) is cleared, even on
/// an unsupported build.
pub async fn evaluate_stored(state: &UpdaterState) -> Result<CheckReport> {
    if let Some(descriptor) = state.store.stored_update().await? {
        if state.installed.is_update(Some(&descriptor)) {
            return state.report(descriptor).await;
        }
        tracing::debug!("stored update already installed, clearing");
        state.store.clear_stored_update().await?;
    }
    if state.installed.is_supported() {
        Ok(CheckReport::NoUpdate)
    } else {
        Ok(CheckReport::Unsupported)
    }
}

/// Evaluate a freshly fetched descriptor, storing it if it is an update and
/// clearing the stored update otherwise.
pub async fn evaluate_fetched(
    state: &UpdaterState,
    descriptor: BuildDescriptor,
) -> Result<CheckReport> {
    if !state.installed.is_supported() {
        return Ok(CheckReport::Unsupported);
    }
    if state.installed.is_update(Some(&descriptor)) {
        tracing::info!(name = %descriptor.name, version = ?descriptor.version, "update available");
        state.store.store_update(&descriptor).await?;
        state.report(descriptor).await
    } else {
        state.store.clear_stored_update().await?;
        Ok(CheckReport::NoUpdate)
    }
}

/// Load descriptor JSON from an `http(s)://` URL or a local file.
pub fn load_descriptor(
    source: &str,
    transport: &dyn Transport,
    cancel: &CancelToken,
) -> Result<BuildDescriptor> {
    let data = if source.starts_with("http://") || source.starts_with("https://") {
        fetch_bytes(transport, source, DESCRIPTOR_LIMIT, cancel)
            .with_context(|| format!("fetch descriptor {}", source))?
    } else {
        let path = Path::new(source);
        std::fs::read(path).with_context(|| format!("read descriptor {}", path.display()))?
    };
    BuildDescriptor::from_json(&data).with_context(|| format!("parse descriptor {}", source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::UpdateStore;
    use crate::transport::{FetchError, Response, ResponseHead};

    fn installed(version: &str, rom: Option<&str>) -> InstalledState {
        InstalledState {
            version: Some(version.into()),
            published_at: None,
            device_id: "mako".into(),
            build_id: rom.map(str::to_string),
        }
    }

    fn descriptor(version: &str) -> BuildDescriptor {
        BuildDescriptor {
            name: "Dokdo".into(),
            version: Some(version.into()),
            changelog: String::new(),
            url: "http://example.com/dokdo.zip".into(),
            checksum: "d41d8cd98f00b204e9800998ecf8427e".into(),
            published_at: None,
        }
    }

    async fn store() -> (tempfile::TempDir, UpdateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = UpdateStore::open_at(dir.path().join("update.db"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn fetched_update_is_stored_and_reported() {
        let (_dir, store) = store().await;
        let state = UpdaterState::load(store, installed("1.0", Some("dokdo")))
            .await
            .unwrap();
        let report = evaluate_fetched(&state, descriptor("1.1")).await.unwrap();
        assert_eq!(report, CheckReport::Notify(descriptor("1.1")));
        assert_eq!(
            state.store.stored_update().await.unwrap(),
            Some(descriptor("1.1"))
        );
    }

    #[tokio::test]
    async fn same_version_clears_stored_update() {
        let (_dir, store) = store().await;
        store.store_update(&descriptor("0.9")).await.unwrap();
        let state = UpdaterState::load(store, installed("1.0", Some("dokdo")))
            .await
            .unwrap();
        let report = evaluate_fetched(&state, descriptor("1.0")).await.unwrap();
        assert_eq!(report, CheckReport::NoUpdate);
        assert!(state.store.stored_update().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn notifications_off_suppresses() {
        let (_dir, store) = store().await;
        store.set_show_notif(false).await.unwrap();
        let state = UpdaterState::load(store, installed("1.0", Some("dokdo")))
            .await
            .unwrap();
        let report = evaluate_fetched(&state, descriptor("2.0")).await.unwrap();
        assert_eq!(report, CheckReport::Suppressed(descriptor("2.0")));
        assert_eq!(report.update(), Some(&descriptor("2.0")));
    }

    #[tokio::test]
    async fn stored_update_cleared_once_installed() {
        let (_dir, store) = store().await;
        store.store_update(&descriptor("1.1")).await.unwrap();

        let state = UpdaterState::load(store.clone(), installed("1.0", Some("dokdo")))
            .await
            .unwrap();
        assert_eq!(
            evaluate_stored(&state).await.unwrap(),
            CheckReport::Notify(descriptor("1.1"))
        );

        let state = UpdaterState::load(store, installed("1.1", Some("dokdo")))
            .await
            .unwrap();
        assert_eq!(evaluate_stored(&state).await.unwrap(), CheckReport::NoUpdate);
        assert!(state.store.stored_update().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unsupported_build_reports_unsupported() {
        let (_dir, store) = store().await;
        let state = UpdaterState::load(store, installed("1.0", None)).await.unwrap();
        assert_eq!(
            evaluate_fetched(&state, descriptor("2.0")).await.unwrap(),
            CheckReport::Unsupported
        );
        assert_eq!(evaluate_stored(&state).await.unwrap(), CheckReport::Unsupported);
    }

    #[tokio::test]
    async fn stale_stored_update_cleared_on_unsupported_build() {
        let (_dir, store) = store().await;
        store.store_update(&descriptor("1.0")).await.unwrap();
        let state = UpdaterState::load(store.clone(), installed("1.0", None))
            .await
            .unwrap();
        assert_eq!(evaluate_stored(&state).await.unwrap(), CheckReport::Unsupported);
        assert!(store.stored_update().await.unwrap().is_none());

        // A stored update that still applies is reported regardless.
        store.store_update(&descriptor("1.1")).await.unwrap();
        assert_eq!(
            evaluate_stored(&state).await.unwrap(),
            CheckReport::Notify(descriptor("1.1"))
        );
    }

    #[tokio::test]
    async fn identity_change_resets_data_warning() {
        let (_dir, store) = store().await;
        let mut state = UpdaterState::load(store.clone(), installed("1.0", Some("dokdo")))
            .await
            .unwrap();
        assert!(!state.identity_up_to_date);
        state.mark_current().await.unwrap();
        store.set_ignored_data_warn(true).await.unwrap();

        // Same identity: the setting survives.
        let state = UpdaterState::load(store.clone(), installed("1.0", Some("dokdo")))
            .await
            .unwrap();
        assert!(state.identity_up_to_date);
        assert!(store.ignored_data_warn().await.unwrap());

        // Re-flashed with another ROM: the setting is reset.
        let state = UpdaterState::load(store.clone(), installed("1.0", Some("other")))
            .await
            .unwrap();
        assert!(!state.identity_up_to_date);
        assert!(!store.ignored_data_warn().await.unwrap());
    }

    struct Fixed(&'static [u8]);

    struct FixedBody(&'static [u8], usize);

    impl Response for FixedBody {
        fn head(&self) -> ResponseHead {
            ResponseHead {
                status: 200,
                content_length: Some(self.0.len() as u64),
            }
        }

        fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, FetchError> {
            let n = (self.0.len() - self.1).min(buf.len());
            buf[..n].copy_from_slice(&self.0[self.1..self.1 + n]);
            self.1 += n;
            Ok(n)
        }
    }

    impl Transport for Fixed {
        fn open(&self, _url: &str, _cancel: &CancelToken) -> Result<Box<dyn Response>, FetchError> {
            Ok(Box::new(FixedBody(self.0, 0)))
        }
    }

    #[test]
    fn load_descriptor_from_url_and_file() {
        let json: &'static [u8] =
            br#"{"rom":"Dokdo","version":"1.1","url":"http://example.com/d.zip","md5":"abc"}"#;
        let cancel = CancelToken::new();
        let d = load_descriptor("http://example.com/latest.json", &Fixed(json), &cancel).unwrap();
        assert_eq!(d.version.as_deref(), Some("1.1"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.json");
        std::fs::write(&path, json).unwrap();
        let d = load_descriptor(path.to_str().unwrap(), &Fixed(b""), &cancel).unwrap();
        assert_eq!(d.url, "http://example.com/d.zip");

        assert!(load_descriptor("/nonexistent/latest.json", &Fixed(b""), &cancel).is_err());
    }
}
