//! Freshness and identity checks.
//!
//! Both checks are pure: they look only at their arguments.

use chrono::{DateTime, Utc};

use crate::descriptor::BuildDescriptor;
use crate::installed::InstalledState;

/// Whether `candidate` should be offered over the installed build.
///
/// A published version string is decisive: any case-insensitive difference
/// from the installed version is an update, even if it looks older. Only when
/// the candidate has no version does the build date decide, and then only a
/// strictly later date counts. A candidate with neither is never an update.
pub fn is_update(
    candidate: Option<&BuildDescriptor>,
    installed_version: Option<&str>,
    installed_date: Option<DateTime<Utc>>,
) -> bool {
    let Some(candidate) = candidate else {
        return false;
    };
    if let Some(version) = candidate.version.as_deref() {
        match installed_version {
            None => return true,
            Some(installed) if !installed.eq_ignore_ascii_case(version) => return true,
            Some(_) => {}
        }
    }
    if let Some(published) = candidate.published_at {
        match installed_date {
            None => return true,
            Some(installed) if published > installed => return true,
            Some(_) => {}
        }
    }
    false
}

/// Client build number, ROM and device the updater last ran with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceIdentity {
    pub version_code: u32,
    pub device: Option<String>,
    pub rom_id: Option<String>,
}

impl DeviceIdentity {
    /// Identity of this client running on `installed`.
    pub fn current(installed: &InstalledState) -> Self {
        Self {
            version_code: client_version_code(),
            device: Some(installed.device_id.clone()).filter(|d| !d.is_empty()),
            rom_id: installed.build_id.clone(),
        }
    }
}

/// `major * 10000 + minor * 100 + patch` of this crate's version.
pub fn client_version_code() -> u32 {
    let part = |s: &str| s.parse::<u32>().unwrap_or(0);
    part(env!("CARGO_PKG_VERSION_MAJOR")) * 10_000
        + part(env!("CARGO_PKG_VERSION_MINOR")) * 100
        + part(env!("CARGO_PKG_VERSION_PATCH"))
}

/// True when nothing changed since `last_seen` was recorded. A mismatch means
/// the device was re-flashed or the client upgraded; callers then drop state
/// tied to the old identity.
pub fn up_to_date(current: &DeviceIdentity, last_seen: &DeviceIdentity) -> bool {
    let (Some(last_device), Some(last_rom)) = (&last_seen.device, &last_seen.rom_id) else {
        return false;
    };
    let Some(current_rom) = &current.rom_id else {
        return false;
    };
    current.version_code == last_seen.version_code
        && current.device.as_ref() == Some(last_device)
        && current_rom == last_rom
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn desc(version: Option<&str>, date: Option<DateTime<Utc>>) -> BuildDescriptor {
        BuildDescriptor {
            name: "Dokdo".into(),
            version: version.map(str::to_string),
            changelog: String::new(),
            url: "http://example.com/a.zip".into(),
            checksum: "d41d8cd98f00b204e9800998ecf8427e".into(),
            published_at: date,
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2014, 1, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn absent_candidate_is_not_update() {
        assert!(!is_update(None, Some("1"), Some(day(1))));
        assert!(!is_update(None, None, None));
    }

    #[test]
    fn differing_version_is_decisive() {
        // Older date, different version: still an update.
        let c = desc(Some("1.1"), Some(day(1)));
        assert!(is_update(Some(&c), Some("1.0"), Some(day(5))));
        // Lexically "older" version still counts.
        let c = desc(Some("0.9"), None);
        assert!(is_update(Some(&c), Some("1.0"), None));
    }

    #[test]
    fn version_compare_ignores_case() {
        let c = desc(Some("4.2.2-RC1"), None);
        assert!(!is_update(Some(&c), Some("4.2.2-rc1"), None));
    }

    #[test]
    fn missing_installed_version_is_update() {
        let c = desc(Some("1.0"), None);
        assert!(is_update(Some(&c), None, Some(day(1))));
    }

    #[test]
    fn equal_version_falls_back_to_date() {
        let c = desc(Some("1.0"), Some(day(3)));
        assert!(is_update(Some(&c), Some("1.0"), Some(day(2))));
        assert!(!is_update(Some(&c), Some("1.0"), Some(day(3))));
        assert!(!is_update(Some(&c), Some("1.0"), Some(day(4))));
    }

    #[test]
    fn date_only_candidate() {
        let c = desc(None, Some(day(2)));
        assert!(is_update(Some(&c), Some("1.0"), Some(day(1))));
        assert!(is_update(Some(&c), Some("1.0"), None));
        assert!(!is_update(Some(&c), None, Some(day(2))));
    }

    #[test]
    fn candidate_without_version_or_date_never_updates() {
        let c = desc(None, None);
        assert!(!is_update(Some(&c), None, None));
        assert!(!is_update(Some(&c), Some("1.0"), Some(day(1))));
    }

    fn ident(code: u32, device: Option<&str>, rom: Option<&str>) -> DeviceIdentity {
        DeviceIdentity {
            version_code: code,
            device: device.map(str::to_string),
            rom_id: rom.map(str::to_string),
        }
    }

    #[test]
    fn identical_identity_is_up_to_date() {
        let a = ident(100, Some("mako"), Some("dokdo"));
        assert!(up_to_date(&a, &a.clone()));
    }

    #[test]
    fn any_field_change_is_not_up_to_date() {
        let last = ident(100, Some("mako"), Some("dokdo"));
        assert!(!up_to_date(&ident(101, Some("mako"), Some("dokdo")), &last));
        assert!(!up_to_date(&ident(100, Some("grouper"), Some("dokdo")), &last));
        assert!(!up_to_date(&ident(100, Some("mako"), Some("other")), &last));
    }

    #[test]
    fn absent_ids_are_never_up_to_date() {
        let current = ident(100, Some("mako"), Some("dokdo"));
        assert!(!up_to_date(&current, &ident(100, None, Some("dokdo"))));
        assert!(!up_to_date(&current, &ident(100, Some("mako"), None)));
        assert!(!up_to_date(
            &ident(100, Some("mako"), None),
            &ident(100, Some("mako"), None)
        ));
    }

    #[test]
    fn current_identity_from_installed() {
        let installed = InstalledState {
            version: Some("1".into()),
            published_at: None,
            device_id: "mako".into(),
            build_id: Some("dokdo".into()),
        };
        let id = DeviceIdentity::current(&installed);
        assert_eq!(id.version_code, client_version_code());
        assert_eq!(id.device.as_deref(), Some("mako"));
        assert_eq!(id.rom_id.as_deref(), Some("dokdo"));
        assert!(installed.is_update(Some(&desc(Some("2"), None))));
    }
}
