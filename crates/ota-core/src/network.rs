//! Metered-connection detection, for the data warning before a download.
//!
//! NetworkManager publishes its guess as the `Metered` property on its root
//! object; it is read with `busctl`. Without NetworkManager the answer is
//! [`Metering::Unknown`], which does not trigger the warning.

use std::process::{Command, Stdio};

/// NetworkManager's `NMMetered` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metering {
    Unknown,
    Yes,
    No,
    GuessYes,
    GuessNo,
}

impl Metering {
    fn from_code(code: u32) -> Self {
        match code {
            1 => Metering::Yes,
            2 => Metering::No,
            3 => Metering::GuessYes,
            4 => Metering::GuessNo,
            _ => Metering::Unknown,
        }
    }

    pub fn is_metered(self) -> bool {
        matches!(self, Metering::Yes | Metering::GuessYes)
    }
}

pub trait MeteredProbe: Send + Sync {
    fn metering(&self) -> Metering;
}

/// Asks NetworkManager over D-Bus via `busctl`.
#[derive(Debug, Clone)]
pub struct NetworkManagerProbe {
    pub program: String,
}

impl Default for NetworkManagerProbe {
    fn default() -> Self {
        Self {
            program: "busctl".to_string(),
        }
    }
}

impl MeteredProbe for NetworkManagerProbe {
    fn metering(&self) -> Metering {
        let output = Command::new(&self.program)
            .args([
                "get-property",
                "org.freedesktop.NetworkManager",
                "/org/freedesktop/NetworkManager",
                "org.freedesktop.NetworkManager",
                "Metered",
            ])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();
        match output {
            Ok(out) if out.status.success() => {
                parse_busctl_metered(&String::from_utf8_lossy(&out.stdout))
            }
            Ok(out) => {
                tracing::debug!(status = %out.status, "NetworkManager metered query failed");
                Metering::Unknown
            }
            Err(e) => {
                tracing::debug!("could not run {}: {}", self.program, e);
                Metering::Unknown
            }
        }
    }
}

/// Parse `busctl get-property` output such as `u 4`.
pub fn parse_busctl_metered(out: &str) -> Metering {
    let mut parts = out.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("u"), Some(code)) => code
            .parse()
            .map(Metering::from_code)
            .unwrap_or(Metering::Unknown),
        _ => Metering::Unknown,
    }
}

/// Whether to stop and ask before downloading. Once the user has accepted the
/// warning it stays quiet until the device identity changes.
pub fn needs_data_warning(metering: Metering, ignored_data_warn: bool) -> bool {
    metering.is_metered() && !ignored_data_warn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_busctl_output() {
        assert_eq!(parse_busctl_metered("u 1\n"), Metering::Yes);
        assert_eq!(parse_busctl_metered("u 3"), Metering::GuessYes);
        assert_eq!(parse_busctl_metered("u 4\n"), Metering::GuessNo);
        assert_eq!(parse_busctl_metered("u 9"), Metering::Unknown);
        assert_eq!(parse_busctl_metered("s \"yes\""), Metering::Unknown);
        assert_eq!(parse_busctl_metered(""), Metering::Unknown);
    }

    #[test]
    fn warning_only_on_metered_and_not_ignored() {
        assert!(needs_data_warning(Metering::Yes, false));
        assert!(needs_data_warning(Metering::GuessYes, false));
        assert!(!needs_data_warning(Metering::Yes, true));
        assert!(!needs_data_warning(Metering::No, false));
        assert!(!needs_data_warning(Metering::Unknown, false));
    }

    #[test]
    fn missing_busctl_is_unknown() {
        let probe = NetworkManagerProbe {
            program: "/nonexistent/busctl".to_string(),
        };
        assert_eq!(probe.metering(), Metering::Unknown);
    }
}
