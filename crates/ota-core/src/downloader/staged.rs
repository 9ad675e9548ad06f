//! Two-phase fetches for hosts that serve an interstitial first.
//!
//! Some mirrors answer the first GET with a waiting page and only serve the
//! real package when the same URL is requested again after a delay. A
//! [`FetchStrategy`] turns that initial response into the final one; the
//! [`StrategyRegistry`] picks a strategy by URL.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use super::events::EventHub;
use super::outcome::DownloadEvent;
use crate::config::StagedHostConfig;
use crate::control::CancelToken;
use crate::transport::{FetchError, Response, Transport};

/// What a strategy may use while producing the final response.
pub struct StageContext<'a> {
    pub url: &'a str,
    pub transport: &'a dyn Transport,
    pub cancel: &'a CancelToken,
    hub: Option<&'a EventHub>,
}

impl<'a> StageContext<'a> {
    pub(crate) fn new(
        url: &'a str,
        transport: &'a dyn Transport,
        cancel: &'a CancelToken,
        hub: Option<&'a EventHub>,
    ) -> Self {
        Self {
            url,
            transport,
            cancel,
            hub,
        }
    }

    /// Tell observers the job is busy without a byte count.
    pub fn signal_indeterminate(&self) {
        if let Some(hub) = self.hub {
            hub.publish(DownloadEvent::Indeterminate);
        }
    }
}

pub trait FetchStrategy: Send + Sync {
    /// Consume the initial response and return the one whose body is the package.
    fn final_response(
        &self,
        initial: Box<dyn Response>,
        ctx: &StageContext<'_>,
    ) -> Result<Box<dyn Response>, FetchError>;
}

pub trait UrlPredicate: Send + Sync {
    fn matches(&self, url: &Url) -> bool;
}

/// Matches a host and all of its subdomains, case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPattern {
    host: String,
}

impl HostPattern {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.trim().trim_end_matches('.').to_ascii_lowercase(),
        }
    }
}

impl UrlPredicate for HostPattern {
    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        host == self.host
            || host
                .strip_suffix(self.host.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}

/// Drain the interstitial, wait out the cooldown, then request the URL again.
#[derive(Debug, Clone, Copy)]
pub struct CooldownStrategy {
    cooldown: Duration,
}

impl CooldownStrategy {
    pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(10_500);

    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }
}

impl Default for CooldownStrategy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_COOLDOWN)
    }
}

impl FetchStrategy for CooldownStrategy {
    fn final_response(
        &self,
        mut initial: Box<dyn Response>,
        ctx: &StageContext<'_>,
    ) -> Result<Box<dyn Response>, FetchError> {
        let mut scratch = [0u8; 4096];
        let mut discarded = 0u64;
        loop {
            if ctx.cancel.is_cancelled() {
                return Err(FetchError::Interrupted);
            }
            let n = initial.read_chunk(&mut scratch)?;
            if n == 0 {
                break;
            }
            discarded += n as u64;
        }
        drop(initial);
        tracing::debug!(
            url = ctx.url,
            discarded,
            cooldown_ms = self.cooldown.as_millis() as u64,
            "staged host: waiting before second request"
        );

        ctx.signal_indeterminate();
        if !ctx.cancel.sleep(self.cooldown) {
            return Err(FetchError::Interrupted);
        }
        ctx.transport.open(ctx.url, ctx.cancel)
    }
}

/// Ordered (predicate, strategy) pairs; the first match wins.
#[derive(Default)]
pub struct StrategyRegistry {
    entries: Vec<(Box<dyn UrlPredicate>, Arc<dyn FetchStrategy>)>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One [`CooldownStrategy`] per configured staged host.
    pub fn from_config(hosts: &[StagedHostConfig]) -> Self {
        let mut registry = Self::new();
        for h in hosts {
            registry.register(
                HostPattern::new(&h.host),
                CooldownStrategy::new(Duration::from_millis(h.cooldown_ms)),
            );
        }
        registry
    }

    pub fn register(
        &mut self,
        predicate: impl UrlPredicate + 'static,
        strategy: impl FetchStrategy + 'static,
    ) -> &mut Self {
        self.entries.push((Box::new(predicate), Arc::new(strategy)));
        self
    }

    /// Strategy for `url`, if any. Unparseable URLs never match.
    pub fn select(&self, url: &str) -> Option<Arc<dyn FetchStrategy>> {
        let parsed = Url::parse(url).ok()?;
        self.entries
            .iter()
            .find(|(pred, _)| pred.matches(&parsed))
            .map(|(_, strategy)| Arc::clone(strategy))
    }
}
