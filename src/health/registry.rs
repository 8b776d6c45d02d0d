// src/health/registry.rs
use super::probe::HealthProbe;
use super::status::HealthStatus;
use crate::tier::ProbeSelector;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("a probe named '{0}' is already registered")]
    DuplicateName(String),
}

/// A probe together with the metadata it was registered under.
pub struct RegisteredProbe {
    pub name: String,
    pub tags: BTreeSet<String>,
    /// Status recorded when the probe faults or times out.
    pub failure_status: HealthStatus,
    pub probe: Arc<dyn HealthProbe>,
}

impl RegisteredProbe {
    pub fn new<P>(name: impl Into<String>, probe: P) -> Self
    where
        P: HealthProbe + 'static,
    {
        Self {
            name: name.into(),
            tags: BTreeSet::new(),
            failure_status: HealthStatus::Unhealthy,
            probe: Arc::new(probe),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Status recorded when the probe faults or times out. A fault is never
    /// healthy, so `Healthy` is raised to `Degraded`.
    pub fn with_failure_status(mut self, status: HealthStatus) -> Self {
        self.failure_status = status.max(HealthStatus::Degraded);
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

impl fmt::Debug for RegisteredProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredProbe")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("failure_status", &self.failure_status)
            .finish_non_exhaustive()
    }
}

/// Probes known to the process, in registration order.
///
/// Filled once during startup and shared behind an `Arc` afterwards; there is
/// no removal and no interior mutability.
#[derive(Debug, Default)]
pub struct ProbeRegistry {
    probes: Vec<Arc<RegisteredProbe>>,
    names: HashSet<String>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, probe: RegisteredProbe) -> Result<(), RegistryError> {
        if !self.names.insert(probe.name.clone()) {
            return Err(RegistryError::DuplicateName(probe.name));
        }

        tracing::debug!(
            probe = %probe.name,
            tags = ?probe.tags,
            "Registered health probe"
        );
        self.probes.push(Arc::new(probe));
        Ok(())
    }

    pub fn list_all(&self) -> Vec<Arc<RegisteredProbe>> {
        self.probes.clone()
    }

    pub fn list_by_tag(&self, tag: &str) -> Vec<Arc<RegisteredProbe>> {
        self.probes
            .iter()
            .filter(|p| p.has_tag(tag))
            .cloned()
            .collect()
    }

    /// Probes chosen by a tier's selector, in registration order.
    pub fn select(&self, selector: &ProbeSelector) -> Vec<Arc<RegisteredProbe>> {
        match selector {
            ProbeSelector::None => Vec::new(),
            ProbeSelector::All => self.list_all(),
            ProbeSelector::Tag(tag) => self.list_by_tag(tag),
            ProbeSelector::AnyTag(_) => self
                .probes
                .iter()
                .filter(|p| selector.matches(&p.tags))
                .cloned()
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}
