//! Lifecycle of the published rule set.
//!
//! Readers take an `Arc` snapshot through a lock-free load; reload parses
//! and validates a complete new `RuleSet` before a single atomic store
//! publishes it. A failed reload leaves the previous snapshot in place.

use crate::error::SiraError;
use crate::rules::ruleset::RuleSet;
use crate::rules::{builtin, load_ruleset, parse_ruleset, DocumentFormat};
use arc_swap::ArcSwap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Where a rule document comes from. Chosen by the caller; the store never
/// decides on its own which document to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    File(PathBuf),
    Preset(String),
    Inline {
        name: String,
        format: DocumentFormat,
        text: String,
    },
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSource::File(path) => write!(f, "{}", path.display()),
            RuleSource::Preset(name) => write!(f, "preset:{name}"),
            RuleSource::Inline { name, .. } => write!(f, "{name}"),
        }
    }
}

impl RuleSource {
    /// Read, parse and validate. Never touches any published snapshot.
    pub fn load(&self) -> Result<RuleSet, SiraError> {
        match self {
            RuleSource::File(path) => load_ruleset(path),
            RuleSource::Preset(name) => builtin::load_preset(name),
            RuleSource::Inline { name, format, text } => parse_ruleset(text, *format, name),
        }
    }
}

/// Holds the currently published rule set.
pub struct RuleStore {
    current: ArcSwap<RuleSet>,
}

impl RuleStore {
    pub fn new(initial: RuleSet) -> Self {
        RuleStore {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// Load `source` and start a store serving it.
    pub fn open(source: &RuleSource) -> Result<Self, SiraError> {
        let ruleset = Self::load(source)?;
        Ok(Self::new(ruleset))
    }

    /// Build a rule set from `source` without publishing it.
    pub fn load(source: &RuleSource) -> Result<RuleSet, SiraError> {
        let ruleset = source.load()?;
        tracing::info!(
            source = %source,
            version = ruleset.version(),
            rules = ruleset.rules().len(),
            overrides = ruleset.overrides().len(),
            "rule set loaded"
        );
        Ok(ruleset)
    }

    /// Load `source` and, only if it validates, publish it in place of the
    /// current snapshot. Concurrent reloads are last-writer-wins.
    pub fn reload(&self, source: &RuleSource) -> Result<Arc<RuleSet>, SiraError> {
        let previous_version = self.current.load().version().to_string();
        let ruleset = match Self::load(source) {
            Ok(rs) => Arc::new(rs),
            Err(e) => {
                tracing::warn!(
                    source = %source,
                    active_version = %previous_version,
                    error = %e,
                    "reload rejected, keeping active rule set"
                );
                return Err(e);
            }
        };
        self.current.store(Arc::clone(&ruleset));
        tracing::info!(
            source = %source,
            previous_version = %previous_version,
            version = ruleset.version(),
            "rule set published"
        );
        Ok(ruleset)
    }

    /// The published snapshot. No I/O, no locking.
    pub fn current(&self) -> Arc<RuleSet> {
        self.current.load_full()
    }
}

impl fmt::Debug for RuleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current.load();
        f.debug_struct("RuleStore")
            .field("version", &current.version())
            .field("source", &current.provenance().source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Method;

    fn inline(version: &str, body: &str) -> RuleSource {
        RuleSource::Inline {
            name: format!("inline-{version}"),
            format: DocumentFormat::Json,
            text: format!(r#"{{ "version": "{version}", "rules": [ {body} ] }}"#),
        }
    }

    const CIPRO: &str = r#"{ "organism": {"name": "Escherichia coli"},
        "antibiotic": {"name": "Ciprofloxacin"}, "method": "MIC",
        "mic": { "susceptible_max": 0.25, "resistant_min": 1 } }"#;

    #[test]
    fn test_open_and_current() {
        let store = RuleStore::open(&inline("v1", CIPRO)).unwrap();
        let rs = store.current();
        assert_eq!(rs.version(), "v1");
        assert_eq!(rs.provenance().source, "inline-v1");
    }

    #[test]
    fn test_reload_publishes_new_snapshot() {
        let store = RuleStore::open(&inline("v1", CIPRO)).unwrap();
        let held = store.current();
        let published = store.reload(&inline("v2", CIPRO)).unwrap();
        assert_eq!(published.version(), "v2");
        assert_eq!(store.current().version(), "v2");
        // a snapshot taken before the reload is unaffected
        assert_eq!(held.version(), "v1");
    }

    #[test]
    fn test_failed_reload_keeps_previous() {
        let store = RuleStore::open(&inline("v1", CIPRO)).unwrap();
        let bad = inline("v2", r#"{ "organism": {"name": "Escherichia coli"}, "method": "MIC" }"#);
        let err = store.reload(&bad).unwrap_err();
        assert!(matches!(err, SiraError::Validation(ref v) if v.mentions_rule(0)));
        let rs = store.current();
        assert_eq!(rs.version(), "v1");
        assert!(rs
            .find_rule("Escherichia coli", "Ciprofloxacin", Method::Mic)
            .is_some());
    }

    #[test]
    fn test_source_display() {
        assert_eq!(RuleSource::Preset("demo".into()).to_string(), "preset:demo");
        assert_eq!(RuleSource::File("rules/x.yaml".into()).to_string(), "rules/x.yaml");
    }
}
