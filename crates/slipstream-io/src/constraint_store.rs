//! Read-only constraint store.
//!
//! Constraint specs live as one YAML or JSON file per slate under a root
//! directory; the backing layout is opaque to callers, which only see
//! `slate_id → ConstraintSpec`.

use anyhow::{anyhow, Context, Result};
use slipstream_core::ConstraintSpec;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory-backed `slate_id → ConstraintSpec` lookup.
#[derive(Debug, Clone)]
pub struct ConstraintStore {
    root: PathBuf,
}

impl ConstraintStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Load the spec for a slate. Missing slates are an error; use
    /// [`ConstraintStore::load_or_default`] when an unconstrained run is
    /// acceptable.
    pub fn load(&self, slate_id: &str) -> Result<ConstraintSpec> {
        let path = self
            .locate(slate_id)
            .ok_or_else(|| anyhow!("no constraint spec for slate '{slate_id}'"))?;
        let data = fs::read_to_string(&path)
            .with_context(|| format!("reading constraint spec '{}'", path.display()))?;
        let spec: ConstraintSpec = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => {
                serde_json::from_str(&data).context("parsing constraint spec json")?
            }
            _ => serde_yaml::from_str(&data).context("parsing constraint spec yaml")?,
        };
        spec.validate()
            .with_context(|| format!("validating constraint spec for '{slate_id}'"))?;
        Ok(spec)
    }

    /// Load the spec, falling back to site defaults when the store has no
    /// entry for the slate.
    pub fn load_or_default(&self, slate_id: &str) -> Result<ConstraintSpec> {
        if self.locate(slate_id).is_none() {
            debug!(slate = slate_id, "no constraint spec; using defaults");
            return Ok(ConstraintSpec::default());
        }
        self.load(slate_id)
    }

    fn locate(&self, slate_id: &str) -> Option<PathBuf> {
        for ext in ["yaml", "yml", "json"] {
            let candidate = self.root.join(format!("{slate_id}.{ext}"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_yaml_spec() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("daytona.yaml"),
            r#"
roster:
  n_roster: 6
  salary_cap: 50000
drivers:
  locked: [0]
  excluded: [3]
track:
  difficulty: 0.8
  aggression_factor: 1.2
  caution_rate: 7.5
  pit_window:
    open_lap: 38
    close_lap: 52
"#,
        )
        .unwrap();
        let store = ConstraintStore::new(dir.path());
        let spec = store.load("daytona").unwrap();
        assert_eq!(spec.roster.salary_cap, 50_000);
        assert_eq!(spec.drivers.locked.len(), 1);
        assert!((spec.track.difficulty - 0.8).abs() < 1e-12);
    }

    #[test]
    fn missing_slate_errors_but_default_fallback_works() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConstraintStore::new(dir.path());
        assert!(store.load("nowhere").is_err());
        let spec = store.load_or_default("nowhere").unwrap();
        assert_eq!(spec.roster.n_roster, 6);
    }

    #[test]
    fn invalid_spec_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("bad.yaml"),
            "drivers:\n  locked: [1]\n  excluded: [1]\n",
        )
        .unwrap();
        let store = ConstraintStore::new(dir.path());
        assert!(store.load("bad").is_err());
    }
}
