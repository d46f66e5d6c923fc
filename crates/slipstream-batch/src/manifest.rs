//! Run manifests.
//!
//! A manifest JSON lands next to every CLI run's outputs so results can be
//! traced back to the exact request, seed, and produced files.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub created_at: DateTime<Utc>,
    pub slate_id: String,
    pub seed: u64,
    pub n_scenarios: usize,
    pub n_lineups_requested: usize,
    pub n_lineups_produced: usize,
    pub status: String,
    pub outputs: Vec<String>,
}

pub fn write_run_manifest(path: &Path, manifest: &RunManifest) -> Result<()> {
    let data = serde_json::to_string_pretty(manifest).context("serializing run manifest")?;
    fs::write(path, data)
        .with_context(|| format!("writing run manifest '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let manifest = RunManifest {
            created_at: Utc::now(),
            slate_id: "daytona".into(),
            seed: 42,
            n_scenarios: 10_000,
            n_lineups_requested: 20,
            n_lineups_produced: 18,
            status: "partial".into(),
            outputs: vec!["lineups.csv".into()],
        };
        write_run_manifest(&path, &manifest).unwrap();
        let loaded: RunManifest =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.slate_id, "daytona");
        assert_eq!(loaded.n_lineups_produced, 18);
    }
}
