//! Slate importers.
//!
//! The optimizer works exclusively in dense integer indices; those indices
//! are assigned here, in file order, when a slate enters the system. The
//! site's opaque display id is kept alongside for the export boundary.

use anyhow::{Context, Result};
use serde::Deserialize;
use slipstream_core::{DriverId, DriverRecord, Slate, TrackArchetype};
use std::fs;
use std::path::Path;

/// One row of a slate CSV; ids are assigned by position.
#[derive(Debug, Deserialize)]
struct SlateRow {
    display_id: String,
    name: String,
    team: String,
    salary: u32,
    projected_points: f64,
    #[serde(default)]
    skill: f64,
    #[serde(default)]
    recent_form: f64,
    #[serde(default)]
    track_archetype: Option<TrackArchetype>,
    #[serde(default)]
    projected_ownership: Option<f64>,
}

/// Load a slate from CSV or JSON, keyed by file extension (CSV otherwise).
/// The returned slate is validated and its display index is built.
pub fn load_slate_from_path(path: &Path, slate_id: &str) -> Result<Slate> {
    let slate = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            let data = fs::read_to_string(path)
                .with_context(|| format!("reading slate '{}'", path.display()))?;
            let mut slate: Slate =
                serde_json::from_str(&data).context("parsing slate json")?;
            slate.reindex();
            slate
        }
        _ => load_slate_from_csv(path, slate_id)?,
    };
    slate
        .validate()
        .with_context(|| format!("validating slate '{}'", slate_id))?;
    Ok(slate)
}

fn load_slate_from_csv(path: &Path, slate_id: &str) -> Result<Slate> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening slate csv '{}'", path.display()))?;
    let mut drivers = Vec::new();
    for (i, row) in reader.deserialize::<SlateRow>().enumerate() {
        let row = row.with_context(|| format!("slate csv row {}", i + 1))?;
        drivers.push(DriverRecord {
            driver_id: DriverId::new(i),
            display_id: row.display_id,
            name: row.name,
            team: row.team,
            salary: row.salary,
            projected_points: row.projected_points,
            skill: row.skill,
            recent_form: row.recent_form,
            track_archetype: row.track_archetype.unwrap_or_default(),
            projected_ownership: row.projected_ownership,
        });
    }
    Ok(Slate::new(slate_id, drivers))
}
