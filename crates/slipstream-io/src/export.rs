//! DraftKings-upload CSV export.
//!
//! One row per lineup, one column per roster slot, values are driver display
//! names. No header row; UTF-8 with LF line endings; driver ids the slate
//! cannot resolve render as the literal `Unknown`.

use anyhow::{Context, Result};
use slipstream_core::{Lineup, Slate};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const UNKNOWN: &str = "Unknown";

/// Write the upload CSV to any writer.
pub fn write_dk_csv_to<W: Write>(lineups: &[Lineup], slate: &Slate, writer: W) -> Result<()> {
    // The csv crate's default record terminator is CRLF; the upload format
    // requires bare LF.
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    for lineup in lineups {
        let row: Vec<&str> = lineup
            .drivers
            .iter()
            .map(|id| slate.driver(*id).map(|d| d.name.as_str()).unwrap_or(UNKNOWN))
            .collect();
        csv_writer.write_record(&row).context("writing lineup row")?;
    }
    csv_writer.flush().context("flushing upload csv")?;
    Ok(())
}

/// Write the upload CSV to a file path.
pub fn write_dk_csv(lineups: &[Lineup], slate: &Slate, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating upload csv '{}'", path.display()))?;
    write_dk_csv_to(lineups, slate, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipstream_core::{DriverId, DriverRecord};

    fn slate() -> Slate {
        Slate::new(
            "s1",
            (0..6)
                .map(|i| {
                    DriverRecord::new(
                        DriverId::new(i),
                        format!("dk-{i}"),
                        format!("Driver {i}"),
                        if i < 3 { "Red" } else { "Blue" },
                        8000,
                        35.0,
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn two_lineups_six_fields_no_header_lf() {
        let s = slate();
        let ids: Vec<DriverId> = (0..6).map(DriverId::new).collect();
        let lineups = vec![Lineup::new(ids.clone(), &s), Lineup::new(ids, &s)];
        let mut buf = Vec::new();
        write_dk_csv_to(&lineups, &s, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(!text.contains('\r'), "expected LF-only line endings");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert_eq!(line.split(',').count(), 6);
        }
        assert!(lines[0].starts_with("Driver 0,Driver 1"));
    }

    #[test]
    fn unresolvable_ids_render_unknown() {
        let s = slate();
        // Id 99 is not on the slate.
        let lineup = Lineup {
            drivers: vec![DriverId::new(0), DriverId::new(99)],
            total_salary: 8000,
        };
        let mut buf = Vec::new();
        write_dk_csv_to(&[lineup], &s, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.trim_end(), "Driver 0,Unknown");
    }
}
