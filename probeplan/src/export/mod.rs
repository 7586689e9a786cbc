//! Plan export
//!
//! Writes the outcome of an instrumentation round as JSON, for offline
//! inspection or for handing to a transformer running in another process.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::agent::InstrumentationSummary;
use crate::domain::JobId;
use crate::resolution::InstrumentationPlan;

/// Bumped on incompatible changes to the export layout
pub const EXPORT_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct PlanExport<'a> {
    format_version: u32,
    entity_count: usize,
    trace_jobs: &'a [JobId],
    event_probes: usize,
    entities: &'a InstrumentationPlan,
}

/// Serialize `summary` as pretty JSON into `writer`.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn write_plan<W: Write>(writer: W, summary: &InstrumentationSummary) -> Result<()> {
    let export = PlanExport {
        format_version: EXPORT_FORMAT_VERSION,
        entity_count: summary.plan.len(),
        trace_jobs: &summary.trace_jobs,
        event_probes: summary.event_probes,
        entities: &summary.plan,
    };
    serde_json::to_writer_pretty(writer, &export).context("Failed to serialize instrumentation plan")
}

/// Write `summary` to the file at `path`, replacing it.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn export_plan(path: &Path, summary: &InstrumentationSummary) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create export file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_plan(&mut writer, summary)?;
    writer.flush().with_context(|| format!("Failed to write export file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FlatScopeEntity;
    use crate::domain::{ProbeId, ScopeId};
    use crate::resolution::FlatInstrumentationEntity;

    fn summary() -> InstrumentationSummary {
        let plan = vec![FlatInstrumentationEntity::new(
            FlatScopeEntity::new("com.acme.Service", "com.acme.Service.doWork()"),
            ProbeId::from("Timing"),
            Some(ScopeId(1)),
        )]
        .into_iter()
        .collect();
        InstrumentationSummary { plan, trace_jobs: vec![JobId(4)], event_probes: 0, samplers: 0 }
    }

    #[test]
    fn test_write_plan_layout() {
        let mut buffer = Vec::new();
        write_plan(&mut buffer, &summary()).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["format_version"], 1);
        assert_eq!(value["entity_count"], 1);
        assert_eq!(value["trace_jobs"], serde_json::json!([4]));
        assert_eq!(value["entities"][0]["signature"], "com.acme.Service.doWork()");
    }

    #[test]
    fn test_export_plan_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        export_plan(&path, &summary()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"probe\": \"Timing\""));
    }
}
