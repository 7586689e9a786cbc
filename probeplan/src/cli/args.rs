//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "probeplan",
    about = "Resolve an instrumentation description against a code catalog (dry run)",
    after_help = "\
EXAMPLES:
    probeplan --description desc.json --catalog catalog.json --probe Timing
    probeplan -d desc.json -c catalog.json --probe Timing --export plan.json --quiet"
)]
pub struct Args {
    /// Instrumentation description (JSON)
    #[arg(short, long, value_name = "FILE")]
    pub description: PathBuf,

    /// Catalog snapshot of the monitored process (JSON)
    #[arg(short, long, value_name = "FILE")]
    pub catalog: PathBuf,

    /// Export the resolved plan to file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Probe id the transformer can install (repeatable)
    #[arg(short, long = "probe", value_name = "ID")]
    pub probes: Vec<String>,

    /// Suppress the plan listing
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_probes() {
        let args = Args::try_parse_from([
            "probeplan",
            "--description",
            "d.json",
            "--catalog",
            "c.json",
            "--probe",
            "Timing",
            "-p",
            "Counter",
        ])
        .unwrap();
        assert_eq!(args.probes, vec!["Timing", "Counter"]);
        assert!(!args.quiet);
        assert!(args.export.is_none());
    }

    #[test]
    fn test_description_required() {
        assert!(Args::try_parse_from(["probeplan", "--catalog", "c.json"]).is_err());
    }
}
