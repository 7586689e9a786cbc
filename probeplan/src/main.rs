//! # probeplan - Planning Dry Run
//!
//! Loads an instrumentation description and a catalog snapshot, runs them
//! through the same facade an attached agent uses, and prints or exports the
//! resulting plan. Woven plans go to a stand-in weaving thread that only
//! counts them.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossbeam_channel::Receiver;
use log::{debug, info};
use std::sync::Arc;
use std::thread;

use probeplan::agent::InstrumentationFacade;
use probeplan::catalog::{CatalogSnapshot, StaticCatalog};
use probeplan::cli::Args;
use probeplan::description::InstrumentationDescription;
use probeplan::domain::IdSource;
use probeplan::events::{EventProbeFactories, LogSink};
use probeplan::export::export_plan;
use probeplan::extension::{ExtensionRegistry, ProbeRegistry};
use probeplan::resolution::ScopeResolutionController;
use probeplan::weaving::{ChannelTransformer, TransformRequest};

// Exit codes (usage errors exit with 2 from clap)
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;

const TRANSFORM_QUEUE_CAPACITY: usize = 64;

fn main() {
    env_logger::init();
    let args = Args::parse();
    std::process::exit(match run(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

/// Weaving thread stand-in: counts the plans it receives.
fn drain_transform_requests(rx: &Receiver<TransformRequest>) -> usize {
    let mut batches = 0;
    for request in rx {
        match request {
            TransformRequest::Weave(plan) => {
                batches += 1;
                debug!("Weave batch {batches}: {} entities", plan.len());
            }
            TransformRequest::Revert => debug!("Revert requested"),
        }
    }
    batches
}

fn run(args: &Args) -> Result<()> {
    let json = std::fs::read_to_string(&args.description)
        .with_context(|| format!("Failed to read description: {}", args.description.display()))?;
    let description = InstrumentationDescription::from_json(&json)
        .with_context(|| format!("Failed to load description: {}", args.description.display()))?;

    let snapshot = CatalogSnapshot::from_file(&args.catalog)
        .with_context(|| format!("Failed to load catalog: {}", args.catalog.display()))?;
    info!("Loaded {} catalog entities", snapshot.len());

    let probes = ProbeRegistry::with_probes(args.probes.iter().map(String::as_str));
    let (transformer, rx) = ChannelTransformer::channel(TRANSFORM_QUEUE_CAPACITY);
    let weaving_thread = thread::spawn(move || drain_transform_requests(&rx));

    let facade = InstrumentationFacade::new(
        ScopeResolutionController::new(ExtensionRegistry::new(), probes),
        Arc::new(StaticCatalog::from_snapshot(snapshot)),
        Arc::new(transformer),
        EventProbeFactories::builtin(),
        Arc::new(LogSink),
        Arc::new(IdSource::default()),
    );
    let result = facade.instrument(&description);

    // Dropping the facade closes the channel and ends the weaving thread
    drop(facade);
    let batches = weaving_thread.join().map_err(|_| anyhow!("Weaving thread panicked"))?;

    let summary = result.context("Resolution failed")?;

    if !args.quiet {
        print!("{description}");
        println!();
        print!("{}", summary.plan);
        println!();
    }
    println!("{summary} in {batches} weave batch(es)");

    if let Some(path) = &args.export {
        export_plan(path, &summary)?;
        println!("Exported plan to {}", path.display());
    }

    Ok(())
}
