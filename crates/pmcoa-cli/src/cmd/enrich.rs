//! Enrich subcommand - PubMed metadata for written shards

use anyhow::{Context, Result};
use clap::Args;

use pmcoa_core::{Ledger, ProgressContext};
use pmcoa_pmc::enrich::{ENRICH_COMPLETE_HEADER, ENRICH_ERROR_HEADER, enrich};
use pmcoa_pubmed::EntrezClient;

use super::{BatchArgs, batch_shards, print_table};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct EnrichArgs {
    #[command(flatten)]
    pub batches: BatchArgs,
}

pub fn run(args: EnrichArgs, config: &Config, progress: &ProgressContext) -> Result<()> {
    let layout = args.batches.layout(config);
    let license = args.batches.license(config);
    let batches = args.batches.batches(&layout, &license);

    let client_config = config.entrez.client_config(&config.fetch);
    if client_config.email.is_none() {
        log::warn!("no Entrez email configured; NCBI asks every client to send one");
    }
    let client = EntrezClient::new(client_config);
    let out_dir = layout.enriched_dir(&license);

    let stage = progress.stage_line("enrich");
    let mut rows = Vec::new();
    for batch in batches {
        stage.set_message(format!("batch {batch}"));
        let shards = batch_shards(&layout, &license, batch)?;
        if shards.is_empty() {
            log::info!("batch {batch}: no shards yet");
            continue;
        }

        let complete_path = layout.enrich_complete_log(&license, batch);
        let error_path = layout.enrich_error_log(&license, batch);
        let mut complete = Ledger::open(&complete_path, &ENRICH_COMPLETE_HEADER, "json_path")
            .with_context(|| format!("cannot open {}", complete_path.display()))?;
        let mut errors = Ledger::open(&error_path, &ENRICH_ERROR_HEADER, "json_path")
            .with_context(|| format!("cannot open {}", error_path.display()))?;

        let summary = enrich(&shards, &out_dir, &mut complete, &mut errors, &client, progress)?;
        summary.log();
        rows.push((
            format!("Batch {batch}"),
            format!(
                "{} enriched, {} copied, {} failed, {} earlier ({} records)",
                summary.enriched,
                summary.copied,
                summary.failed,
                summary.already_done,
                summary.records_merged
            ),
        ));
        if summary.interrupted {
            break;
        }
    }
    stage.finish_and_clear();

    let rows: Vec<(&str, String)> = rows.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
    print_table("Enrich", &rows);
    Ok(())
}
