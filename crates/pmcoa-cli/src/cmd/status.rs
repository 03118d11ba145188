//! Status subcommand - per-batch progress from manifests and ledgers

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use pmcoa_core::{count_rows, fmt_num};
use pmcoa_pmc::runner::batch_status;

use super::{BatchArgs, batch_shards};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub batches: BatchArgs,
}

pub fn run(args: StatusArgs, config: &Config) -> Result<()> {
    let layout = args.batches.layout(config);
    let license = args.batches.license(config);
    let batches = args.batches.batches(&layout, &license);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(
            ["Batch", "Manifest", "Complete", "Errors", "Remaining", "Shards", "Enriched"]
                .into_iter()
                .map(|h| Cell::new(h).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );

    for batch in batches {
        let manifest = layout.manifest(&license, batch);
        let rows = count_rows(&manifest)
            .with_context(|| format!("cannot read {}", manifest.display()))?;
        let (complete, errors) = batch_status(
            &layout.complete_log(&license, batch),
            &layout.error_log(&license, batch),
        )?;
        let shards = batch_shards(&layout, &license, batch)?.len();
        let enriched_log = layout.enrich_complete_log(&license, batch);
        let enriched = count_rows(&enriched_log)
            .with_context(|| format!("cannot read {}", enriched_log.display()))?;

        table.add_row(vec![
            Cell::new(batch),
            Cell::new(fmt_num(rows)),
            Cell::new(fmt_num(complete)),
            Cell::new(fmt_num(errors)),
            Cell::new(fmt_num(rows.saturating_sub(complete))),
            Cell::new(shards),
            Cell::new(format!("{enriched}/{shards}")),
        ]);
    }

    eprintln!("\n{table}");
    Ok(())
}
