use anyhow::Result;
use clap::Parser;
use fundgraphs::data_sources::{ChaingraphDataSource, DEFAULT_ENDPOINT};
use fundgraphs::entities::{AliasTable, build_entity_map};
use fundgraphs::graph::{build_graph, graph_data};
use fundgraphs::ingest::{campaign_stats, enrich_campaigns, load_campaigns};
use fundgraphs::recipients::{build_recipient_map, recipient_stats};
use std::fs;
use tracing::info;

#[derive(Parser, Debug)]
struct Args {
    /// Path to the scraped campaigns JSON file
    #[arg(short, long, default_value = "data/flipstarters.json")]
    campaigns: String,
    /// Chaingraph GraphQL endpoint for transaction lookups
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,
    /// CashAddr prefix for encoded recipient addresses
    #[arg(long, default_value = "bitcoincash")]
    prefix: String,
    /// Where to write the renderer-facing node/edge JSON
    #[arg(short, long, default_value = "graph.json")]
    output: String,
    /// Use only addresses already present in the input, no provider fetch
    #[arg(long)]
    skip_fetch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("Starting fundgraphs");
    let args = Args::parse();

    let table = AliasTable::known_entities();
    let mut campaigns = load_campaigns(&args.campaigns, &table)?;

    if !args.skip_fetch {
        let source = ChaingraphDataSource::new(&args.endpoint, &args.prefix);
        enrich_campaigns(&mut campaigns, &source).await;
    }

    let entity_map = build_entity_map(&campaigns, &table);
    let recipient_map = build_recipient_map(&campaigns);

    let graph = build_graph(&campaigns, &entity_map);
    let data = graph_data(&graph);
    fs::write(&args.output, serde_json::to_string_pretty(&data)?)?;
    info!(
        "wrote {} nodes and {} edges to {}",
        data.nodes.len(),
        data.edges.len(),
        args.output
    );

    print!("{}", campaign_stats(&campaigns, entity_map.len()));
    print!("{}", recipient_stats(&recipient_map));

    Ok(())
}
