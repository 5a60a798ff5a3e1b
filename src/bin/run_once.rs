//! Run one pipeline immediately: `run_once digest|highlight [--publish]`.
//! Without `--publish` the text is generated (used-set effects included) and
//! printed, never delivered.

use anyhow::{bail, Result};

use gamefi_radar::bootstrap::{init_tracing, Services};
use gamefi_radar::config::BotConfig;
use gamefi_radar::scheduler::{Job, JobOutcome};

fn parse_args(args: &[String]) -> Result<Job> {
    let publish = args.iter().any(|a| a == "--publish");
    let kind = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .map(String::as_str)
        .unwrap_or_default();
    Ok(match (kind, publish) {
        ("digest", true) => Job::Digest,
        ("digest", false) => Job::PreviewDigest,
        ("highlight", true) => Job::Highlight,
        ("highlight", false) => Job::PreviewHighlight,
        _ => bail!("usage: run_once digest|highlight [--publish]"),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let job = parse_args(&args)?;

    let cfg = BotConfig::load_default()?;
    let pipeline = Services::from_config(&cfg)?.into_pipeline();
    let report = pipeline.run(job).await;

    if let JobOutcome::Preview { text } = &report.outcome {
        println!("{text}\n");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.is_failure() {
        std::process::exit(1);
    }
    Ok(())
}
