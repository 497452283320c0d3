use crate::logging::{LOG_FILE_NAME, init_logging};
use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use platmap_core::inspect::{Inspection, infer_group, inspect_file};
use platmap_core::report::{
    ReportFormat, generate_inventory_report, generate_json_report, generate_text_report,
    inventory, save_report,
};
use platmap_core::settings::{ConfigOverrides, expand_path, resolve_config};
use platmap_core::{CrawlOptions, CrawlProgressCallback, community_seeds, execute_crawl};
use platmap_scanner::{CrawlConfig, DocumentStore, MapId, ReferencePolicy, TextExtractor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

/// Report format selected with `--format`; text when absent.
pub fn report_format(args: &ArgMatches) -> ReportFormat {
    args.get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text)
}

/// Collect the crawl flags that override the config file.
pub fn overrides_from_args(args: &ArgMatches) -> ConfigOverrides {
    let seeds = if args.get_flag("all-communities") {
        community_seeds()
    } else {
        args.get_many::<MapId>("seed")
            .map(|seeds| seeds.cloned().collect())
            .unwrap_or_default()
    };

    ConfigOverrides {
        seeds,
        output_dir: args.get_one::<PathBuf>("output-dir").cloned(),
        delay_ms: args.get_one::<u64>("delay-ms").copied(),
        base_url: args.get_one::<Url>("base-url").map(Url::to_string),
        timeout_secs: args.get_one::<u64>("timeout").copied(),
        sweep: args.get_flag("sweep"),
        max_misses: args.get_one::<u32>("max-misses").copied(),
        max_reference: args.get_one::<u32>("max-reference").copied(),
    }
}

/// Activity log location: `--log-file`, else inside the output directory.
pub fn log_path(args: &ArgMatches, config: &CrawlConfig) -> PathBuf {
    args.get_one::<PathBuf>("log-file")
        .map(|p| expand_path(p.as_path()))
        .unwrap_or_else(|| config.output_dir.join(LOG_FILE_NAME))
}

fn print_crawl_settings(config: &CrawlConfig, log_file: &Path) {
    let seeds: Vec<String> = config
        .seeds()
        .map(|seeds| seeds.iter().map(MapId::render).collect())
        .unwrap_or_default();

    print_divider();
    println!("{} {}", "Seeds:".bold(), seeds.join(", "));
    println!("{} {}", "Server:".bold(), config.base_url);
    println!("{} {}", "Output:".bold(), config.output_dir.display());
    println!("{} {} ms", "Delay:".bold(), config.delay_ms);
    match config.sweep() {
        Some(sweep) => println!(
            "{} up to index {}, stop after {} misses",
            "Sweep:".bold(),
            sweep.max_index,
            sweep.max_misses
        ),
        None => println!("{} off", "Sweep:".bold()),
    }
    println!("{} {}", "Log:".bold(), log_file.display());
    print_divider();
}

fn emit(content: &str, output: Option<&PathBuf>, quiet: bool) -> Result<()> {
    match output {
        Some(path) => {
            save_report(content, path)
                .with_context(|| format!("Failed to save report to {}", path.display()))?;
            if !quiet {
                println!("{} Report saved to {}", "✓".green().bold(), path.display());
            }
        }
        None => print!("{}", content),
    }
    Ok(())
}

pub async fn handle_crawl(args: &ArgMatches, quiet: bool, verbose: bool) -> Result<()> {
    let json_to_stdout =
        report_format(args) == ReportFormat::Json && args.get_one::<PathBuf>("output").is_none();
    let quiet = quiet || json_to_stdout;

    let config_file = args.get_one::<PathBuf>("config");
    let config = resolve_config(config_file.map(PathBuf::as_path), overrides_from_args(args))?;
    let log_file = log_path(args, &config);
    init_logging(Some(&log_file), verbose, !quiet)?;

    if !quiet {
        print_crawl_settings(&config, &log_file);
    }
    info!("Activity log: {}", log_file.display());

    let options = CrawlOptions {
        show_progress_bars: !quiet,
        ..CrawlOptions::new(config)
    };
    let progress_callback: Option<CrawlProgressCallback> = if quiet {
        None
    } else {
        Some(Arc::new(|msg: String| {
            println!("{}", msg.bright_cyan());
        }))
    };

    let summary = execute_crawl(options, progress_callback)
        .await
        .context("Crawl failed")?;

    let totals = summary.totals();
    if !quiet {
        println!(
            "\n{} Crawl complete: {} retrieved ({} downloaded), {} absent, {} failed\n",
            "✓".green().bold(),
            totals.retrieved,
            totals.network_fetches,
            totals.absent,
            totals.failed
        );
    }
    if totals.failed > 0 {
        warn!(
            "{} map(s) failed to download; run again to retry them",
            totals.failed
        );
    }

    let content = match report_format(args) {
        ReportFormat::Text => generate_text_report(&summary),
        ReportFormat::Json => generate_json_report(&summary)?,
    };
    emit(&content, args.get_one::<PathBuf>("output"), quiet)
}

pub fn render_inspection(path: &Path, inspection: &Inspection) -> String {
    let mut out = String::new();
    out.push_str(&format!("File:       {}\n", path.display()));
    out.push_str(&format!("Group:      {}\n", inspection.group));
    out.push_str(&format!(
        "Extracted:  {} chars via {}\n",
        inspection.text_chars,
        inspection.strategy.unwrap_or("none (no text layer found)")
    ));
    out.push_str(&format!(
        "Numbers:    {}\n",
        if inspection.digit_runs.is_empty() {
            "-".to_string()
        } else {
            inspection.digit_runs.join(" ")
        }
    ));
    out.push_str(&format!(
        "Ignored:    {}\n",
        if inspection.rejected.is_empty() {
            "-".to_string()
        } else {
            inspection.rejected.join(" ")
        }
    ));

    let refs: Vec<String> = inspection.references.iter().map(MapId::render).collect();
    out.push_str(&format!(
        "References: {}\n",
        if refs.is_empty() {
            "-".to_string()
        } else {
            refs.join(", ")
        }
    ));
    out
}

pub fn handle_refs(args: &ArgMatches, verbose: bool) -> Result<()> {
    init_logging(None, verbose, false)?;

    let file = args
        .get_one::<PathBuf>("FILE")
        .map(|p| expand_path(p.as_path()))
        .context("No file given")?;
    let group = infer_group(&file, args.get_one::<String>("group").map(String::as_str))?;

    let mut policy = ReferencePolicy::default();
    if let Some(max) = args.get_one::<u32>("max-reference") {
        policy.max = *max;
    }
    policy.validate()?;

    let inspection = inspect_file(&file, &group, &policy, &TextExtractor::default())?;
    let content = match report_format(args) {
        ReportFormat::Text => render_inspection(&file, &inspection),
        ReportFormat::Json => serde_json::to_string_pretty(&inspection)? + "\n",
    };
    print!("{}", content);
    Ok(())
}

pub fn handle_inventory(args: &ArgMatches, verbose: bool) -> Result<()> {
    init_logging(None, verbose, false)?;

    let dir = args
        .get_one::<PathBuf>("output-dir")
        .map(|p| expand_path(p.as_path()))
        .context("No output directory given")?;
    if !dir.is_dir() {
        anyhow::bail!("{} does not exist; nothing has been downloaded yet", dir.display());
    }

    let store = DocumentStore::open(&dir)?;
    let inventory = inventory(&store)
        .with_context(|| format!("Failed to read {}", dir.display()))?;
    let content = match report_format(args) {
        ReportFormat::Text => generate_inventory_report(&inventory),
        ReportFormat::Json => serde_json::to_string_pretty(&inventory)? + "\n",
    };
    print!("{}", content);
    Ok(())
}
