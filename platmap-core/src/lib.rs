pub mod crawl;
pub mod inspect;
pub mod report;
pub mod settings;

use colored::Colorize;

pub use crawl::{
    COMMUNITY_SEEDS, CrawlOptions, CrawlProgressCallback, community_name, community_seeds,
    execute_crawl,
};
pub use inspect::{Inspection, infer_group, inspect_document, inspect_file};
pub use report::{Inventory, ReportFormat, RunSummary, Totals};
pub use settings::{ConfigOverrides, resolve_config};

pub fn print_banner() {
    println!(
        "{} {}",
        "platmap".bright_green().bold(),
        env!("CARGO_PKG_VERSION").dimmed()
    );
    println!(
        "{}\n",
        "Plat map crawler for the Esmeralda County records site".dimmed()
    );
}
