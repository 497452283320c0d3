use colored::Colorize;
use platmap::{command_argument_builder, handle_crawl, handle_inventory, handle_refs};
use platmap_core::print_banner;

#[tokio::main]
async fn main() {
    let chosen_command = command_argument_builder().get_matches();
    let Some((name, primary_command)) = chosen_command.subcommand() else {
        unreachable!("clap should ensure we don't get here")
    };

    let quiet = primary_command.get_flag("quiet");
    let verbose = primary_command.get_flag("verbose");

    // Keep stdout clean for machine-readable output
    let json_output = primary_command
        .get_one::<String>("format")
        .is_some_and(|format| format == "json");

    if !quiet && !json_output {
        print_banner();
    }

    let outcome = match name {
        "crawl" => handle_crawl(primary_command, quiet, verbose).await,
        "refs" => handle_refs(primary_command, verbose),
        "inventory" => handle_inventory(primary_command, verbose),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = outcome {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
