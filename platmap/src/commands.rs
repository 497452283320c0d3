use crate::CLAP_STYLING;
use clap::{arg, command};
use platmap_scanner::MapId;
use std::path::PathBuf;
use url::Url;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("platmap")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("platmap")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner, progress and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Log debug detail for every fetch and extraction")
                .required(false)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            command!("crawl")
                .about(
                    "Download plat maps starting from one or more seeds, following the map \
                numbers printed on each sheet.",
                )
                .arg(
                    arg!(-s --"seed" <ID>)
                        .required(false)
                        .help("Map to start from, e.g. 001-01 (repeatable; default: 001-01)")
                        .value_parser(clap::value_parser!(MapId))
                        .action(clap::ArgAction::Append)
                        .conflicts_with("all-communities"),
                )
                .arg(
                    arg!(--"all-communities")
                        .required(false)
                        .help("Crawl the first map of every known community")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-d --"output-dir" <DIR>)
                        .required(false)
                        .help("Directory holding downloaded maps (default: plat_maps)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"delay-ms" <MS>)
                        .required(false)
                        .help("Pause between requests to the records server (default: 1000)")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"base-url" <URL>)
                        .required(false)
                        .help("Scheme and host of the records site")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds (default: 30)")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"sweep")
                        .required(false)
                        .help("After following references, try every index of the group in turn")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"max-misses" <N>)
                        .required(false)
                        .help("Stop the sweep after this many missing maps in a row (default: 10)")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    arg!(--"max-reference" <N>)
                        .required(false)
                        .help("Largest printed number treated as a map reference (default: 50)")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("TOML file with crawl settings; flags override it")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"log-file" <PATH>)
                        .required(false)
                        .help("Activity log (default: <output-dir>/platmap.log)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
        .subcommand(
            command!("refs")
                .about("Show the map references found in a local PDF, without any network access")
                .arg(
                    arg!(<FILE>)
                        .required(true)
                        .help("Path to a plat map PDF")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-g --"group" <GROUP>)
                        .required(false)
                        .help("Group to expand references into (default: taken from the file name)"),
                )
                .arg(
                    arg!(--"max-reference" <N>)
                        .required(false)
                        .help("Largest printed number treated as a map reference (default: 50)")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Output format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
        .subcommand(
            command!("inventory")
                .about("List the maps already downloaded, by community")
                .arg(
                    arg!(-d --"output-dir" <DIR>)
                        .required(false)
                        .help("Directory holding downloaded maps")
                        .value_parser(clap::value_parser!(PathBuf))
                        .default_value("plat_maps"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Output format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
}
