#[macro_use]
extern crate log;

use std::process;

use carve_core::internal::*;
use clap::{Arg, Command, crate_version};

mod params;
mod recipe;
mod run;

use crate::params::Parameters;

pub(crate) fn command() -> Command<'static> {
    Command::new("carve")
        .version(crate_version!())
        .about("Extract a subgraph from an IR model, save it and smoke-test it")
        .arg(Arg::new("model").required(true).takes_value(true).help("Model topology (.xml, weights in .bin next to it)"))
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .takes_value(true)
                .multiple_occurrences(true)
                .number_of_values(1)
                .help("Tensor (op:port) becoming a model input"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .multiple_occurrences(true)
                .number_of_values(1)
                .help("Tensor (op:port) becoming a model output"),
        )
        .arg(Arg::new("recipe").long("recipe").takes_value(true).help("JSON file listing inputs, outputs and strategy"))
        .arg(
            Arg::new("strategy")
                .long("strategy")
                .takes_value(true)
                .possible_values(["port", "edges"])
                .help("How operation names without a port are handled [default: port]"),
        )
        .arg(Arg::new("prefix").long("prefix").takes_value(true).help("Output files prefix [default: simple_model]"))
        .arg(Arg::new("batch").long("batch").takes_value(true).help("Batch size set on the N axis [default: 16]"))
        .arg(Arg::new("no-batch").long("no-batch").conflicts_with("batch").help("Keep parameter shapes as saved"))
        .arg(Arg::new("layout").long("layout").takes_value(true).help("Parameter layout, or none [default: NC]"))
        .arg(Arg::new("threads").long("threads").takes_value(true).help("Inference threads [default: 4]"))
        .arg(Arg::new("streams").long("streams").takes_value(true).help("Inference streams [default: 1]"))
        .arg(Arg::new("precision").long("precision").takes_value(true).help("Inference precision, or none [default: f32]"))
        .arg(
            Arg::new("mode")
                .long("mode")
                .takes_value(true)
                .possible_values(["throughput", "latency"])
                .help("Performance hint [default: throughput]"),
        )
        .arg(Arg::new("no-profile").long("no-profile").help("Do not time each operation"))
        .arg(Arg::new("skip-run").long("skip-run").help("Stop after saving the extracted model"))
        .arg(Arg::new("verbosity").short('v').multiple_occurrences(true).help("Sets the level of verbosity."))
}

/// Entrypoint for the command-line interface.
fn main() {
    let matches = command().get_matches();

    if std::env::var("RUST_LOG").is_err() {
        let level = match matches.occurrences_of("verbosity") {
            0 => "warn,carve_core::splice=info",
            1 => "carve=info,carve_core=info,carve_ir=info",
            2 => "carve=debug,carve_core=debug,carve_ir=debug",
            _ => "carve=trace,carve_core=trace,carve_ir=trace",
        };
        env_logger::Builder::new().parse_filters(level).init();
    } else {
        env_logger::init();
    }

    if let Err(e) = handle(&matches) {
        error!("{:?}", e);
        process::exit(1)
    }
}

fn handle(matches: &clap::ArgMatches) -> CarveResult<()> {
    let params = Parameters::from_clap(matches)?;
    run::handle(&params)
}

#[cfg(test)]
mod test {
    #[test]
    fn command_is_consistent() {
        super::command().debug_assert();
    }
}
