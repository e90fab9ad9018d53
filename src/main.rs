#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use clap::Parser;

mod cli;
mod config;
mod constants;
mod ctx;
mod errors;
mod git;
mod issue;
mod process;
mod reconcile;
mod review;
mod store;
mod subcommands;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    let verbose = cli.v > 0;

    let result = match cli.init_tracing_subscriber() {
        Ok(cli) => cli.run().await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        cli::report_error(&e, verbose);
        std::process::exit(cli::exit_code(&e));
    }
}
