use clap::Parser;

use crate::opts::{Opts, Subcommand};
use crate::prelude::*;

mod actuator;
mod announce;
mod artifacts;
mod classifier;
mod dataset;
mod helpers;
mod opts;
mod prelude;
mod reading;
mod relay;
mod scaler;
mod trainer;
mod web;

fn main() -> Result {
    let opts = Opts::parse();
    let _sentry_guard = helpers::tracing::init(opts.sentry_dsn.clone(), opts.traces_sample_rate)?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting…");

    let start_instant = Instant::now();
    let result = match opts.subcommand {
        Subcommand::Train(opts) => trainer::run(&opts),
        Subcommand::Serve(opts) => run_server(opts),
    };
    info!(elapsed = helpers::tracing::format_elapsed(start_instant).as_str(), "finished");
    result
}

fn run_server(opts: opts::ServeOpts) -> Result {
    sentry::configure_scope(|scope| scope.set_tag("app", "serve"));
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build the runtime")?
        .block_on(web::run(opts))
}
