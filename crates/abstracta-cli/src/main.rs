use std::process::exit;

use clap::Parser;

use crate::args::AbstractaCliArgs;

pub mod args;
pub mod commands;

#[derive(Debug, Clone)]
pub struct Context;

fn main() {
    let args = AbstractaCliArgs::parse();
    let mut logger = env_logger::Builder::from_default_env();
    if args.trace() {
        logger.filter_module("abstracta", log::LevelFilter::Trace);
    }
    logger.init();

    let mut context = Context;
    match context.execute(args) {
        Ok(()) => exit(0),
        Err(err) => {
            eprintln!("{err:#}");
            exit(1);
        }
    }
}
