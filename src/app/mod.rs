// Application layer: the pipeline steps behind each subcommand.

pub mod steps;
