//! Command-line interface for synth-forge.
//!
//! Provides commands to run the REST server, inspect the plugin catalog and
//! generate datasets without the server.

mod commands;

pub use commands::{
    parse_cli, run, run_with_cli, Cli, Commands, GenerateArgs, KindArg, PluginsArgs, ServeArgs,
};
