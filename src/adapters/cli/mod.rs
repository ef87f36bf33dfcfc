//! CLI Adapter
//!
//! Command-line interface for quote-refresh.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{
    parse_position, render_history, render_snapshot, CliApp, Command, HistoryCmd, QuoteCmd,
    WatchCmd,
};

/// Parse the process arguments
pub fn init() -> CliApp {
    use clap::Parser;
    CliApp::parse()
}
