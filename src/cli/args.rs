//! Command-line argument definitions

use clap::{Parser, Subcommand, ValueEnum};

use crate::cli::commands::{
    bom::BomCommands, completions::CompletionsArgs, init::InitArgs, mat::MatCommands,
    mo::MoCommands,
};

/// Frostline ERP - bill-of-materials costing and manufacturing orders
#[derive(Parser, Debug)]
#[command(name = "ferp", version, about, propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options accepted by every subcommand
#[derive(clap::Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value_t = OutputFormat::Auto)]
    pub format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a project in the current directory
    Init(InitArgs),

    /// Catalog materials and products
    #[command(subcommand)]
    Mat(MatCommands),

    /// Bills of materials and cost rollup
    #[command(subcommand)]
    Bom(BomCommands),

    /// Manufacturing orders
    #[command(subcommand)]
    Mo(MoCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Table for lists, readable summary for single entities
    #[default]
    Auto,
    Yaml,
    Json,
    /// Tab-separated values
    Tsv,
    /// Entity IDs only, one per line
    Id,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["ferp", "mat", "list", "--format", "json", "-vv"]).unwrap();
        assert_eq!(cli.global.format, OutputFormat::Json);
        assert_eq!(cli.global.verbose, 2);
    }
}
