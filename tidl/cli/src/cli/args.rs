use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;

#[derive(Parser)]
#[command(version, name = "tidl", about = "Field-level checks and fingerprints for IDL schemas")]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliSubcommand,
}

#[derive(clap::Args)]
// Shared arguments for every command that reads a schema document
pub struct CliInputArgs {
    /// Path to the schema document (.yaml, .yml or .json)
    pub input: PathBuf,

    /// Optional config file (.yaml, .yml or .json)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum CliSubcommand {
    /// Loads and checks the schema document
    #[command(name = "check")]
    Check {
        #[command(flatten)]
        args: CliInputArgs,
    },

    /// Prints the fingerprint of every structured type
    #[command(name = "fingerprint")]
    Fingerprint {
        #[command(flatten)]
        args: CliInputArgs,
        /// Only print the fingerprint of this structure
        #[arg(short = 's', long = "struct")]
        struct_name: Option<String>,
    },

    /// Lists the fields of every structured type in key order
    #[command(name = "fields")]
    Fields {
        #[command(flatten)]
        args: CliInputArgs,
        /// Only list the fields of this structure
        #[arg(short = 's', long = "struct")]
        struct_name: Option<String>,
        /// Also list fields annotated as hidden
        #[arg(long)]
        all: bool,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to read input")]
    Read(#[from] anyhow::Error),
    #[error("Bad input: {0}")]
    BadInput(String),
    #[error("Formatting error")]
    FormatError(#[from] std::fmt::Error),
    #[error("Schema loading error")]
    LoadError,
    #[error("Semantic analysis error")]
    SemanticAnalysisError,
}
