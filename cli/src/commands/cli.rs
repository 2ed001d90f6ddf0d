use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "treeforge", version, about = "Resolve a build unit tree")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file. Defaults to ./treeforge.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a build pass over the tree described by a manifest.
    Build(BuildArgs),
    /// Report which change categories and cache groups the given files touch.
    Classify(ClassifyArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct BuildArgs {
    #[arg(long, default_value = "Treeforgefile.toml")]
    pub manifest: PathBuf,

    /// Copy the final output here before scratch directories are removed.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Changed files. When given, an incremental pass follows the initial one.
    #[arg(long = "changed", action = clap::ArgAction::Append)]
    pub changed: Vec<PathBuf>,

    /// Write the graph of the last pass as JSON.
    #[arg(long)]
    pub graph_json: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ClassifyArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}
