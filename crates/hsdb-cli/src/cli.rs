use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "hsdb", about = "HSDB: schema-driven record store", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file
    #[arg(short, long, global = true, default_value = "hsdb.toml")]
    pub config: PathBuf,

    /// Schema file, overriding the config
    #[arg(long, global = true)]
    pub schema: Option<PathBuf>,

    /// Data directory, overriding the config
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the assembled schema of one or all models
    Schema(SchemaArgs),
    /// Show one record
    Get(GetArgs),
    /// Run a query given as KEY=VALUE parameters
    Query(QueryArgs),
    /// Count the records of a model
    Count(CountArgs),
    /// Create a record from a JSON object
    Create(CreateArgs),
    /// Update a record from a JSON object
    Update(UpdateArgs),
    /// Delete a record
    Delete(DeleteArgs),
    /// Install a fixture file
    Fixtures(FileArgs),
    /// Install an index file of already-stored records
    Install(FileArgs),
    /// Write every record to an index file
    Export(FileArgs),
}

#[derive(Args, Debug)]
pub struct SchemaArgs {
    pub model: Option<String>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    pub model: String,
    pub id: String,
    /// Expand relations one level
    #[arg(long)]
    pub expand: bool,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    pub model: String,
    /// Parameters such as `age__gte=16`, `sort=-name`, `page=0`
    pub params: Vec<String>,
}

#[derive(Args, Debug)]
pub struct CountArgs {
    pub model: String,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    pub model: String,
    pub json: String,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: String,
    pub json: String,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct FileArgs {
    pub path: PathBuf,
}
