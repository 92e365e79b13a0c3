//! # Metaquery CLI
//!
//! Command-line caller of the join-query synthesizer.
//!
//! ## Commands
//!
//! - `synthesize` - Generate SQL, ORM descriptor, result type and scaffold
//! - `validate` - Check a join query against a catalog and list every violation
//! - `ddl` - Print the schema DDL of a catalog
//! - `info` - Display the entities and relations of a catalog
//!
//! Settings come from an optional `metaquery.toml`; command-line flags
//! override it.

pub mod commands;
pub mod config;

pub use metaquery_codegen;
pub use metaquery_core;
pub use metaquery_ir;

use clap::{Args, Parser, Subcommand, ValueEnum};
use metaquery_codegen::TypeTarget;
use metaquery_core::DatabaseType;
use std::path::PathBuf;

/// CLI version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI name
pub const NAME: &str = env!("CARGO_PKG_NAME");

// ============================================================================
// Arguments
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "metaquery")]
#[command(about = "Metaquery - synthesize join queries from entity metadata")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Parse the process arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate every artifact for a join query
    Synthesize(SynthesizeArgs),

    /// Validate a join query without generating anything
    Validate(QueryArgs),

    /// Print CREATE TABLE / foreign key DDL for a catalog
    Ddl {
        /// Catalog snapshot (JSON)
        #[arg(long)]
        catalog: PathBuf,

        /// Target database
        #[arg(short, long)]
        database: Option<DatabaseArg>,

        /// Settings file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Display information about a catalog
    Info {
        /// Catalog snapshot (JSON)
        #[arg(long)]
        catalog: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Catalog snapshot (JSON)
    #[arg(long)]
    pub catalog: PathBuf,

    /// Join query configuration (JSON)
    #[arg(long)]
    pub query: PathBuf,

    /// Settings file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Target database
    #[arg(short, long)]
    pub database: Option<DatabaseArg>,
}

#[derive(Debug, Args)]
pub struct SynthesizeArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Language of the result-row type
    #[arg(short, long)]
    pub target: Option<TargetArg>,

    /// Which artifact to print
    #[arg(short, long, default_value = "all")]
    pub artifact: Artifact,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DatabaseArg {
    Postgres,
    Mysql,
    Sqlite,
}

impl From<DatabaseArg> for DatabaseType {
    fn from(arg: DatabaseArg) -> Self {
        match arg {
            DatabaseArg::Postgres => DatabaseType::PostgreSQL,
            DatabaseArg::Mysql => DatabaseType::MySQL,
            DatabaseArg::Sqlite => DatabaseType::SQLite,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetArg {
    Rust,
    Typescript,
}

impl From<TargetArg> for TypeTarget {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Rust => TypeTarget::Rust,
            TargetArg::Typescript => TypeTarget::TypeScript,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Artifact {
    All,
    Sql,
    Orm,
    Types,
    Scaffold,
    Docs,
}

// ============================================================================
// Entry point
// ============================================================================

/// Run a parsed command line
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output = match cli.command {
        Commands::Synthesize(args) => commands::synthesize(&args).await?,
        Commands::Validate(args) => commands::validate(&args).await?,
        Commands::Ddl {
            catalog,
            database,
            config,
        } => commands::ddl(&catalog, database, config.as_deref())?,
        Commands::Info { catalog } => commands::info(&catalog)?,
    };
    println!("{}", output);
    Ok(())
}
