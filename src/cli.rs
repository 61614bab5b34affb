use clap::{Args, Parser, Subcommand};

/// ParkPro Backend - parking management console API and tools
#[derive(Parser, Clone)]
#[command(name = "parkpro_backend")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "ParkPro Backend Server with Database Management")]
#[command(long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, default_value = ".env")]
    pub config: String,

    /// Server port override
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Server host override
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Start the web server (default action)
    Serve {
        /// Seed demo data on startup if the database is empty
        #[arg(long)]
        seed: bool,
    },
    /// Database management commands
    Db {
        #[command(subcommand)]
        action: DbCommands,
    },
    User {
        #[command(subcommand)]
        action: UserCommands,
    },
}

#[derive(Subcommand, Clone)]
pub enum DbCommands {
    /// Open the database and report collection counts
    Test,
    /// Seed database with demo data
    Seed {
        /// Clear existing collections before seeding
        #[arg(long)]
        force: bool,
    },
    /// Export all collections to a JSON file
    Dump {
        /// Output file path
        #[arg(short, long, default_value = "parkpro_dump.json")]
        output: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum UserCommands {
    AddAdmin(AddAdminArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AddAdminArgs {
    /// Display name; defaults to the email local part
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub password: String,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    #[allow(dead_code)]
    pub fn is_server_mode(&self) -> bool {
        matches!(self.command, None | Some(Commands::Serve { .. }))
    }

    pub fn should_seed_on_startup(&self) -> bool {
        match &self.command {
            Some(Commands::Serve { seed }) => *seed,
            _ => false,
        }
    }
}
