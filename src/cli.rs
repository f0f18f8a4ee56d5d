use clap::Parser;

#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable detailed debug logging (global)
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Enable verbose logging (global)
    #[arg(long, default_value_t = false)]
    pub verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API with the background schedule checker
    Serve {
        /// Bind address (e.g. 127.0.0.1:8000)
        #[arg(short = 'b', long)]
        bind: Option<String>,

        /// Database URL (overrides DATABASE_URL)
        #[arg(long)]
        db: Option<String>,
    },

    /// Run one full recon pipeline against a domain and print a summary
    Scan {
        /// Target domain (e.g. example.com) or a full URL
        domain: String,

        /// Database URL (overrides DATABASE_URL)
        #[arg(long)]
        db: Option<String>,

        /// Overall scan timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Print records as JSON instead of the text summary
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
