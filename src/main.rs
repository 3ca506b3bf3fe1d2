use anyhow::Result;
use bilans::commands::{
    self, Config, ConfigOverrides, DEFAULT_OUTPUT, DownloadOptions, SearchOptions,
};
use bilans::statements::{RneEnvironment, SourceKind};
use clap::Parser;
use std::path::PathBuf;

/// bilans - annual financial statements of nearby companies
///
/// Find the companies closest to a point, pick up to five of them, and download
/// their published annual statements as a single ZIP archive.
///
/// Registry (rne) downloads need INPI_USERNAME and INPI_PASSWORD; INPI_ENV=pprod
/// selects the pre-production registry. Broker downloads need
/// API_ENTREPRISE_TOKEN and API_ENTREPRISE_RECIPIENT (API_ENTREPRISE_CONTEXT and
/// API_ENTREPRISE_OBJECT are optional).
///
/// Examples:
///   bilans search --lat 48.1113 --lon -1.6800 --naf 56.10A
///   bilans select 552100554 356000000
///   bilans download --output bilans.zip
#[derive(Parser, Debug)]
#[command(author, version = env!("BILANS_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Session file (also via BILANS_SESSION; defaults to ~/.bilans/session.json)
    #[arg(long, env = "BILANS_SESSION", value_name = "PATH", global = true)]
    session: Option<PathBuf>,

    /// Company search API base URL
    #[arg(long, value_name = "URL", global = true)]
    search_url: Option<String>,

    /// Address (geocoding) API base URL
    #[arg(long, value_name = "URL", global = true)]
    address_url: Option<String>,

    /// Registry API base URL (overrides --rne-env)
    #[arg(long, value_name = "URL", global = true)]
    rne_url: Option<String>,

    /// Data broker API base URL
    #[arg(long, value_name = "URL", global = true)]
    broker_url: Option<String>,

    /// Registry environment: prod or pprod (defaults to INPI_ENV, then prod)
    #[arg(long, value_name = "ENV", global = true)]
    rne_env: Option<RneEnvironment>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Rank the companies nearest to a point
    Search(SearchArgs),

    /// Choose up to five companies from the last search
    Select(SelectArgs),

    /// Show the last search and the selection
    Show,

    /// Download annual statements into a ZIP archive
    Download(DownloadArgs),

    /// Check credentials by forcing a fresh login
    Login(LoginArgs),
}

#[derive(clap::Args, Debug)]
struct SearchArgs {
    /// Latitude of the point
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    /// Longitude of the point
    #[arg(long, allow_hyphen_values = true)]
    lon: f64,

    /// Activity code filter, e.g. 56.10A or 5610A
    #[arg(long)]
    naf: Option<String>,

    /// Free-text filter
    #[arg(long)]
    query: Option<String>,

    /// Candidates per result page (1-25)
    #[arg(long, default_value_t = 25, value_parser = clap::value_parser!(u32).range(1..=25))]
    per_page: u32,

    /// Only pool the first result page
    #[arg(long)]
    single_page: bool,
}

#[derive(clap::Args, Debug)]
struct SelectArgs {
    /// Company identifiers (9 digits) from the last search
    #[arg(value_name = "SIREN", required = true)]
    sirens: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct DownloadArgs {
    /// Company identifiers; defaults to the current selection
    #[arg(long = "siren", value_name = "SIREN")]
    sirens: Vec<String>,

    /// Output ZIP path
    #[arg(long, short = 'o', default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Statements provider: rne or broker
    #[arg(long, default_value = "rne")]
    provider: SourceKind,
}

#[derive(clap::Args, Debug)]
struct LoginArgs {
    /// Statements provider: rne or broker
    #[arg(long, default_value = "rne")]
    provider: SourceKind,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            session: self.session.clone(),
            search_url: self.search_url.clone(),
            address_url: self.address_url.clone(),
            rne_url: self.rne_url.clone(),
            broker_url: self.broker_url.clone(),
            rne_env: self.rne_env,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = bilans::runtime::RealRuntime;
    let config = Config::new(&runtime, cli.overrides())?;

    match cli.command {
        Commands::Search(args) => {
            let options = SearchOptions {
                naf: args.naf,
                text: args.query,
                per_page: args.per_page,
                two_pages: !args.single_page,
                ..SearchOptions::new(args.lat, args.lon)
            };
            commands::search(&runtime, &config, options).await?
        }
        Commands::Select(args) => commands::select(&runtime, &config, &args.sirens)?,
        Commands::Show => commands::show(&runtime, &config)?,
        Commands::Download(args) => {
            let options = DownloadOptions {
                sirens: args.sirens,
                output: args.output,
                provider: args.provider,
            };
            commands::download(&runtime, &config, options).await?
        }
        Commands::Login(args) => commands::login(&config, args.provider).await?,
    }
    Ok(())
}
