use clap::{Parser, Subcommand, ValueEnum};

/// Manifest-driven builder for multi-architecture Alpine base images
#[derive(Parser, Debug)]
#[command(
    name = "alpine-autobuild",
    about = "Manifest-driven builder for multi-architecture Alpine base images",
    version,
    author,
    long_about = "alpine-autobuild tracks every supported Alpine release in a JSON manifest, \
                  and for each release that is not yet published downloads the rootfs, \
                  builds per-architecture images, health-checks them, pushes them to the \
                  configured registries and publishes a multi-architecture manifest.\n\n\
                  Settings come from environment variables such as LIMIT, DO_PUSH and \
                  DOCKER_USERNAME."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(
        short = 'v',
        long,
        global = true,
        help = "Verbose output (debug level)"
    )]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Build and publish every pending release",
        long_about = "Loads the manifest, merges the active upstream releases into it and \
                      processes up to LIMIT pending releases. Exits 1 when any processed \
                      release failed.\n\n\
                      Examples:\n  \
                      alpine-autobuild run\n  \
                      alpine-autobuild run --limit 1 --no-push"
    )]
    Run(RunArgs),

    #[command(
        about = "Show what the next run would process",
        long_about = "Scrapes upstream and merges it into an in-memory copy of the manifest. \
                      Nothing is written.\n\n\
                      Examples:\n  \
                      alpine-autobuild plan\n  \
                      alpine-autobuild plan --format json"
    )]
    Plan(ReportArgs),

    #[command(about = "Print manifest statistics")]
    Stats(ReportArgs),
}

#[derive(Parser, Debug, Clone, Default)]
pub struct RunArgs {
    #[arg(
        short = 'l',
        long,
        value_name = "N",
        help = "Maximum releases to process (overrides LIMIT)"
    )]
    pub limit: Option<usize>,

    #[arg(long, help = "Skip the health check step")]
    pub no_health_checks: bool,

    #[arg(long, help = "Build only; leave releases at 'built'")]
    pub no_push: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ReportArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}
