use alpine_autobuild::cli::commands::{CliArgs, Commands};
use alpine_autobuild::cli::handlers::{handle_plan, handle_run, handle_stats};
use alpine_autobuild::util::logging::{config_from_env, init_logging, parse_level};
use alpine_autobuild::VERSION;

use clap::Parser;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("alpine-autobuild v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Run(run_args) => handle_run(run_args).await,
        Commands::Plan(report_args) => handle_plan(report_args).await,
        Commands::Stats(report_args) => handle_stats(report_args),
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let mut config = config_from_env();
    if let Some(level_str) = &args.log_level {
        config.level = parse_level(level_str);
    } else if args.verbose {
        config.level = Level::DEBUG;
    } else if args.quiet {
        config.level = Level::ERROR;
    }
    init_logging(config);
}
