use clap::Parser;
use mgopt_cli::{Cli, Commands};
use tracing::error;
use tracing_subscriber::FmtSubscriber;

mod commands;

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }

    let result = match &cli.command {
        Commands::Run {
            plant,
            forecast,
            config,
            start,
            horizons,
            out,
            summary,
        } => commands::run::handle(&commands::run::RunArgs {
            plant,
            forecast,
            config: config.as_deref(),
            start: start.as_deref(),
            horizons: *horizons,
            out,
            summary: summary.as_deref(),
        }),
        Commands::Inspect { plant, config } => commands::inspect::handle(plant, config.as_deref()),
        Commands::Fit {
            plant,
            component,
            config,
        } => commands::fit::handle(plant, component, config.as_deref()),
    };

    if let Err(e) = result {
        error!("{e:#}");
        std::process::exit(1);
    }
}
