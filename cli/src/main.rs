use clap::Parser;
use treeforge_cli::commands::{build, classify, cli};
use treeforge_cli::error::CliError;
use treeforge_cli::logging;

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            e.exit_code()
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    let cfg = treeforge_core::config::load(args.config.as_deref())?;
    logging::install(&cfg.logging).map_err(CliError::Logging)?;

    match args.command {
        cli::Commands::Build(build_args) => build::run(build_args, &cfg).await,
        cli::Commands::Classify(classify_args) => classify::run(classify_args, &cfg),
    }
}
