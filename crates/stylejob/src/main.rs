mod cli;
mod fetch;
mod paths;
mod resolve;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    let settings = run::load_settings(cli.settings.as_deref())?;
    match cli.command {
        Command::Run(args) => run::run(args, &settings),
        Command::Fetch(args) => fetch::run_fetch(args, &settings),
    }
}
