mod cli;
mod commands;
mod context;
mod output;

use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_env("TAPELINE_LOG")
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    let result = match &cli.command {
        Command::Init { id_length } => commands::init::run(&cli, *id_length),
        Command::Commit { message } => commands::commit::run(&cli, message),
        Command::Log { all, branch } => commands::log::run(&cli, *all, branch.as_deref()),
        Command::Checkout { commit } => commands::checkout::run(&cli, commit),
        Command::Status => commands::status::run(&cli),
        Command::Branch { cmd } => commands::branch::run(&cli, cmd.clone()),
        Command::Delete { commit, yes } => commands::delete::run(&cli, commit, *yes),
        Command::Show { commit } => commands::show::run(&cli, commit),
        Command::Doctor => commands::doctor::run(&cli),
        Command::Bundle { cmd } => commands::bundle::run(&cli, cmd.clone()),
    };

    if let Err(e) = result {
        output::output_error(&cli, &e);
        std::process::exit(e.exit_code());
    }
}
