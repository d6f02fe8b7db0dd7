use clap::Parser;

mod cli;
mod handlers;
mod utils;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    }

    if !cli.command.needs_device() {
        handlers::handle_version();
        return;
    }

    handlers::handle_device(
        cli.host,
        cli.username,
        cli.password_stdin,
        cli.timeout,
        cli.command,
    )
    .await;
}
