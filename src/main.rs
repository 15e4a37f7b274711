use std::io;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use karat::config::Options;
use karat::server::transport::Connection;
use karat::server::LspLoop;

fn main() {
    let opts = Options::parse();

    // stdout carries the wire protocol; logs go to stderr.
    let default_level = match opts.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let conn = Connection::new(io::stdin().lock(), io::stdout().lock());
    let mut lsp = LspLoop::new(opts, conn);
    match lsp.run() {
        Ok(()) => tracing::info!("session over"),
        Err(err) => {
            tracing::error!(%err, "session aborted");
            std::process::exit(1);
        }
    }
}
