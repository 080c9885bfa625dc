//! Server entry point.
//!
//! # Responsibility
//! - Resolve configuration, start logging, open the store, and serve.

use clap::Parser;
use log::{error, info};
use std::error::Error;
use std::process::ExitCode;
use topicnote_core::{init_logging, FileDocumentStore, NoteService, WikipediaClient};
use topicnote_server::{Dispatcher, NoteServer, ServerConfig};

fn main() -> ExitCode {
    let config = ServerConfig::parse();
    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=server_exit module=main status=error error={err}");
            eprintln!("topicnote-server: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: ServerConfig) -> Result<(), Box<dyn Error>> {
    config.validate()?;
    let log_dir = config.resolved_log_dir()?;
    init_logging(config.log_level(), &log_dir)?;

    let store = FileDocumentStore::open(&config.db_path)?;
    let enrichment = WikipediaClient::new(config.wikipedia())?;
    let dispatcher = Dispatcher::new(NoteService::new(store, enrichment));
    let server = NoteServer::bind(config.addr.as_str(), dispatcher, config.max_request_bytes)?
        .with_read_timeout(Some(config.read_timeout()));

    info!(
        "event=server_start module=main status=ok addr={} db_path={}",
        server.local_addr()?,
        config.db_path.display()
    );
    println!("topicnote-server listening on {}", server.local_addr()?);
    server.serve();
    Ok(())
}
