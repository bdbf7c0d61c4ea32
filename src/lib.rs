pub mod cli;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod relay;
pub mod server;

use cli::Args;
use log::info;
use relay::RelayService;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Backend Timeout: {}s", args.backend_timeout_secs);
    info!("History Context Limit: {}", args.history_context_limit);
    info!("-------------------------");

    let relay = Arc::new(RelayService::new(&args)?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, relay);
    server.run().await?;

    Ok(())
}
