//! # Claude Router
//!
//! Local gateway that accepts Claude Messages API requests and serves them
//! from OpenAI-compatible chat completion providers.
//!
//! ## Usage
//!
//! ```bash
//! # Start with ~/.claude-router/config.json
//! claude-router start
//!
//! # Start with a custom config file and port
//! claude-router --config /path/to/config.json start --port 4000
//!
//! # Stop the running instance
//! claude-router stop
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    Cli::parse().execute().await
}
