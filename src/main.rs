// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Interactive CLI for an encrypted inference session.
//!
//! Connects to a host over WebSocket, performs the encrypted handshake,
//! and streams prompts from stdin. Ctrl-C mid-stream cancels the current
//! prompt without tearing down the session.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use fabstir_llm_client::crypto::EncryptionEngine;
use fabstir_llm_client::session::{
    ProtocolConfig, SessionConfig, SessionProtocol, WsTransport,
};
use fabstir_llm_client::wallet::LocalWallet;

#[derive(Parser, Debug)]
#[command(name = "fabstir-llm-client", about = "Encrypted inference session CLI")]
struct Args {
    /// Host WebSocket endpoint
    #[arg(long, env = "HOST_WS_URL", default_value = "ws://127.0.0.1:8080/ws")]
    url: String,

    /// Host's static compressed public key, hex
    #[arg(long, env = "HOST_PUBLIC_KEY")]
    host_public_key: String,

    /// On-chain job id backing this session
    #[arg(long)]
    job_id: u64,

    /// Session id agreed with the host
    #[arg(long)]
    session_id: u64,

    /// Chain id the job lives on
    #[arg(long, env = "CHAIN_ID", default_value_t = 84532)]
    chain_id: u64,

    /// Model to request
    #[arg(long, default_value = "llama-3.1-8b")]
    model: String,

    /// Agreed price per token in wei
    #[arg(long, default_value_t = 2000)]
    price_per_token: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let wallet = LocalWallet::from_env().context("loading WALLET_PRIVATE_KEY")?;
    let engine = Arc::new(EncryptionEngine::new(wallet));
    info!("client identity: {}", engine.address());

    let host_public_key = fabstir_llm_client::crypto::hex::hex_to_array::<33>(
        "host_public_key",
        &args.host_public_key,
    )?;

    let transport = Arc::new(WsTransport::connect(&args.url).await?);
    let mut protocol = SessionProtocol::new(
        engine,
        transport,
        host_public_key,
        SessionConfig {
            session_id: args.session_id,
            job_id: args.job_id,
            chain_id: args.chain_id,
            model_name: args.model,
            price_per_token: args.price_per_token,
        },
        ProtocolConfig::default(),
    );

    protocol.initialize().await?;

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let prompt = line?;
        if prompt.trim().is_empty() {
            continue;
        }
        if prompt.trim() == "/quit" {
            break;
        }

        let cancel = CancellationToken::new();
        let ctrl_c_cancel = cancel.clone();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctrl_c_cancel.cancel();
            }
        });

        let response = protocol
            .send_prompt(&prompt, &cancel, |chunk| {
                print!("{}", chunk);
                let _ = std::io::stdout().flush();
            })
            .await?;
        ctrl_c.abort();
        if response.is_empty() {
            println!("(no output)");
        } else {
            println!();
        }
    }

    let tokens = protocol.state().tokens_generated();
    protocol.complete(tokens, None).await?;
    Ok(())
}
