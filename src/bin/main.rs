// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use anyhow::Context;
use bank_ledger_rs::protocol::FrameError;
use bank_ledger_rs::{Client, Dispatcher, Ledger, Request, Response, Server, ServerConfig, Session};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Bank Ledger - concurrent account ledger over TCP
///
/// Runs the ledger server, connects to one as an interactive client, or runs
/// a single-user shell over an in-process ledger.
#[derive(Parser, Debug)]
#[command(name = "bank-ledger")]
#[command(about = "A concurrent account ledger served over TCP", long_about = None)]
struct Args {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run the ledger server
    Serve {
        /// Address to listen on
        #[arg(long, env = "LEDGER_ADDR", default_value = "0.0.0.0:8080")]
        addr: SocketAddr,

        /// Close connections idle for this many seconds
        #[arg(long, env = "LEDGER_IDLE_TIMEOUT_SECS")]
        idle_timeout_secs: Option<u64>,
    },
    /// Connect to a running server
    Connect {
        #[arg(value_name = "HOST:PORT", default_value = "127.0.0.1:8080")]
        server: String,
    },
    /// Single-user shell, no network
    Local,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = match args.mode {
        Mode::Serve { .. } => "info",
        _ => "warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match args.mode {
        Mode::Serve {
            addr,
            idle_timeout_secs,
        } => {
            let mut config = ServerConfig::new(addr);
            if let Some(secs) = idle_timeout_secs {
                config = config.with_idle_timeout(Duration::from_secs(secs));
            }
            Server::new(config, Arc::new(Ledger::new()))
                .run()
                .await
                .with_context(|| format!("serving on {addr}"))
        }
        Mode::Connect { server } => connect(&server).await,
        Mode::Local => tokio::task::spawn_blocking(local).await?,
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

async fn connect(server: &str) -> anyhow::Result<()> {
    let client = Client::connect(server)
        .await
        .with_context(|| format!("connecting to {server}"))?;
    println!("Connected to bank server");

    let (mut requests, mut responses) = client.into_split();

    // Prints replies and broadcasts as they arrive.
    let mut printer = tokio::spawn(async move {
        loop {
            match responses.next_frame::<Response>().await {
                Ok(Some(response)) => {
                    println!("\nServer: {}", response.message);
                    prompt();
                }
                Ok(None) => break,
                Err(FrameError::Malformed(e)) => tracing::warn!(error = %e, "unreadable frame"),
                Err(FrameError::Io(e)) => {
                    tracing::warn!(error = %e, "read failed");
                    break;
                }
            }
        }
        println!("\nDisconnected from server");
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if let Some(request) = Request::from_line(&line) {
                    requests.send(&request).await?;
                } else {
                    prompt();
                }
            }
            _ = &mut printer => return Ok(()),
        }
    }
    Ok(())
}

fn local() -> anyhow::Result<()> {
    let dispatcher = Dispatcher::new(Arc::new(Ledger::new()));
    let mut session = Session::new();

    println!("Welcome to the bank ledger!");
    println!("Type 'help' to show the available commands.");
    prompt();

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let Some(request) = Request::from_line(&line) else {
            prompt();
            continue;
        };

        let outcome = dispatcher.dispatch(&mut session, &request);
        if let Some(broadcast) = &outcome.broadcast {
            println!("{}", broadcast.message);
        }
        println!("{}", outcome.response.message);
        if outcome.close {
            break;
        }
        prompt();
    }
    Ok(())
}
