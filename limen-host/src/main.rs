//! Limen stdio host.
//!
//! Reads one JSON request per line on stdin and answers on stdout. A
//! dedicated reader thread feeds requests over a bounded channel to the
//! dispatch loop, which owns the adapter exclusively — calls are
//! delivered one at a time, in arrival order, the way a platform method
//! channel delivers them on a single callback thread.
//!
//! Logs go to stderr so stdout stays clean for replies.

mod proto;

use std::io::{BufRead, Write};
use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel::bounded;
use limen_core::{BridgeAdapter, CallReply, EnergyBackend, VadBackend};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use proto::{Reply, Request};

/// Backlog of parsed-but-undispatched requests before the reader blocks.
const REQUEST_BACKLOG: usize = 32;

struct HostOptions {
    /// Silero model path; `None` selects the energy backend.
    model: Option<std::path::PathBuf>,
}

fn parse_options() -> Result<HostOptions> {
    let mut model = None;
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--model" => {
                let value = it.next().context("missing value for --model")?;
                model = Some(std::path::PathBuf::from(value));
            }
            "--help" | "-h" => {
                println!("Usage: limen [--model <silero_vad.onnx>]");
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(HostOptions { model })
}

fn select_backend(options: &HostOptions) -> Result<Box<dyn VadBackend>> {
    match &options.model {
        None => Ok(Box::new(EnergyBackend)),
        #[cfg(feature = "onnx")]
        Some(path) => Ok(Box::new(limen_core::SileroBackend::new(path))),
        #[cfg(not(feature = "onnx"))]
        Some(_) => anyhow::bail!("--model requires the 'onnx' feature"),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = parse_options()?;
    let backend = select_backend(&options)?;
    let mut adapter = BridgeAdapter::new(backend);

    let (request_tx, request_rx) = bounded::<String>(REQUEST_BACKLOG);

    // Reader thread: lines in, channel out. Dropping the sender on EOF
    // ends the dispatch loop.
    let reader = thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if request_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!(%e, "stdin read failed");
                    break;
                }
            }
        }
    });

    info!("limen host listening on stdin");

    let stdout = std::io::stdout();
    let mut calls = 0usize;
    let mut faults = 0usize;
    let mut unknown = 0usize;

    for line in request_rx.iter() {
        let request: Request = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                warn!(%e, "skipping unparseable request line");
                continue;
            }
        };

        debug!(id = request.id, method = %request.method, "dispatching");
        let outcome = adapter.handle_call(&request.method, &request.args);
        calls += 1;
        match &outcome {
            CallReply::Fault(_) => faults += 1,
            CallReply::NotImplemented => unknown += 1,
            CallReply::Success(_) => {}
        }

        let reply = Reply::from_call(request.id, outcome);
        let mut out = stdout.lock();
        serde_json::to_writer(&mut out, &reply).context("serializing reply")?;
        out.write_all(b"\n").context("writing reply")?;
        out.flush().context("flushing reply")?;
    }

    // Best-effort cleanup once the transport goes away.
    if adapter.is_initialized() {
        if let Err(e) = adapter.release() {
            error!(%e, "failed to release detector on shutdown");
        }
    }

    if reader.join().is_err() {
        error!("stdin reader thread panicked");
    }

    info!(calls, faults, unknown, "limen host shutting down");
    Ok(())
}
