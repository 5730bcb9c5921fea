//! Console check for the native agent connector.
//!
//! Run with: cargo run -p connector-cli [-- path/to/config.json]
//!
//! Sends "hello" to the admin, prints inbound messages until Enter is
//! pressed, then sends "bye". `AGENT_CONNECTOR_*` variables override the
//! config file.

use std::{
    io::{self, BufRead},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use agent_connector_core::ConnectorConfig;
use agent_connector_session::NativeSession;
use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const POLL_INTERVAL: Duration = Duration::from_millis(1000);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => ConnectorConfig::from_file(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => ConnectorConfig::default(),
    };
    config.apply_overrides(|key| std::env::var(key).ok());

    println!("Test connector sends \"hello\" to and waits for messages from admin.");
    println!("========== PRESS ENTER KEY TO STOP WAITING ==========");

    let stop = Arc::new(AtomicBool::new(false));
    let key_thread = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut line = String::new();
            match io::stdin().lock().read_line(&mut line) {
                Ok(0) => tracing::warn!("Stdin closed, stopping"),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Failed to read stdin, stopping"),
            }
            stop.store(true, Ordering::SeqCst);
        })
    };

    let session = NativeSession::connect(config).context("loading agent connector")?;
    session.initialize_agent()?;
    session.send("hello")?;

    while !stop.load(Ordering::SeqCst) {
        for message in session.drain() {
            println!("{message}");
        }
        session.wait_for_next_message(Some(POLL_INTERVAL))?;
    }

    session.send("bye")?;
    session.terminate();

    if key_thread.join().is_err() {
        tracing::warn!("Keyboard thread panicked");
    }
    Ok(())
}
