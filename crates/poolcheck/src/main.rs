mod check;
mod cli;
mod source;

use std::sync::Arc;

use clap::Parser;
use eyre::{eyre, WrapErr};
use tokio::sync::watch;
use tokio::task::JoinSet;

use poolcheck_core::BitcoinAddressResolver;

use crate::check::Settings;
use crate::source::{LineSource, Source, StratumLogin};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    if args.expected.is_empty() {
        tracing::warn!("no --expected addresses given; payouts are listed but not checked");
    }

    let sources = args.sources();
    let settings = Arc::new(Settings {
        resolver: BitcoinAddressResolver::new(args.network),
        expected: args.expected,
        count: args.count,
        json: args.json,
        login: StratumLogin {
            worker: args.worker,
            password: args.password,
        },
    });

    // Sources share no state, so each one gets its own task.
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut tasks = JoinSet::new();
    for source in sources {
        tasks.spawn(run_source(source, Arc::clone(&settings), stop_rx.clone()));
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            joined = tasks.join_next() => match joined {
                None => break,
                Some(Ok(Ok(inspected))) => {
                    tracing::debug!(inspected, "source completed");
                }
                Some(Ok(Err(err))) => {
                    tasks.abort_all();
                    return Err(err);
                }
                Some(Err(join_err)) => {
                    tasks.abort_all();
                    return Err(eyre!(join_err).wrap_err("source task aborted"));
                }
            },
            signal = &mut shutdown => {
                signal.wrap_err("listen for shutdown signal")?;
                tracing::info!("received shutdown signal");
                let _ = stop_tx.send(true);
                while let Some(joined) = tasks.join_next().await {
                    if let Ok(Err(err)) = joined {
                        tracing::warn!(error = %err, "source failed during shutdown");
                    }
                }
                break;
            }
        }
    }

    Ok(())
}

async fn run_source(
    source: Source,
    settings: Arc<Settings>,
    mut stop: watch::Receiver<bool>,
) -> eyre::Result<usize> {
    let label = source.to_string();
    let lines = tokio::select! {
        opened = LineSource::open(&source, &settings.login) => opened?,
        _ = stop.changed() => return Ok(0),
    };
    drive(lines, &label, &settings, stop).await
}

/// Inspect `lines` until done or until `stop` flips, then close the
/// connection.
async fn drive(
    mut lines: LineSource,
    label: &str,
    settings: &Settings,
    mut stop: watch::Receiver<bool>,
) -> eyre::Result<usize> {
    let result = tokio::select! {
        inspected = check::inspect_lines(&mut lines, label, settings) => {
            inspected.wrap_err_with(|| format!("inspecting {label} failed"))
        }
        _ = stop.changed() => {
            tracing::info!(source = label, "closing source due to shutdown");
            Ok(0)
        }
    };

    lines.close().await;
    result
}

/// Resolves on Ctrl-C, or on SIGTERM where signals exist.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    #[cfg(unix)]
    let terminate = async move {
        sigterm.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        () = terminate => Ok(()),
    }
}
