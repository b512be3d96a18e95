//! Replays JSON-lines files of stream events through the action executors, one micro-batch per
//! `DECISION_BATCH_SIZE` events or `DECISION_BATCH_TIME_MS`, whichever comes first.
//!
//! ```text
//! decision events.jsonl
//! cat events.jsonl | decision
//! ```

use std::env;
use std::error::Error;

use decision_core::sinker::sink::log::LogSink;
use decision_core::{ActionDispatcherBuilder, ActionType, Settings, StreamEvent, group_by_action};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod setup_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_tracing::register();

    if let Err(e) = run().await {
        error!("{e:?}");
        return Err(e);
    }
    info!("Exiting...");

    Ok(())
}

async fn run() -> Result<(), Box<dyn Error>> {
    let settings = Settings::load(env::vars())?;

    let mut builder = ActionDispatcherBuilder::new();
    if settings.print_streams {
        builder = builder.executor(ActionType::Print, LogSink);
    }
    let stores = [
        (ActionType::SaveToColumnar, settings.columnar.is_some()),
        (ActionType::SaveToDocument, settings.document.is_some()),
        (ActionType::SaveToCollection, settings.collection.is_some()),
        (ActionType::SaveToSearchIndex, settings.search.is_some()),
        (ActionType::Forward, settings.forward.is_some()),
    ];
    for (action, _) in stores.iter().filter(|(_, configured)| *configured) {
        // the store drivers are linked by the engine embedding this crate
        warn!(%action, "Executor is configured but not available when replaying, its events are dropped");
    }
    let dispatcher = builder.build().await?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(?e, "Failed to listen for ctrl-c");
            return;
        }
        info!("Received ctrl-c, stopping the replay");
        shutdown.cancel();
    });

    let input: Box<dyn AsyncRead + Unpin + Send> = match env::args().nth(1) {
        Some(path) if path != "-" => {
            info!(%path, "Replaying events from file");
            Box::new(tokio::fs::File::open(path).await?)
        }
        _ => Box::new(tokio::io::stdin()),
    };

    let events = LinesStream::new(BufReader::new(input).lines()).filter_map(|line| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => match serde_json::from_str::<StreamEvent>(&line) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(%e, "Skipping malformed event");
                None
            }
        },
        Err(e) => {
            error!(%e, "Failed to read the input");
            None
        }
    });
    let batches = events.chunks_timeout(settings.replay.batch_size.max(1), settings.replay.batch_time);
    tokio::pin!(batches);

    let mut replayed = 0;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            batch = batches.next() => {
                let Some(batch) = batch else {
                    break;
                };
                replayed += batch.len();
                dispatcher.dispatch(group_by_action(batch)).await?;
            }
        }
    }

    info!(replayed, "Replay finished");
    Ok(())
}
