// SecureDB: Live feed server
//
// One ticker task re-randomizes the feed file on a fixed interval and
// publishes the result to the hub. Each WebSocket client on `/` receives the
// current document on connect, then every published document until it
// disconnects.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use warp::ws::{Message, WebSocket, Ws};
use warp::Filter;

use super::hub::Subscription;
use super::{FeedError, FeedHub, FeedSource};
use crate::config::FeedConfig;

const HUB_CAPACITY: usize = 16;

/// Run the feed until the server stops.
pub async fn run(config: FeedConfig) -> Result<(), FeedError> {
    let source = Arc::new(FeedSource::new(config.file.clone()));
    let hub = Arc::new(FeedHub::new(HUB_CAPACITY));

    let initial = {
        let source = Arc::clone(&source);
        tokio::task::spawn_blocking(move || source.read())
            .await
            .map_err(|e| FeedError::Task(e.to_string()))??
    };
    hub.publish(&initial)?;

    let ticker = tokio::spawn(run_ticker(
        Arc::clone(&source),
        Arc::clone(&hub),
        config.interval,
    ));

    let (addr, server) = warp::serve(routes(hub))
        .try_bind_ephemeral(config.addr)
        .map_err(|e| FeedError::Bind(e.to_string()))?;

    tracing::info!(
        %addr,
        file = %source.path().display(),
        interval_secs = config.interval.as_secs_f64(),
        "Live feed listening"
    );

    server.await;
    ticker.abort();
    Ok(())
}

/// The WebSocket endpoint at `/`.
pub fn routes(
    hub: Arc<FeedHub>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let hub = warp::any().map(move || Arc::clone(&hub));

    warp::path::end()
        .and(warp::ws())
        .and(hub)
        .map(|ws: Ws, hub: Arc<FeedHub>| {
            ws.on_upgrade(move |socket| serve_subscriber(socket, hub))
        })
}

/// Tick once on the blocking pool and publish the new document.
pub async fn tick_once(source: &Arc<FeedSource>, hub: &FeedHub) -> Result<(), FeedError> {
    let source = Arc::clone(source);
    let doc = tokio::task::spawn_blocking(move || source.tick())
        .await
        .map_err(|e| FeedError::Task(e.to_string()))??;
    hub.publish(&doc)
}

async fn run_ticker(source: Arc<FeedSource>, hub: Arc<FeedHub>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    // The first tick completes immediately; the initial document is already published.
    interval.tick().await;

    loop {
        interval.tick().await;
        match tick_once(&source, &hub).await {
            Ok(()) => tracing::debug!(subscribers = hub.subscriber_count(), "Feed updated"),
            Err(e) => tracing::warn!(error = %e, "Feed tick failed"),
        }
    }
}

async fn serve_subscriber(socket: WebSocket, hub: Arc<FeedHub>) {
    let Subscription {
        initial,
        mut updates,
    } = hub.subscribe();
    let (mut tx, mut rx) = socket.split();

    tracing::info!(subscribers = hub.subscriber_count(), "Client connected");

    if let Some(frame) = initial {
        if tx.send(Message::text(frame.to_string())).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            incoming = rx.next() => match incoming {
                Some(Ok(msg)) if msg.is_close() => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "WebSocket receive error");
                    break;
                }
                None => break,
            },
            update = updates.recv() => match update {
                Ok(frame) => {
                    if tx.send(Message::text(frame.to_string())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Feed subscriber lagged; skipping to latest");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    tracing::info!("Client disconnected");
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Number};

    use super::*;
    use crate::feed::{FeedDocument, VALUE_BOUND};

    fn doc(data: Vec<u32>) -> FeedDocument {
        FeedDocument {
            data: data.into_iter().map(Number::from).collect(),
            extra: Map::new(),
        }
    }

    fn frame_doc(msg: &Message) -> FeedDocument {
        serde_json::from_str(msg.to_str().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_ws_sends_current_document_then_updates() {
        let hub = Arc::new(FeedHub::new(4));
        hub.publish(&doc(vec![1, 2, 3])).unwrap();

        let mut client = warp::test::ws()
            .path("/")
            .handshake(routes(Arc::clone(&hub)))
            .await
            .expect("WebSocket handshake should succeed");

        let first = client.recv().await.unwrap();
        assert_eq!(frame_doc(&first), doc(vec![1, 2, 3]));

        hub.publish(&doc(vec![9, 9])).unwrap();
        let second = client.recv().await.unwrap();
        assert_eq!(frame_doc(&second), doc(vec![9, 9]));
    }

    #[tokio::test]
    async fn test_ws_rejects_other_paths() {
        let hub = Arc::new(FeedHub::new(4));
        let result = warp::test::ws()
            .path("/other")
            .handshake(routes(hub))
            .await;
        assert!(result.is_err(), "Only the root path serves the feed");
    }

    #[tokio::test]
    async fn test_tick_once_publishes_randomized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pieChart.json");
        std::fs::write(&path, json!({"data": [50, 60, 70, 80]}).to_string()).unwrap();

        let source = Arc::new(FeedSource::new(path));
        let hub = FeedHub::new(4);
        tick_once(&source, &hub).await.unwrap();

        let published: FeedDocument =
            serde_json::from_str(&hub.current().expect("A document should be published")).unwrap();
        assert_eq!(published.data.len(), 4);
        assert!(published
            .data
            .iter()
            .all(|v| v.as_u64().is_some_and(|v| v < u64::from(VALUE_BOUND))));
        assert_eq!(source.read().unwrap(), published);
    }

    #[tokio::test]
    async fn test_tick_once_error_leaves_hub_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FeedSource::new(dir.path().join("missing.json")));
        let hub = FeedHub::new(4);

        assert!(tick_once(&source, &hub).await.is_err());
        assert!(hub.current().is_none());
    }
}
