use super::ResponseBody;
use crate::error::BoxError;
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn, Instrument};

/// Chunks a producer may run ahead of the client before it is suspended.
pub const SEND_BUFFER_CAPACITY: usize = 256;

/// Connects a chunk source to a response body through a bounded channel.
///
/// The producer task pulls from `source`, encodes, and sends; it stops when
/// the source ends, when the source yields an error (logged, body truncated),
/// or when the client goes away and the body is dropped. The body waits
/// `initial_delay` before the first chunk and `chunk_delay` after each one.
pub(crate) fn pump<T, F>(
    source: BoxStream<'static, Result<T, BoxError>>,
    encode: F,
    initial_delay: Duration,
    chunk_delay: Duration,
    verbose: bool,
) -> ResponseBody
where
    T: Send + 'static,
    F: Fn(T) -> Bytes + Send + 'static,
{
    let (tx, rx) = mpsc::channel(SEND_BUFFER_CAPACITY);
    tokio::spawn(produce(source, tx, encode, verbose).in_current_span());

    let frames = stream::unfold((rx, true), move |(mut rx, first)| async move {
        let pause = if first { initial_delay } else { chunk_delay };
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        let chunk: Bytes = rx.recv().await?;
        Some((Ok::<_, Infallible>(Frame::data(chunk)), (rx, false)))
    });
    StreamBody::new(frames).boxed_unsync()
}

async fn produce<T, F>(
    mut source: BoxStream<'static, Result<T, BoxError>>,
    tx: mpsc::Sender<Bytes>,
    encode: F,
    verbose: bool,
) where
    F: Fn(T) -> Bytes,
{
    loop {
        let item = tokio::select! {
            biased;
            _ = tx.closed() => {
                debug!("Client went away, stopping chunk producer");
                return;
            }
            item = source.next() => item,
        };
        match item {
            Some(Ok(chunk)) => {
                let bytes = encode(chunk);
                if verbose {
                    debug!("Writing chunk: {}", String::from_utf8_lossy(&bytes));
                }
                if tx.send(bytes).await.is_err() {
                    debug!("Client went away, stopping chunk producer");
                    return;
                }
            }
            Some(Err(e)) => {
                warn!("Error while sending chunks: {}", e);
                return;
            }
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;
    use tracing_test::traced_test;

    fn text_source(items: Vec<&'static str>) -> BoxStream<'static, Result<String, BoxError>> {
        stream::iter(items.into_iter().map(|s| Ok(s.to_string()))).boxed()
    }

    #[tokio::test]
    async fn test_chunks_arrive_in_order() {
        let body = pump(
            text_source(vec!["One", "Two", "Three"]),
            Bytes::from,
            Duration::ZERO,
            Duration::ZERO,
            false,
        );
        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(bytes, Bytes::from("OneTwoThree"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_source_error_truncates_body() {
        let source = stream::iter(vec![
            Ok("a".to_string()),
            Err::<String, BoxError>("upstream broke".into()),
            Ok("never".to_string()),
        ])
        .boxed();

        let body = pump(source, Bytes::from, Duration::ZERO, Duration::ZERO, false);
        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(bytes, Bytes::from("a"));
        assert!(logs_contain("Error while sending chunks: upstream broke"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_applied_before_and_between_chunks() {
        let started = Instant::now();
        let body = pump(
            text_source(vec!["x", "y"]),
            Bytes::from,
            Duration::from_millis(100),
            Duration::from_millis(50),
            false,
        );
        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(bytes, Bytes::from("xy"));
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_dropped_body_stops_producer_within_buffer() {
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = produced.clone();
        let endless = stream::iter(0u64..)
            .map(move |n| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, BoxError>(n)
            })
            .boxed();

        let body = pump(
            endless,
            |n: u64| Bytes::from(n.to_string()),
            Duration::ZERO,
            Duration::ZERO,
            false,
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(body);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let after_drop = produced.load(Ordering::SeqCst);
        assert!(after_drop <= SEND_BUFFER_CAPACITY + 2);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(produced.load(Ordering::SeqCst), after_drop);
    }
}
