// =============================================================================
// Subscription multiplexer — one connection, many logical kline streams
// =============================================================================
//
// A single WebSocket carries every subscription.  `subscribe` registers a
// pending correlation entry keyed by the encoded topic and sends one
// subscribe frame; the acknowledgement later materializes a subscriber entry
// and resolves the caller with a live stream.  Data frames are routed to
// their subscriber by topic.
//
// Before any live candle is delivered, the one historical candle immediately
// preceding the first observed record is fetched and published.  Ordering is
// enforced by a single-consumer worker task per subscriber: the backfill job
// is enqueued ahead of the first live batch, so the stream always observes
// resync-then-live even though the fetch completes at an arbitrary time
// relative to other topics' work.  Topics never block each other.
//
// Both registries are owned by the multiplexer and touched only from
// `subscribe` and the single frame-dispatch path; lock order is always
// pending before subscribers.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::error::{ResyncError, SubscribeError};
use crate::kline::{assemble, Candle, WsKline};
use crate::rest::{KlineFetcher, KlineRequest};
use crate::topic::SubscriptionTopic;
use crate::ws::frames::{classify, DataFrame, InboundFrame, SubscribeFrame, SubscriptionAck};

/// Default wait for a subscribe acknowledgement.
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

/// One delivery on a kline stream: a batch of candles from a single frame,
/// or the terminal resync failure.
pub type KlineEvent = Result<Vec<Candle>, ResyncError>;

/// Settings for [`BybitPublicWebsocket`].
#[derive(Debug, Clone)]
pub struct WebsocketSettings {
    pub testnet: bool,
    /// Bounded wait for the subscribe acknowledgement; on expiry the pending
    /// entry is removed so the topic may be retried.
    pub subscribe_timeout: Duration,
}

impl Default for WebsocketSettings {
    fn default() -> Self {
        Self {
            testnet: true,
            subscribe_timeout: SUBSCRIBE_TIMEOUT,
        }
    }
}

/// Live output stream of one subscription.  Delivery is unbounded: a slow
/// consumer buffers, it never stalls the connection.
pub struct KlineStream {
    rx: mpsc::UnboundedReceiver<KlineEvent>,
}

impl KlineStream {
    /// Next event, or `None` once the stream has terminated.
    pub async fn recv(&mut self) -> Option<KlineEvent> {
        self.rx.recv().await
    }
}

/// Correlates an outbound subscribe request with the caller awaiting its
/// acknowledgement.
struct PendingSubscription {
    topic: SubscriptionTopic,
    resolve: oneshot::Sender<Result<KlineStream, SubscribeError>>,
}

/// Work processed in strict order by a subscriber's worker task.
enum WorkItem {
    Backfill { expected_open: DateTime<Utc> },
    Publish(Vec<Candle>),
}

/// Registry entry for one acknowledged subscription.
struct SubscriberEntry {
    topic: SubscriptionTopic,
    /// True until the backfill job has been enqueued (first data frame).
    initializing: bool,
    work: mpsc::UnboundedSender<WorkItem>,
}

/// Client for the public kline WebSocket feed.
///
/// Construction yields the multiplexer plus the receiver of outbound frames;
/// wire both to a socket with [`crate::ws::transport::run_stream`].
pub struct BybitPublicWebsocket {
    outbound: mpsc::UnboundedSender<String>,
    fetcher: Arc<dyn KlineFetcher>,
    subscribe_timeout: Duration,
    pending: Mutex<HashMap<String, PendingSubscription>>,
    subscribers: Mutex<HashMap<String, SubscriberEntry>>,
    orphan_data_frames: AtomicU64,
    orphan_acks: AtomicU64,
    unrecognized_frames: AtomicU64,
}

impl BybitPublicWebsocket {
    pub fn new(
        fetcher: Arc<dyn KlineFetcher>,
        settings: &WebsocketSettings,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let ws = Arc::new(Self {
            outbound,
            fetcher,
            subscribe_timeout: settings.subscribe_timeout,
            pending: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            orphan_data_frames: AtomicU64::new(0),
            orphan_acks: AtomicU64::new(0),
            unrecognized_frames: AtomicU64::new(0),
        });
        (ws, outbound_rx)
    }

    // -------------------------------------------------------------------------
    // Subscribe
    // -------------------------------------------------------------------------

    /// Subscribe to one kline topic.
    ///
    /// Sends a single subscribe frame and resolves once the exchange
    /// acknowledges it.  A second subscribe for a topic that is already
    /// pending or live is rejected synchronously.  A sent request cannot be
    /// withdrawn; on timeout the pending entry is removed but the exchange
    /// may still consider the topic subscribed.
    pub async fn subscribe(
        &self,
        topic: SubscriptionTopic,
    ) -> Result<KlineStream, SubscribeError> {
        let encoded = topic.encode();
        info!(topic = %encoded, "received request to subscribe");

        let (resolve, resolved) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            let subscribers = self.subscribers.lock();
            if pending.contains_key(&encoded) || subscribers.contains_key(&encoded) {
                return Err(SubscribeError::AlreadySubscribed(encoded));
            }
            pending.insert(encoded.clone(), PendingSubscription { topic, resolve });
        }

        let frame = serde_json::to_string(&SubscribeFrame::new(&encoded))
            .expect("subscribe frame serializes to JSON");
        if self.outbound.send(frame).is_err() {
            self.pending.lock().remove(&encoded);
            return Err(SubscribeError::ConnectionClosed);
        }

        match tokio::time::timeout(self.subscribe_timeout, resolved).await {
            Ok(Ok(result)) => result,
            // The multiplexer dropped the resolver without answering.
            Ok(Err(_)) => {
                self.pending.lock().remove(&encoded);
                Err(SubscribeError::ConnectionClosed)
            }
            Err(_) => {
                self.pending.lock().remove(&encoded);
                // The ack may have raced the deadline and already
                // materialized an entry nobody is listening to.
                self.subscribers.lock().remove(&encoded);
                Err(SubscribeError::AckTimeout {
                    topic: encoded,
                    timeout: self.subscribe_timeout,
                })
            }
        }
    }

    // -------------------------------------------------------------------------
    // Inbound frame dispatch (single path, one frame at a time)
    // -------------------------------------------------------------------------

    /// Classify and dispatch one inbound message.  Never fatal: malformed or
    /// unroutable frames are logged, counted, and dropped.
    pub fn handle_message(&self, text: &str) {
        let message: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                self.unrecognized_frames.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "non-JSON frame — dropping");
                return;
            }
        };

        match classify(message) {
            InboundFrame::Data(frame) => self.handle_data(frame),
            InboundFrame::Ack(ack) => self.handle_ack(ack),
            InboundFrame::Unrecognized(value) => {
                self.unrecognized_frames.fetch_add(1, Ordering::Relaxed);
                warn!(message = %value, "unmatched message — dropping");
            }
        }
    }

    fn handle_data(&self, frame: DataFrame) {
        // Decode the whole batch first; a bad record drops only this frame.
        let mut batch = Vec::with_capacity(frame.data.len());
        for record in frame.data {
            match serde_json::from_value::<WsKline>(record) {
                Ok(raw) => batch.push(Candle::from(raw)),
                Err(e) => {
                    warn!(
                        topic = %frame.topic,
                        error = %e,
                        "failed to decode kline batch — dropping frame"
                    );
                    return;
                }
            }
        }

        let mut subscribers = self.subscribers.lock();
        let Some(entry) = subscribers.get_mut(&frame.topic) else {
            self.orphan_data_frames.fetch_add(1, Ordering::Relaxed);
            warn!(topic = %frame.topic, "no subscriber for topic — dropping frame");
            return;
        };

        if entry.initializing {
            // The candle immediately preceding the first observed record.
            let expected_open = batch[0].start - entry.topic.timeframe.duration();
            entry.initializing = false;
            if entry.work.send(WorkItem::Backfill { expected_open }).is_err() {
                warn!(topic = %frame.topic, "subscriber worker gone before resync");
                return;
            }
        }

        if entry.work.send(WorkItem::Publish(batch)).is_err() {
            debug!(topic = %frame.topic, "subscription stream terminated — dropping frame");
        }
    }

    fn handle_ack(&self, ack: SubscriptionAck) {
        let encoded = ack.topic().to_string();
        info!(topic = %encoded, conn_id = %ack.conn_id, "subscription handshake complete");

        let Some(entry) = self.pending.lock().remove(&encoded) else {
            // Duplicate or stray ack; ignoring keeps dispatch idempotent.
            self.orphan_acks.fetch_add(1, Ordering::Relaxed);
            debug!(topic = %encoded, "acknowledgement with no pending request — ignoring");
            return;
        };

        if !ack.success {
            warn!(topic = %encoded, ret_msg = %ack.ret_msg, "exchange rejected subscription");
            let _ = entry.resolve.send(Err(SubscribeError::Rejected {
                topic: encoded,
                ret_msg: ack.ret_msg,
            }));
            return;
        }

        let (work_tx, work_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_subscriber_worker(
            entry.topic,
            self.fetcher.clone(),
            work_rx,
            out_tx,
        ));
        self.subscribers.lock().insert(
            encoded.clone(),
            SubscriberEntry {
                topic: entry.topic,
                initializing: true,
                work: work_tx,
            },
        );

        if entry
            .resolve
            .send(Ok(KlineStream { rx: out_rx }))
            .is_err()
        {
            // Caller timed out in the same instant; drop the entry so the
            // topic can be subscribed again.
            self.subscribers.lock().remove(&encoded);
            warn!(topic = %encoded, "subscriber abandoned before acknowledgement — discarding entry");
        }
    }

    // -------------------------------------------------------------------------
    // Counters
    // -------------------------------------------------------------------------

    /// Data frames dropped because no subscriber matched their topic.
    pub fn orphan_data_frames(&self) -> u64 {
        self.orphan_data_frames.load(Ordering::Relaxed)
    }

    /// Acknowledgements with no matching pending request.
    pub fn orphan_acks(&self) -> u64 {
        self.orphan_acks.load(Ordering::Relaxed)
    }

    /// Frames matching neither known shape.
    pub fn unrecognized_frames(&self) -> u64 {
        self.unrecognized_frames.load(Ordering::Relaxed)
    }
}

// -----------------------------------------------------------------------------
// Per-subscriber worker
// -----------------------------------------------------------------------------

/// Consume one subscription's work queue in strict order.  A resync failure
/// terminates the stream with a final error event; other topics are
/// unaffected.
async fn run_subscriber_worker(
    topic: SubscriptionTopic,
    fetcher: Arc<dyn KlineFetcher>,
    mut work: mpsc::UnboundedReceiver<WorkItem>,
    out: mpsc::UnboundedSender<KlineEvent>,
) {
    while let Some(item) = work.recv().await {
        match item {
            WorkItem::Backfill { expected_open } => {
                match backfill(&topic, fetcher.as_ref(), expected_open).await {
                    Ok(candle) => {
                        debug!(topic = %topic, start = %candle.start, "backfill candle published");
                        if out.send(Ok(vec![candle])).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        error!(topic = %topic, error = %e, "resync failed — terminating subscription stream");
                        let _ = out.send(Err(e));
                        return;
                    }
                }
            }
            WorkItem::Publish(batch) => {
                if out.send(Ok(batch)).is_err() {
                    // Subscriber dropped its stream.
                    return;
                }
            }
        }
    }
}

/// Fetch exactly the candle opening at `expected_open`.
async fn backfill(
    topic: &SubscriptionTopic,
    fetcher: &dyn KlineFetcher,
    expected_open: DateTime<Utc>,
) -> Result<Candle, ResyncError> {
    let request = KlineRequest {
        symbol: topic.symbol,
        interval: topic.timeframe,
        from: expected_open,
        limit: Some(1),
    };
    let page = fetcher.kline(&request).await.map_err(ResyncError::Fetch)?;
    let row = page
        .result
        .iter()
        .find(|row| row.open_time == expected_open)
        .ok_or(ResyncError::CandleMissing { expected_open })?;
    Ok(assemble(row, topic.timeframe, page.time_now))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
