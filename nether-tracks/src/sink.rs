//! Output sink contract and two in-process sinks
//!
//! The engine never mixes. Every used track owns one output queue in the
//! host mixer and pushes raw stored-format bytes into it together with the
//! [`MixerFlags`] describing them.
//!
//! - [`RingQueueSink`] backs each queue with a lock-free byte ring
//!   (producer side stays with the engine, the consumer goes to the mixer)
//! - [`RecordingSink`] keeps everything in memory for inspection

use std::sync::{Arc, Mutex, MutexGuard};

use bitflags::bitflags;
use hashbrown::HashMap;
use ringbuf::traits::{Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

bitflags! {
    /// Format of the bytes pushed into an output queue
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MixerFlags: u32 {
        /// Samples are unsigned (8-bit data)
        const UNSIGNED = 1 << 0;
        /// Samples are 16 bits wide
        const BITS_16 = 1 << 1;
        /// 16-bit samples are little-endian
        const LITTLE_ENDIAN = 1 << 2;
        /// Interleaved stereo frames
        const STEREO = 1 << 3;
    }
}

impl MixerFlags {
    /// Bytes per interleaved frame
    pub fn frame_bytes(self) -> usize {
        let sample = if self.contains(MixerFlags::BITS_16) { 2 } else { 1 };
        let channels = if self.contains(MixerFlags::STEREO) { 2 } else { 1 };
        sample * channels
    }
}

/// Opaque handle to one queue in the host mixer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueHandle(pub u32);

/// Host mixer interface
pub trait OutputSink: Send {
    /// Open a new output queue
    fn create_queue(&mut self, sample_rate: u32, flags: MixerFlags) -> QueueHandle;

    /// Append bytes to a queue
    fn enqueue(&mut self, queue: QueueHandle, data: Vec<u8>, flags: MixerFlags);

    /// Channel gain (0..=255) and balance (-127..=127)
    fn set_channel_volume_balance(&mut self, queue: QueueHandle, volume: u8, balance: i8);

    /// Whether the queue has played everything it was given
    fn is_drained(&self, queue: QueueHandle) -> bool;

    /// Close a queue; queued bytes may still play out
    fn finish(&mut self, queue: QueueHandle);

    /// Whether the mixer accepts data; ticks are skipped until it does
    fn is_ready(&self) -> bool {
        true
    }
}

// =============================================================================
// Ring buffer sink
// =============================================================================

/// Default per-queue ring capacity in bytes
pub const DEFAULT_QUEUE_CAPACITY: usize = 64 * 1024;

struct RingQueue {
    producer: HeapProd<u8>,
    consumer: Option<HeapCons<u8>>,
    sample_rate: u32,
    flags: MixerFlags,
    volume: u8,
    balance: i8,
    finished: bool,
    dropped_bytes: u64,
}

/// Sink that writes every queue into its own `ringbuf` byte ring
///
/// The mixer side calls [`RingQueueSink::take_consumer`] once per queue and
/// pops bytes from its own thread.
pub struct RingQueueSink {
    queues: HashMap<QueueHandle, RingQueue>,
    next_handle: u32,
    capacity: usize,
}

impl RingQueueSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Sink whose queues each hold `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queues: HashMap::new(),
            next_handle: 1,
            capacity: capacity.max(1),
        }
    }

    /// Hand the consumer end of a queue to the mixer (once)
    pub fn take_consumer(&mut self, queue: QueueHandle) -> Option<HeapCons<u8>> {
        self.queues.get_mut(&queue)?.consumer.take()
    }

    /// Sample rate and format a queue was opened with
    pub fn format(&self, queue: QueueHandle) -> Option<(u32, MixerFlags)> {
        self.queues.get(&queue).map(|q| (q.sample_rate, q.flags))
    }

    /// Last gain and balance set on a queue
    pub fn volume_balance(&self, queue: QueueHandle) -> Option<(u8, i8)> {
        self.queues.get(&queue).map(|q| (q.volume, q.balance))
    }

    /// Bytes waiting in the ring
    pub fn buffered(&self, queue: QueueHandle) -> usize {
        self.queues
            .get(&queue)
            .map(|q| q.producer.occupied_len())
            .unwrap_or(0)
    }

    /// Bytes that did not fit into the ring
    pub fn dropped_bytes(&self, queue: QueueHandle) -> u64 {
        self.queues.get(&queue).map(|q| q.dropped_bytes).unwrap_or(0)
    }

    pub fn is_finished(&self, queue: QueueHandle) -> bool {
        self.queues.get(&queue).map(|q| q.finished).unwrap_or(true)
    }

    /// Forget finished queues whose rings have played out
    pub fn collect_finished(&mut self) -> usize {
        let before = self.queues.len();
        self.queues
            .retain(|_, q| !(q.finished && q.producer.is_empty()));
        before - self.queues.len()
    }
}

impl Default for RingQueueSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for RingQueueSink {
    fn create_queue(&mut self, sample_rate: u32, flags: MixerFlags) -> QueueHandle {
        let handle = QueueHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1).max(1);

        let ring = HeapRb::<u8>::new(self.capacity);
        let (producer, consumer) = ring.split();
        self.queues.insert(
            handle,
            RingQueue {
                producer,
                consumer: Some(consumer),
                sample_rate,
                flags,
                volume: 0,
                balance: 0,
                finished: false,
                dropped_bytes: 0,
            },
        );
        debug!(queue = handle.0, sample_rate, ?flags, "output queue opened");
        handle
    }

    fn enqueue(&mut self, queue: QueueHandle, data: Vec<u8>, flags: MixerFlags) {
        let Some(q) = self.queues.get_mut(&queue) else {
            warn!(queue = queue.0, "enqueue on unknown queue");
            return;
        };
        if q.finished {
            warn!(queue = queue.0, "enqueue on finished queue");
            return;
        }
        q.flags = flags;
        let pushed = q.producer.push_slice(&data);
        if pushed < data.len() {
            q.dropped_bytes += (data.len() - pushed) as u64;
            debug!(
                queue = queue.0,
                dropped = data.len() - pushed,
                "output ring full"
            );
        }
    }

    fn set_channel_volume_balance(&mut self, queue: QueueHandle, volume: u8, balance: i8) {
        if let Some(q) = self.queues.get_mut(&queue) {
            q.volume = volume;
            q.balance = balance;
        }
    }

    fn is_drained(&self, queue: QueueHandle) -> bool {
        self.queues
            .get(&queue)
            .map(|q| q.producer.is_empty())
            .unwrap_or(true)
    }

    fn finish(&mut self, queue: QueueHandle) {
        if let Some(q) = self.queues.get_mut(&queue) {
            q.finished = true;
            debug!(queue = queue.0, "output queue finished");
        }
    }
}

// =============================================================================
// Recording sink
// =============================================================================

/// Everything a [`RecordingSink`] saw for one queue
#[derive(Debug, Clone, Default)]
pub struct RecordedQueue {
    pub sample_rate: u32,
    pub flags: MixerFlags,
    /// Chunk sizes in enqueue order
    pub chunks: Vec<usize>,
    /// All bytes, concatenated
    pub data: Vec<u8>,
    pub volume: u8,
    pub balance: i8,
    pub finished: bool,
}

#[derive(Debug, Default)]
struct RecordingState {
    queues: HashMap<QueueHandle, RecordedQueue>,
    order: Vec<QueueHandle>,
    next_handle: u32,
    drained: bool,
    not_ready: bool,
}

/// Sink that records every call
///
/// Clones share the same recording, so a test can keep one clone and hand
/// the other to the engine.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Report every queue as drained (or not) from now on
    pub fn set_drained(&self, drained: bool) {
        self.lock().drained = drained;
    }

    /// Simulate a mixer that is not accepting data yet
    pub fn set_ready(&self, ready: bool) {
        self.lock().not_ready = !ready;
    }

    /// Handles in creation order
    pub fn queues(&self) -> Vec<QueueHandle> {
        self.lock().order.clone()
    }

    /// Handles not yet finished
    pub fn open_queues(&self) -> Vec<QueueHandle> {
        let state = self.lock();
        state
            .order
            .iter()
            .copied()
            .filter(|h| state.queues.get(h).is_some_and(|q| !q.finished))
            .collect()
    }

    /// Snapshot of one queue
    pub fn queue(&self, queue: QueueHandle) -> Option<RecordedQueue> {
        self.lock().queues.get(&queue).cloned()
    }

    /// Total bytes pushed into a queue
    pub fn bytes_queued(&self, queue: QueueHandle) -> usize {
        self.lock()
            .queues
            .get(&queue)
            .map(|q| q.data.len())
            .unwrap_or(0)
    }

    pub fn volume_balance(&self, queue: QueueHandle) -> Option<(u8, i8)> {
        self.lock().queues.get(&queue).map(|q| (q.volume, q.balance))
    }

    pub fn is_finished(&self, queue: QueueHandle) -> bool {
        self.lock()
            .queues
            .get(&queue)
            .map(|q| q.finished)
            .unwrap_or(false)
    }
}

impl OutputSink for RecordingSink {
    fn create_queue(&mut self, sample_rate: u32, flags: MixerFlags) -> QueueHandle {
        let mut state = self.lock();
        state.next_handle += 1;
        let handle = QueueHandle(state.next_handle);
        state.queues.insert(
            handle,
            RecordedQueue {
                sample_rate,
                flags,
                ..RecordedQueue::default()
            },
        );
        state.order.push(handle);
        handle
    }

    fn enqueue(&mut self, queue: QueueHandle, data: Vec<u8>, flags: MixerFlags) {
        let mut state = self.lock();
        if let Some(q) = state.queues.get_mut(&queue) {
            q.flags = flags;
            q.chunks.push(data.len());
            q.data.extend_from_slice(&data);
        }
    }

    fn set_channel_volume_balance(&mut self, queue: QueueHandle, volume: u8, balance: i8) {
        if let Some(q) = self.lock().queues.get_mut(&queue) {
            q.volume = volume;
            q.balance = balance;
        }
    }

    fn is_drained(&self, _queue: QueueHandle) -> bool {
        self.lock().drained
    }

    fn finish(&mut self, queue: QueueHandle) {
        if let Some(q) = self.lock().queues.get_mut(&queue) {
            q.finished = true;
        }
    }

    fn is_ready(&self) -> bool {
        !self.lock().not_ready
    }
}
