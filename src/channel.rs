/*
 * Byte channel between the reader thread and the decoder
 *
 * The producer owns the transport and copies received bytes into a
 * bounded shared buffer. The consumer takes them out with a timeout.
 * When the shared buffer is full the producer keeps the remainder in
 * its local buffer and stops reading once that is full too. Bytes are
 * never dropped.
 */

use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, trace};

use crate::error::Error;

/// Low-level byte source, e.g. a serial port.
pub trait Transport: Send {
    /// Largest chunk the transport delivers with one read
    fn max_packet_size(&self) -> usize;

    /// Blocking read of up to `buf.len()` bytes.
    ///
    /// `io::ErrorKind::TimedOut` (or `WouldBlock`) reports an idle link
    /// and is retried, all other errors stop the producer.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
}

/// Interval between polls of an idle link, about the time to transfer
/// 192 characters of 10 bits.
pub fn poll_interval(baud_rate: usize) -> Duration {
    const MIN_INTERVAL: Duration = Duration::from_millis(1);

    if baud_rate == 0 {
        return MIN_INTERVAL;
    }
    let interval = Duration::from_micros((192 * 10 * 1_000_000 / baud_rate) as u64);
    interval.max(MIN_INTERVAL)
}

#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Size of the producer's local accumulation buffer
    pub buffer_size: usize,
    /// Timeout of one transport read
    pub read_timeout: Duration,
    /// Pacing of polls when the transport returned less than requested
    pub poll_interval: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            buffer_size: 8192,
            read_timeout: Duration::from_millis(1100),
            poll_interval: poll_interval(115200),
        }
    }
}

#[derive(Debug)]
struct SharedBuffer {
    data: Vec<u8>,
    capacity: usize,
    producer_running: bool,
    shutdown: bool,
    last_error: Option<Error>,
}

#[derive(Debug)]
struct Inner {
    buffer: Mutex<SharedBuffer>,
    data_available: Condvar,
    space_available: Condvar,
}

/// Handle to the shared buffer. Clones refer to the same channel.
#[derive(Debug, Clone)]
pub struct ByteChannel {
    inner: Arc<Inner>,
}

impl ByteChannel {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                buffer: Mutex::new(SharedBuffer {
                    data: Vec::with_capacity(capacity),
                    capacity,
                    producer_running: true,
                    shutdown: false,
                    last_error: None,
                }),
                data_available: Condvar::new(),
                space_available: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SharedBuffer> {
        self.inner.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Number of bytes waiting for the consumer
    pub fn available(&self) -> usize {
        self.lock().data.len()
    }

    pub fn is_producer_running(&self) -> bool {
        self.lock().producer_running
    }

    /// Copies as much of `data` as fits into the shared buffer.
    /// Returns the number of bytes taken.
    pub fn share(&self, data: &[u8]) -> usize {
        let mut shared = self.lock();
        let count = data.len().min(shared.capacity - shared.data.len());
        if count > 0 {
            shared.data.extend_from_slice(&data[..count]);
            self.inner.data_available.notify_all();
        }
        count
    }

    /// Takes up to `dst.len()` bytes, waiting at most `timeout` for data.
    ///
    /// Buffered bytes are delivered even after the producer stopped. Once
    /// they are drained, the producer's last error is returned.
    pub fn read(&self, dst: &mut [u8], timeout: Duration) -> Result<usize, Error> {
        let shared = self.lock();

        let (mut shared, _) = self
            .inner
            .data_available
            .wait_timeout_while(shared, timeout, |s| s.data.is_empty() && s.producer_running)
            .unwrap_or_else(PoisonError::into_inner);

        if shared.data.is_empty() {
            if shared.producer_running {
                return Err(Error::ReadTimeout);
            }
            return Err(shared.last_error.clone().unwrap_or(Error::ProducerStopped));
        }

        let count = dst.len().min(shared.data.len());
        dst[..count].copy_from_slice(&shared.data[..count]);
        shared.data.drain(..count);
        self.inner.space_available.notify_all();

        Ok(count)
    }

    /// Asks the producer to stop at its next poll.
    pub fn shutdown(&self) {
        let mut shared = self.lock();
        shared.shutdown = true;
        self.inner.space_available.notify_all();
    }

    /// Marks the producer as stopped. Waiting readers wake up and get
    /// `error` once the buffer is drained.
    pub fn terminate(&self, error: Error) {
        let mut shared = self.lock();
        shared.producer_running = false;
        shared.last_error = Some(error);
        self.inner.data_available.notify_all();
        self.inner.space_available.notify_all();
    }

    fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }

    fn wait_for_space(&self, timeout: Duration) {
        let shared = self.lock();
        let _ = self
            .inner
            .space_available
            .wait_timeout_while(shared, timeout, |s| s.data.len() == s.capacity && !s.shutdown)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Reader loop. Runs until the transport fails or `shutdown()` is
    /// called and returns the reason.
    pub fn run_producer<T: Transport>(&self, mut transport: T, config: &ProducerConfig) -> Error {
        let mut local = vec![0u8; config.buffer_size.max(1)];
        let mut pending = 0;

        info!("reader started");

        let reason = loop {
            if self.is_shutdown() {
                break Error::ProducerStopped;
            }

            let poll_start = Instant::now();
            let mut burst = false;

            let space = local.len() - pending;
            if space == 0 {
                self.wait_for_space(config.read_timeout);
            } else {
                let want = transport.max_packet_size().min(space);
                match transport.read(&mut local[pending..pending + want], config.read_timeout) {
                    Ok(count) => {
                        trace!("{} bytes read", count);
                        pending += count;
                        burst = count > 0 && count == want;
                    }
                    Err(ref e) if is_retryable(e) => (),
                    Err(e) => {
                        error!("reader failed: {}", e);
                        break Error::from(e);
                    }
                }
            }

            pending = self.share_pending(&mut local, pending);

            if !burst {
                let elapsed = poll_start.elapsed();
                if elapsed < config.poll_interval {
                    thread::sleep(config.poll_interval - elapsed);
                }
            }
        };

        // hand over what was received before stopping
        while pending > 0 && !self.is_shutdown() {
            self.wait_for_space(config.read_timeout);
            pending = self.share_pending(&mut local, pending);
        }
        if pending > 0 {
            debug!("reader stopped with {} bytes not delivered", pending);
        }

        info!("reader stopped: {}", reason);
        self.terminate(reason.clone());
        reason
    }

    /// Runs the producer on its own thread.
    pub fn spawn_producer<T>(&self, transport: T, config: ProducerConfig) -> Result<thread::JoinHandle<Error>, Error>
    where
        T: Transport + 'static,
    {
        let channel = self.clone();
        let handle = thread::Builder::new()
            .name(String::from("gnss-reader"))
            .spawn(move || channel.run_producer(transport, &config))?;
        Ok(handle)
    }

    fn share_pending(&self, local: &mut [u8], pending: usize) -> usize {
        if pending == 0 {
            return 0;
        }
        let shared = self.share(&local[..pending]);
        if shared < pending {
            trace!("shared buffer full, keeping {} bytes", pending - shared);
            local.copy_within(shared..pending, 0);
        }
        pending - shared
    }
}

fn is_retryable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Waits for the reader thread and returns the reason it stopped.
pub fn join_producer(handle: thread::JoinHandle<Error>) -> Error {
    match handle.join() {
        Ok(reason) => reason,
        Err(_) => {
            error!("reader thread panicked");
            Error::ProducerStopped
        }
    }
}
