//! Audio-thread diagnostics.
//!
//! `ns_log!` formats into a fixed-size slot of a pre-allocated queue, so it
//! can be called from `process` without allocating or locking. The host
//! shell drains the queue to `<temp dir>/neonscope.log` from non-real-time
//! callbacks. Without the `debug` feature the macro compiles to nothing but
//! argument evaluation.
//!
//! Lifecycle messages that never run on the audio thread go through the
//! `log` facade instead.

use std::fmt;

#[cfg(feature = "debug")]
pub mod queue {
    use std::cell::UnsafeCell;
    use std::fmt::{self, Write as _};
    use std::fs::OpenOptions;
    use std::io::Write as _;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::OnceLock;

    const SLOTS: usize = 128;
    const MESSAGE_BYTES: usize = 256;
    const FILE_NAME: &str = "neonscope.log";

    #[derive(Clone, Copy)]
    struct Message {
        len: usize,
        bytes: [u8; MESSAGE_BYTES],
    }

    impl Message {
        const EMPTY: Self = Self {
            len: 0,
            bytes: [0; MESSAGE_BYTES],
        };

        fn text(&self) -> &str {
            // truncation may split a code point; keep the valid prefix
            match std::str::from_utf8(&self.bytes[..self.len]) {
                Ok(s) => s,
                Err(e) => std::str::from_utf8(&self.bytes[..e.valid_up_to()]).unwrap_or(""),
            }
        }
    }

    impl fmt::Write for Message {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            let n = s.len().min(MESSAGE_BYTES - self.len);
            self.bytes[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
            self.len += n;
            Ok(())
        }
    }

    /// Single-producer single-consumer ring. Full means the message is
    /// dropped.
    struct Queue {
        write: AtomicUsize,
        read: AtomicUsize,
        slots: Box<[UnsafeCell<Message>]>,
    }

    // SAFETY: one producer (audio thread) and one consumer (drain) touch
    // disjoint slots, ordered by the acquire/release index handoff.
    unsafe impl Sync for Queue {}

    impl Queue {
        fn new() -> Self {
            Self {
                write: AtomicUsize::new(0),
                read: AtomicUsize::new(0),
                slots: (0..SLOTS).map(|_| UnsafeCell::new(Message::EMPTY)).collect(),
            }
        }

        fn push(&self, message: &Message) {
            let write = self.write.load(Ordering::Relaxed);
            let next = (write + 1) % SLOTS;
            if next == self.read.load(Ordering::Acquire) {
                return;
            }
            unsafe {
                *self.slots[write].get() = *message;
            }
            self.write.store(next, Ordering::Release);
        }

        fn pop(&self) -> Option<Message> {
            let read = self.read.load(Ordering::Relaxed);
            if read == self.write.load(Ordering::Acquire) {
                return None;
            }
            let message = unsafe { *self.slots[read].get() };
            self.read.store((read + 1) % SLOTS, Ordering::Release);
            Some(message)
        }
    }

    static QUEUE: OnceLock<Queue> = OnceLock::new();

    /// Allocate the queue. Call from a non-real-time context.
    pub fn init() {
        let _ = QUEUE.get_or_init(Queue::new);
    }

    pub fn push_args(args: fmt::Arguments) {
        let Some(queue) = QUEUE.get() else {
            return;
        };
        let mut message = Message::EMPTY;
        let _ = message.write_fmt(args);
        queue.push(&message);
    }

    /// Append everything queued so far to the log file.
    pub fn drain_to_file() {
        let Some(queue) = QUEUE.get() else {
            return;
        };
        let path = std::env::temp_dir().join(FILE_NAME);
        let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&path) else {
            return;
        };
        while let Some(message) = queue.pop() {
            if message.len > 0 {
                let _ = writeln!(file, "{}", message.text());
            }
        }
    }
}

#[cfg(feature = "debug")]
pub(crate) fn ns_log_inner(args: fmt::Arguments) {
    queue::push_args(args);
}

#[cfg(not(feature = "debug"))]
pub(crate) fn ns_log_inner(_args: fmt::Arguments) {}

/// Start diagnostics if the `debug` feature is on.
pub fn init() {
    #[cfg(feature = "debug")]
    queue::init();
}

/// Flush queued audio-thread messages if the `debug` feature is on.
pub fn flush() {
    #[cfg(feature = "debug")]
    queue::drain_to_file();
}

#[macro_export]
macro_rules! ns_log {
    ($($arg:tt)*) => {
        $crate::debug::ns_log_inner(format_args!($($arg)*))
    };
}
