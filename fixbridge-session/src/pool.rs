/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Reusable message buffers.
//!
//! Order, cancel, heartbeat and gap-fill sends all build a [`Message`], from
//! the caller's task, the heartbeat thread and the admin workers. The pool
//! keeps a bounded set of cleared buffers in a lock-free queue so none of
//! those paths allocates a fresh field list per send or waits on a lock.

use crossbeam_queue::ArrayQueue;
use fixbridge_core::message::Message;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Bounded pool of idle [`Message`] buffers.
#[derive(Debug)]
pub struct MessagePool {
    idle: ArrayQueue<Message>,
}

impl MessagePool {
    /// Creates a pool holding at most `capacity` idle buffers, with
    /// `preallocate` of them created up front.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize, preallocate: usize) -> Self {
        let idle = ArrayQueue::new(capacity.max(1));
        for _ in 0..preallocate.min(idle.capacity()) {
            let _ = idle.push(Message::new());
        }
        Self { idle }
    }

    /// Takes an idle buffer, or allocates one if the pool is empty.
    #[inline]
    #[must_use]
    pub fn acquire(&self) -> Message {
        self.idle.pop().unwrap_or_default()
    }

    /// Clears `message` and keeps it if there is room, otherwise drops it.
    #[inline]
    pub fn release(&self, mut message: Message) {
        message.clear();
        // A full pool hands the buffer back; dropping it is the overflow path.
        let _ = self.idle.push(message);
    }

    /// Takes a buffer that returns itself to the pool when dropped.
    #[must_use]
    pub fn checkout(self: &Arc<Self>) -> PooledMessage {
        PooledMessage {
            message: Some(self.acquire()),
            pool: Arc::clone(self),
        }
    }

    /// Returns the number of idle buffers.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.idle.len()
    }

    /// Returns the maximum number of idle buffers.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.idle.capacity()
    }
}

/// A pooled buffer checked out with [`MessagePool::checkout`].
#[derive(Debug)]
pub struct PooledMessage {
    message: Option<Message>,
    pool: Arc<MessagePool>,
}

impl PooledMessage {
    /// Detaches the buffer from the pool.
    #[must_use]
    pub fn into_inner(mut self) -> Message {
        self.message.take().unwrap_or_default()
    }
}

impl Deref for PooledMessage {
    type Target = Message;

    fn deref(&self) -> &Message {
        // Only `into_inner` and `drop` take the buffer, both consume the guard.
        self.message.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledMessage {
    fn deref_mut(&mut self) -> &mut Message {
        self.message.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledMessage {
    fn drop(&mut self) {
        if let Some(message) = self.message.take() {
            self.pool.release(message);
        }
    }
}
