/// `Port` models one end of a single-slot valid/ready channel between the switching core and a
/// port adapter.  The producer holds the `OutputPort` end, the consumer the `InputPort` end.
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default, Clone, Copy)]
pub struct InputPort;

#[derive(Debug, Default, Clone, Copy)]
pub struct OutputPort;

#[derive(Debug, Default)]
struct Channel<T: Clone> {
    valid: bool,
    data: T,
}

/// Wrapper type of a reference to a channel.  Newtype is necessary to implement get/put methods at
/// the reference type.
#[derive(Debug)]
pub struct ChannelRef<T: Clone>(Arc<RwLock<Channel<T>>>);

impl<T: Clone> Clone for ChannelRef<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

#[derive(Debug)]
pub struct Port<D, T: Clone> {
    // RwLock is necessary because the adapter on the other end may live on another thread and has
    // no knowledge of when the core will access the channel.
    chan: ChannelRef<T>,
    direction: PhantomData<D>,
}

impl<D, T: Clone> Clone for Port<D, T> {
    fn clone(&self) -> Self {
        Self {
            chan: self.chan.clone(),
            direction: PhantomData,
        }
    }
}

impl<D, T: Clone> Port<D, T> {
    pub fn valid(&self) -> bool {
        self.chan.valid()
    }
}

impl<T: Clone> Port<OutputPort, T> {
    pub fn blocked(&self) -> bool {
        self.valid()
    }

    /// Offer a value to the consumer.  Returns false if the previous value was not taken yet.
    pub fn put(&self, data: &T) -> bool {
        self.chan.put(data)
    }
}

impl<T: Clone> Port<InputPort, T> {
    pub fn peek(&self) -> Option<T> {
        self.chan.peek()
    }

    /// Complete the handshake on the offered value, freeing the slot for the producer.
    pub fn get(&self) -> Option<T> {
        self.chan.get()
    }
}

impl<T: Clone> ChannelRef<T> {
    pub fn valid(&self) -> bool {
        self.0.read().expect("rw lock poisoned").valid
    }

    pub fn peek(&self) -> Option<T> {
        let channel = self.0.read().expect("rw lock poisoned");
        channel.valid.then(|| channel.data.clone())
    }

    /// Put a value onto the channel.
    /// Returns true if the channel was ready and the data was successfully put.
    pub fn put(&self, data: &T) -> bool {
        let mut channel = self.0.write().expect("rw lock poisoned");
        if channel.valid {
            return false;
        }
        channel.valid = true;
        channel.data = data.clone();
        true
    }

    /// Get a value from the channel, invalidating it.
    /// Returns Some if the channel had a valid data, or None otherwise.
    pub fn get(&self) -> Option<T> {
        let mut channel = self.0.write().expect("rw lock poisoned");
        match channel.valid {
            false => None,
            true => {
                channel.valid = false;
                Some(channel.data.clone())
            }
        }
    }
}

/// Create a linked pair of ports sharing one channel slot.
pub fn link<T: Default + Clone>() -> (Port<OutputPort, T>, Port<InputPort, T>) {
    let chan = ChannelRef(Arc::new(RwLock::new(Channel::<T> {
        valid: false,
        data: T::default(),
    })));
    let tx = Port {
        chan: chan.clone(),
        direction: PhantomData,
    };
    let rx = Port {
        chan,
        direction: PhantomData,
    };
    (tx, rx)
}

/// Readiness signal raised by a port adapter once its side of the port is usable.
#[derive(Debug, Clone, Default)]
pub struct ReadyFlag(Arc<AtomicBool>);

impl ReadyFlag {
    pub fn signal(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}
