use core::{
    cell::UnsafeCell,
    mem::MaybeUninit,
    sync::atomic::{
        AtomicBool, AtomicUsize,
        Ordering::{Acquire, Relaxed, Release},
    },
};

// Push at HEAD, pop at TAIL. Both indices stay in 0..N; one slot is always left
// empty so that `head == tail` means empty and `head + 1 == tail` means full.
pub struct Ringbuf<T, const N: usize> {
    is_split: AtomicBool,
    head: AtomicUsize,
    tail: AtomicUsize,
    buf: [UnsafeCell<MaybeUninit<T>>; N],
}

// SAFETY: The safety guarantees within later unsafe blocks in this implementation
// allow us to safely share the UnsafeCells over thread boundaries.
unsafe impl<T: Send, const N: usize> Sync for Ringbuf<T, N> {}

impl<T: Copy, const N: usize> Default for Ringbuf<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

const fn wrap<const N: usize>(i: usize) -> usize {
    if i + 1 == N {
        0
    } else {
        i + 1
    }
}

impl<T: Copy, const N: usize> Ringbuf<T, N> {
    pub const fn new() -> Self {
        assert!(N >= 2, "a ring buffer needs at least two slots");
        Self {
            is_split: AtomicBool::new(false),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            // SAFETY: This array only contains MaybeUninits, which are sound to
            // have hold an uninit value
            #[allow(clippy::uninit_assumed_init)]
            buf: unsafe { MaybeUninit::uninit().assume_init() },
        }
    }

    /// ## Safety
    /// Must only be called once, as only one Producer and Consumer may
    /// exist per Ringbuf.
    pub unsafe fn split(&self) -> (Producer<'_, T, N>, Consumer<'_, T, N>) {
        self.is_split.store(true, Relaxed);
        (Producer(self), Consumer(self))
    }

    pub fn try_split(&self) -> Option<(Producer<'_, T, N>, Consumer<'_, T, N>)> {
        if self.is_split.fetch_or(true, Relaxed) {
            None
        } else {
            // SAFETY: We have just checked to ensure that this Ringbuf has not
            // been split.
            Some(unsafe { self.split() })
        }
    }

    fn is_empty(&self) -> bool {
        self.head.load(Acquire) == self.tail.load(Acquire)
    }

    fn is_full(&self) -> bool {
        wrap::<N>(self.head.load(Acquire)) == self.tail.load(Acquire)
    }

    fn len(&self) -> usize {
        let head = self.head.load(Acquire);
        let tail = self.tail.load(Acquire);
        if head >= tail {
            head - tail
        } else {
            N - tail + head
        }
    }

    /// SAFETY: `idx` must lie between the tail and the head, so the slot was
    /// published by the producer and has not been released by the consumer.
    unsafe fn read_slot(&self, idx: usize) -> T {
        self.buf[idx].get().read().assume_init()
    }
}

pub struct Consumer<'a, T, const N: usize>(&'a Ringbuf<T, N>);

impl<'a, T: Copy, const N: usize> Consumer<'a, T, N> {
    pub fn try_read(&mut self) -> Option<T> {
        if self.0.is_empty() {
            return None;
        }
        let tail = self.0.tail.load(Relaxed);
        // SAFETY: The buffer is not empty, and could not have become empty since
        // we checked it because only one Consumer may exist.
        let val = unsafe { self.0.read_slot(tail) };
        self.0.tail.store(wrap::<N>(tail), Release);
        Some(val)
    }

    /// Read ahead without releasing anything to the producer. Nothing is
    /// consumed until [`Peek::commit`] is called.
    pub fn peek(&mut self) -> Peek<'_, T, N> {
        Peek {
            rb: self.0,
            pos: self.0.tail.load(Relaxed),
        }
    }

    /// Current read index, mostly useful for diagnostics.
    pub fn cursor(&self) -> usize {
        self.0.tail.load(Relaxed)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub struct Peek<'c, T, const N: usize> {
    rb: &'c Ringbuf<T, N>,
    pos: usize,
}

impl<T: Copy, const N: usize> Peek<'_, T, N> {
    /// Release everything read so far back to the producer.
    pub fn commit(&self) {
        self.rb.tail.store(self.pos, Release);
    }
}

impl<T: Copy, const N: usize> Iterator for Peek<'_, T, N> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        // Reload the head every step so bytes written mid-drain are seen
        if self.pos == self.rb.head.load(Acquire) {
            return None;
        }
        // SAFETY: pos trails the head and leads the committed tail, and the
        // producer never writes into that range while it is unreleased.
        let val = unsafe { self.rb.read_slot(self.pos) };
        self.pos = wrap::<N>(self.pos);
        Some(val)
    }
}

pub struct Producer<'a, T, const N: usize>(&'a Ringbuf<T, N>);

impl<'a, T: Copy, const N: usize> Producer<'a, T, N> {
    pub fn try_write(&self, val: T) -> Result<(), T> {
        if self.0.is_full() {
            return Err(val);
        }
        let head = self.0.head.load(Relaxed);
        // First write the value into the empty cell
        // SAFETY: The buffer is not full, and could not have become full since
        // we checked it because only one Producer may exist.
        unsafe {
            (*self.0.buf[head].get()).write(val);
        }
        // Then publish it by moving the head index
        self.0.head.store(wrap::<N>(head), Release);
        Ok(())
    }

    pub fn try_write_iter(&self, iter: &mut impl Iterator<Item = T>) -> (Result<(), T>, usize) {
        let mut count = 0_usize; // can't enumerate cause we don't own the iterator
        for val in iter {
            if let Err(val) = self.try_write(val) {
                return (Err(val), count);
            }
            count += 1;
        }
        (Ok(()), count)
    }

    pub fn is_full(&self) -> bool {
        self.0.is_full()
    }
}
