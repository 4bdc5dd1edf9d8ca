//! Ring buffer helpers.

use core::num;

pub use rtrb;

/// A counter that tracks progress through fixed-size periods.
///
/// Each time the counter advances past a multiple of its period, a boundary
/// is considered crossed.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicCounter {
    period: num::NonZeroUsize,
    current: usize, // always less than self.period
}

impl PeriodicCounter {
    #[inline(always)]
    pub const fn new(period: num::NonZeroUsize) -> Self {
        Self { period, current: 0 }
    }

    #[inline(always)]
    pub const fn period(&self) -> num::NonZeroUsize {
        self.period
    }

    /// Advances the counter by `n` steps.
    ///
    /// Returns the number of period boundaries crossed.
    #[inline(always)]
    pub fn advance(&mut self, n: usize) -> usize {
        let p = self.period();
        let next = self.current.saturating_add(n);
        self.current = next % p;
        next / p
    }
}

/// Copies as many items as possible (at most `out.len()`) out of `rx`.
///
/// Returns the number of items copied.
#[inline]
pub fn consumer_read_into<T: Copy>(rx: &mut rtrb::Consumer<T>, out: &mut [T]) -> usize {
    let n = out.len().min(rx.slots());

    let Ok(chunk) = rx.read_chunk(n) else {
        return 0;
    };

    let (start, end) = chunk.as_slices();
    let (out_start, out_end) = out[..n].split_at_mut(start.len());
    out_start.copy_from_slice(start);
    out_end.copy_from_slice(end);

    chunk.commit_all();
    n
}

/// Copies as many items of `items` as fit into `tx`.
///
/// Returns the number of items copied, always a prefix of `items`.
#[inline]
pub fn producer_write_from<T: Copy>(tx: &mut rtrb::Producer<T>, items: &[T]) -> usize {
    let n = items.len().min(tx.slots());

    tx.write_chunk_uninit(n)
        .map_or(0, |chunk| chunk.fill_from_iter(items[..n].iter().copied()))
}

/// Discards everything currently readable from `rx`, returning how many items were dropped.
#[inline]
pub fn consumer_discard<T>(rx: &mut rtrb::Consumer<T>) -> usize {
    let n = rx.slots();
    rx.read_chunk(n).map_or(0, |chunk| {
        chunk.commit_all();
        n
    })
}
