//! Fixed-capacity circular buffer for rolling estimator windows

use crate::error::{PpgError, PpgResult};
use num_traits::Float;

/// Circular buffer that keeps the last `capacity` values in insertion order.
///
/// Pushing into a full window overwrites the oldest entry.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    buffer: Vec<T>,
    capacity: usize,
    // Index of the oldest entry once the window is full
    head: usize,
}

impl<T: Copy> RollingWindow<T> {
    /// Create a window holding at most `capacity` entries
    pub fn new(capacity: usize) -> PpgResult<Self> {
        if capacity == 0 {
            return Err(PpgError::InvalidCapacity {
                buffer: "rolling window",
                requested: capacity,
            });
        }

        Ok(Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        })
    }

    /// Insert a value, returning the evicted oldest value when full
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.buffer.len() < self.capacity {
            self.buffer.push(value);
            None
        } else {
            let evicted = std::mem::replace(&mut self.buffer[self.head], value);
            self.head = (self.head + 1) % self.capacity;
            Some(evicted)
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        let (newer, older) = self.buffer.split_at(self.head);
        older.iter().chain(newer.iter()).copied()
    }

    /// Drop all entries, keeping the allocation
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.head = 0;
    }

    /// Copy the contents out, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}

impl<T: Float> RollingWindow<T> {
    /// Arithmetic mean of the current entries
    pub fn mean(&self) -> Option<T> {
        if self.buffer.is_empty() {
            return None;
        }
        let sum = self.buffer.iter().fold(T::zero(), |acc, &v| acc + v);
        T::from(self.buffer.len()).map(|n| sum / n)
    }

    /// Population standard deviation of the current entries
    pub fn std_dev(&self) -> Option<T> {
        let mean = self.mean()?;
        let sum_sq = self
            .buffer
            .iter()
            .fold(T::zero(), |acc, &v| acc + (v - mean) * (v - mean));
        T::from(self.buffer.len()).map(|n| (sum_sq / n).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(RollingWindow::<f32>::new(0).is_err());
    }

    #[test]
    fn test_fill_below_capacity() {
        let mut window = RollingWindow::new(4).unwrap();
        assert!(window.is_empty());

        window.push(1.0f32);
        window.push(2.0);

        assert_eq!(window.len(), 2);
        assert_eq!(window.to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut window = RollingWindow::new(3).unwrap();
        for value in [10u32, 20, 30] {
            assert_eq!(window.push(value), None);
        }

        // capacity + 1 entries: exactly the oldest goes
        assert_eq!(window.push(40), Some(10));
        assert_eq!(window.to_vec(), vec![20, 30, 40]);

        assert_eq!(window.push(50), Some(20));
        assert_eq!(window.push(60), Some(30));
        assert_eq!(window.push(70), Some(40));
        assert_eq!(window.to_vec(), vec![50, 60, 70]);
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_statistics() {
        let mut window = RollingWindow::new(4).unwrap();
        assert_eq!(window.mean(), None);

        for value in [2.0f64, 4.0, 4.0, 6.0] {
            window.push(value);
        }
        assert!((window.mean().unwrap() - 4.0).abs() < 1e-12);
        assert!((window.std_dev().unwrap() - 2.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_clear_resets_order() {
        let mut window = RollingWindow::new(2).unwrap();
        window.push(1);
        window.push(2);
        window.push(3);
        window.clear();

        assert!(window.is_empty());
        window.push(9);
        assert_eq!(window.to_vec(), vec![9]);
    }
}
