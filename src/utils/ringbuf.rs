use std::collections::VecDeque;

/// 定长环形缓冲，满了以后新元素覆盖最旧的元素
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T: Copy> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        RingBuffer {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push_overwrite(&mut self, item: T) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(item);
    }

    /// 取出最旧的元素
    pub fn pop(&mut self) -> Option<T> {
        self.buf.pop_front()
    }

    /// 按从旧到新的顺序取出全部元素
    pub fn drain(&mut self) -> Vec<T> {
        self.buf.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buf.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let rb: RingBuffer<u8> = RingBuffer::new(10);
        assert_eq!(rb.capacity(), 10);
        assert!(rb.is_empty());
        assert!(!rb.is_full());
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut rb = RingBuffer::new(0);
        rb.push_overwrite(1);
        rb.push_overwrite(2);
        assert_eq!(rb.drain(), vec![2]);
    }

    #[test]
    fn test_push_overwrite() {
        let mut rb = RingBuffer::new(3);
        rb.push_overwrite(1);
        rb.push_overwrite(2);
        rb.push_overwrite(3);
        assert!(rb.is_full());
        rb.push_overwrite(4);
        assert_eq!(rb.len(), 3);
        assert_eq!(rb.pop(), Some(2));
        assert_eq!(rb.iter().copied().collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn test_drain_empties() {
        let mut rb = RingBuffer::new(4);
        rb.push_overwrite('a');
        rb.push_overwrite('b');
        assert_eq!(rb.drain(), vec!['a', 'b']);
        assert!(rb.is_empty());
        assert_eq!(rb.pop(), None);
    }
}
