//! 工具模块

pub mod ringbuf;

pub use ringbuf::RingBuffer;
