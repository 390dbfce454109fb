mod buffer;

pub use buffer::CircularBuffer;
