//! Chunk reassembly for multi-part position pushes.

mod chunk_buffer;


pub use chunk_buffer::ChunkBuffer;
