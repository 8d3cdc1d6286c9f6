//! Tagged allocation accounting for the game heap.

use std::fmt::Display;

/// Colour tag the filesystem table is allocated with.
pub const FST_TAG: u32 = 0x7F7F_7FFF;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HeapError {
    #[error("out of memory: requested {requested:#x} bytes with tag {tag:#010x}, {free:#x} free")]
    OutOfMemory { requested: usize, tag: u32, free: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub size: usize,
    pub tag: u32,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub capacity: usize,
    pub used: usize,
    pub blocks: usize,
}

impl HeapStats {
    pub fn free(&self) -> usize {
        self.capacity - self.used
    }
}

impl Display for HeapStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:#x}/{:#x} bytes in {} blocks",
            self.used, self.capacity, self.blocks
        )
    }
}

#[derive(Debug)]
pub struct Heap {
    capacity: usize,
    used: usize,
    blocks: Vec<Block>,
}

impl Heap {
    pub fn new(capacity: usize) -> Heap {
        Heap {
            capacity,
            used: 0,
            blocks: Vec::new(),
        }
    }

    /// Allocates a zeroed buffer of exactly `size` bytes.
    pub fn malloc(
        &mut self,
        size: usize,
        tag: u32,
        name: Option<&str>,
    ) -> Result<Vec<u8>, HeapError> {
        let free = self.stats().free();

        if size > free {
            return Err(HeapError::OutOfMemory {
                requested: size,
                tag,
                free,
            });
        }

        self.used += size;
        self.blocks.push(Block {
            size,
            tag,
            name: name.map(str::to_string),
        });

        Ok(vec![0; size])
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Reports current usage for the debug heap inspector.
    pub fn stats(&self) -> HeapStats {
        HeapStats {
            capacity: self.capacity,
            used: self.used,
            blocks: self.blocks.len(),
        }
    }
}
