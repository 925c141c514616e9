//! A single physical block: `pages_per_block` pages of opaque payload data.
//! Blocks materialize lazily in a Plane's sparse map on first write and are
//! dropped on erase.

use crate::transaction::Payload;

#[derive(Debug, Clone)]
pub struct Block {
    pub id: u32,
    pages: Vec<Payload>,
}

impl Block {
    pub fn new(id: u32, pages_per_block: u32) -> Self {
        Block {
            id,
            pages: vec![0; pages_per_block as usize],
        }
    }

    pub fn read(&self, page: u32) -> Payload {
        self.pages[page as usize]
    }

    pub fn write(&mut self, page: u32, payload: Payload) {
        self.pages[page as usize] = payload;
    }
}
