use serde::{Deserialize, Serialize};

pub const PAGE_SIZE: usize = 4096;

// buffer pool frames
pub const DEFAULT_POOL_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub page_size: usize,
    pub pool_size: usize,
}

impl Config {
    pub fn with_page_size(self, page_size: usize) -> Self {
        Self { page_size, ..self }
    }

    pub fn with_pool_size(self, pool_size: usize) -> Self {
        Self { pool_size, ..self }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}
