pub mod processor;

pub use processor::{hex_sha256, process, Processed, RawScrape};
