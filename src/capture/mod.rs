pub mod aggregator;
pub mod buffer;
pub mod classifier;
pub mod dns;
pub mod manager;
pub mod parser;
pub mod selector;
pub mod source;
pub mod worker;

#[cfg(test)]
pub mod testing;
