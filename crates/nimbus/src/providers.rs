pub mod base;
pub mod chat_completions;
pub mod configs;
pub mod factory;
pub mod utils;

#[cfg(test)]
pub mod mock;
