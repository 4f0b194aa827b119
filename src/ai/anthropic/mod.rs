pub mod client;
pub mod messages;
pub mod types;

pub use messages::AnthropicProvider;
