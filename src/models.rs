pub mod discord;
pub mod quote;
