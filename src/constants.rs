use std::sync::LazyLock;

pub mod version;

pub static DISCORD_API_BASE: &str = "https://discord.com/api/v8";
pub static DISCORD_USER_AGENT: &str = concat!("DiscordBot (steno, ", env!("CARGO_PKG_VERSION"), ")");

/// Credential scheme accepted on inbound requests.
pub static AUTH_SCHEME: &str = "Bot";

pub static STARTUP_TIME: LazyLock<std::time::SystemTime> =
    LazyLock::new(std::time::SystemTime::now);
