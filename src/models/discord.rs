use serde::{Deserialize, Serialize};

/// A guild as returned by `GET /users/@me/guilds`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PartialGuild {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub icon: Option<String>,

    #[serde(default)]
    pub owner: bool,

    #[serde(default)]
    pub permissions: Option<String>,
}
