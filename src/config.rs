use time::Duration;

/// Tuning for how the cache backs off from the remote api
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Backoff {
    /// How long a chain of failures is tracked, and how long the cool-down lasts
    pub window: Duration,
    /// Consecutive transport failures before the cool-down starts
    pub threshold: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            window: Duration::minutes(1),
            threshold: 5,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub const CLIENT_ID: &'static str = "TWITCH_CLIENT_ID";
    pub const CLIENT_SECRET: &'static str = "TWITCH_CLIENT_SECRET";

    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            client_id: get_var(Self::CLIENT_ID)?,
            client_secret: get_var(Self::CLIENT_SECRET)?,
        })
    }
}

fn get_var(key: &str) -> anyhow::Result<String> {
    std::env::var(key).map_err(|_| anyhow::anyhow!("could not find key '{key}' in env"))
}
