/// A single user record, as the remote api describes it
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LookupUser {
    pub display_name: String,
    pub id: String,
}

/// Why a lookup never produced a response
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Io,
    Other(String),
}

impl FailureKind {
    /// Transport failures are the ones that count towards the cool-down
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Timeout | Self::Io)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LookupResult {
    Response { status: u16, users: Vec<LookupUser> },
    Failed(FailureKind),
}

impl LookupResult {
    pub fn ok(users: impl IntoIterator<Item = LookupUser>) -> Self {
        Self::Response {
            status: 200,
            users: users.into_iter().collect(),
        }
    }
}

/// Something that can turn a login name into a user record
#[async_trait::async_trait]
pub trait UserLookup: Send + Sync {
    async fn lookup(&self, login: &str) -> LookupResult;
}

#[async_trait::async_trait]
impl<T> UserLookup for std::sync::Arc<T>
where
    T: UserLookup + ?Sized,
{
    async fn lookup(&self, login: &str) -> LookupResult {
        (**self).lookup(login).await
    }
}
