use std::collections::HashMap;

/// Inline metadata that came along with a chat event (the IRCv3 tags on a message)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(HashMap<String, String>);

impl Tags {
    pub const DISPLAY_NAME: &'static str = "display-name";
    pub const USER_ID: &'static str = "user-id";

    /// Consumes a leading `@key=val;key=val ` from `input`
    pub fn parse(input: &mut &str) -> Option<Self> {
        if !input.starts_with('@') {
            return None;
        }

        let (head, tail) = input.split_once(' ')?;
        *input = tail;

        let inner = head[1..]
            .split_terminator(';')
            .flat_map(|tag| tag.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Some(Self(inner))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| &**v)
    }

    pub fn get_parsed<T>(&self, key: &str) -> Option<Result<T, T::Err>>
    where
        T: std::str::FromStr,
    {
        self.get(key).map(<str>::parse)
    }

    pub fn insert(&mut self, key: impl ToString, val: impl ToString) {
        self.0.insert(key.to_string(), val.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.get(Self::DISPLAY_NAME)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.get(Self::USER_ID)
    }
}

impl<K, V> FromIterator<(K, V)> for Tags
where
    K: ToString,
    V: ToString,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}
