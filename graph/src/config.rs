/// Which relation keys of a model get their unloaded targets queued for
/// fetching automatically.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AutoFetch {
    All,
    None,
    Keys(Vec<String>),
}

impl AutoFetch {
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AutoFetch::Keys(keys.into_iter().map(Into::into).collect())
    }

    pub fn allows(&self, key: &str) -> bool {
        match self {
            AutoFetch::All => true,
            AutoFetch::None => false,
            AutoFetch::Keys(keys) => keys.iter().any(|allowed| allowed == key),
        }
    }
}

impl From<bool> for AutoFetch {
    fn from(enabled: bool) -> Self {
        if enabled {
            AutoFetch::All
        } else {
            AutoFetch::None
        }
    }
}

/// Graph-wide settings. Per-type settings live on
/// [`ModelType`](crate::ModelType) and override these.
#[derive(Clone, Debug)]
pub struct GraphConfig {
    /// Auto-fetch policy for model types that do not declare their own.
    pub auto_fetch: AutoFetch,
    /// Percent-encode ids when appending them to a base URL.
    pub encode_ids: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            auto_fetch: AutoFetch::All,
            encode_ids: true,
        }
    }
}
