use crate::{transport::Method, types::OriginId};

/// Options of [`Graph::set`](crate::Graph::set).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Apply changes without firing any event.
    pub silent: bool,
    /// Remove the given keys instead of assigning them.
    pub unset: bool,
    /// Restore defaults for omitted keys and unset omitted keys without one.
    pub clear: bool,
    /// Run the target type's parse hook on nested JSON.
    pub parse: bool,
    /// Reset embedded collections instead of merging into them.
    pub reset: bool,
    /// Run the type's validation hook first.
    pub validate: bool,
    pub(crate) origin: Option<OriginId>,
    /// Collection members resolved under these options come from a fetch
    /// payload and count as synced.
    pub(crate) loaded: bool,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn unset(mut self) -> Self {
        self.unset = true;
        self
    }

    pub fn clear(mut self) -> Self {
        self.clear = true;
        self
    }

    pub fn parse(mut self) -> Self {
        self.parse = true;
        self
    }

    pub fn reset(mut self) -> Self {
        self.reset = true;
        self
    }

    pub fn validate(mut self) -> Self {
        self.validate = true;
        self
    }

    pub(crate) fn loaded(mut self) -> Self {
        self.loaded = true;
        self
    }

    /// Options for sets made on related nodes while handling this one.
    /// `clear` and `unset` apply to the outer call only.
    pub(crate) fn nested(&self, origin: OriginId) -> Self {
        Self {
            silent: self.silent,
            unset: false,
            clear: false,
            parse: self.parse,
            reset: self.reset,
            validate: false,
            origin: Some(origin),
            loaded: false,
        }
    }
}

/// Options of [`Graph::save`](crate::Graph::save).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SaveOptions {
    pub force_method: Option<Method>,
    /// Relation keys or dotted paths serialized inline in the body.
    pub inline_json: Vec<String>,
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.force_method = Some(method);
        self
    }

    pub fn inline<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inline_json = paths.into_iter().map(Into::into).collect();
        self
    }
}

/// Options of [`Graph::set_items`](crate::Graph::set_items).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollectionSetOptions {
    pub add: bool,
    pub remove: bool,
    pub merge: bool,
}

impl CollectionSetOptions {
    /// Replace membership, merging JSON into existing items.
    pub fn replace() -> Self {
        Self {
            add: true,
            remove: true,
            merge: true,
        }
    }

    /// Replace membership without touching existing items.
    pub fn replace_without_merge() -> Self {
        Self {
            add: true,
            remove: true,
            merge: false,
        }
    }

    pub fn add() -> Self {
        Self {
            add: true,
            remove: false,
            merge: true,
        }
    }
}

impl Default for CollectionSetOptions {
    fn default() -> Self {
        Self::replace()
    }
}
