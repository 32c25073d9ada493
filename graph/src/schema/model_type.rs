use std::rc::Rc;

use serde_json::{Map, Value};

use crate::{config::AutoFetch, schema::relation::TypeDescriptor};

pub(crate) type ParseFn = Rc<dyn Fn(Value) -> Value>;
pub(crate) type ValidateFn = Rc<dyn Fn(&Map<String, Value>) -> Result<(), String>>;
pub(crate) type IdRefNameFn = Rc<dyn Fn(&str) -> String>;

/// Declaration of a model type: its relations and the per-type hooks.
///
/// ```
/// use relgraph::ModelType;
/// use serde_json::json;
///
/// let post = ModelType::new("Post")
///     .url_root("/posts")
///     .reference("author", "User")
///     .reference("tags", "Tags")
///     .embedding("body", "Body")
///     .defaults(json!({ "title": "" }));
/// # let _ = post;
/// ```
#[derive(Clone)]
pub struct ModelType {
    pub(crate) name: String,
    pub(crate) id_attribute: String,
    pub(crate) references: Vec<(String, TypeDescriptor)>,
    pub(crate) embeddings: Vec<(String, TypeDescriptor)>,
    pub(crate) defaults: Map<String, Value>,
    pub(crate) inline_json: Vec<String>,
    pub(crate) auto_fetch: Option<AutoFetch>,
    pub(crate) url_root: Option<String>,
    pub(crate) id_ref_name: Option<IdRefNameFn>,
    pub(crate) parse: Option<ParseFn>,
    pub(crate) validate: Option<ValidateFn>,
}

impl ModelType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_attribute: "id".to_string(),
            references: Vec::new(),
            embeddings: Vec::new(),
            defaults: Map::new(),
            inline_json: Vec::new(),
            auto_fetch: None,
            url_root: None,
            id_ref_name: None,
            parse: None,
            validate: None,
        }
    }

    pub fn id_attribute(mut self, id_attribute: impl Into<String>) -> Self {
        self.id_attribute = id_attribute.into();
        self
    }

    pub fn reference(mut self, key: impl Into<String>, target: impl Into<TypeDescriptor>) -> Self {
        self.references.push((key.into(), target.into()));
        self
    }

    pub fn embedding(mut self, key: impl Into<String>, target: impl Into<TypeDescriptor>) -> Self {
        self.embeddings.push((key.into(), target.into()));
        self
    }

    /// Defaults applied on construction and restored by `clear`. Values must
    /// form a JSON object; relation defaults are plain JSON and get
    /// instantiated like any other input.
    pub fn defaults(mut self, defaults: Value) -> Self {
        if let Value::Object(map) = defaults {
            self.defaults = map;
        }
        self
    }

    /// Relation keys or dotted paths serialized inline by `to_json`.
    pub fn inline_json<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inline_json = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn auto_fetch(mut self, policy: impl Into<AutoFetch>) -> Self {
        self.auto_fetch = Some(policy.into());
        self
    }

    pub fn url_root(mut self, url_root: impl Into<String>) -> Self {
        self.url_root = Some(url_root.into());
        self
    }

    /// Overrides the name of the attribute mirroring a reference's id(s).
    /// Returning the relation key itself keeps the id under the same key.
    pub fn reference_attribute_name<F>(mut self, naming: F) -> Self
    where
        F: Fn(&str) -> String + 'static,
    {
        self.id_ref_name = Some(Rc::new(naming));
        self
    }

    /// Transforms raw server payloads before they are applied.
    pub fn parse<F>(mut self, parse: F) -> Self
    where
        F: Fn(Value) -> Value + 'static,
    {
        self.parse = Some(Rc::new(parse));
        self
    }

    /// Validation run by `set` when requested through
    /// [`SetOptions::validate`](crate::SetOptions::validate).
    pub fn validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<(), String> + 'static,
    {
        self.validate = Some(Rc::new(validate));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
