use std::{collections::HashMap, fmt, rc::Rc};

use crate::schema::{CollectionTypeId, ModelTypeId};

/// Declared target of a relation, as written in a [`ModelType`](crate::ModelType).
///
/// `Deferred` descriptors are closures so that types may reference each other
/// in either declaration order. Both forms are resolved once, when the schema
/// is built.
#[derive(Clone)]
pub enum TypeDescriptor {
    Named(String),
    Deferred(Rc<dyn Fn() -> String>),
}

impl TypeDescriptor {
    pub fn named(name: impl Into<String>) -> Self {
        TypeDescriptor::Named(name.into())
    }

    pub fn deferred<F: Fn() -> String + 'static>(resolver: F) -> Self {
        TypeDescriptor::Deferred(Rc::new(resolver))
    }

    pub(crate) fn type_name(&self) -> String {
        match self {
            TypeDescriptor::Named(name) => name.clone(),
            TypeDescriptor::Deferred(resolver) => resolver(),
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Named(name) => write!(f, "Named({:?})", name),
            TypeDescriptor::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<&str> for TypeDescriptor {
    fn from(name: &str) -> Self {
        TypeDescriptor::named(name)
    }
}

impl From<String> for TypeDescriptor {
    fn from(name: String) -> Self {
        TypeDescriptor::Named(name)
    }
}

/// Resolved target of a relation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RelationTarget {
    ToOne(ModelTypeId),
    ToMany(CollectionTypeId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationKind {
    Reference,
    Embedding,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    pub key: String,
    pub kind: RelationKind,
    pub target: RelationTarget,
    /// Attribute mirroring the related id(s). References only.
    pub id_ref: Option<String>,
}

impl Relation {
    pub fn is_reference(&self) -> bool {
        self.kind == RelationKind::Reference
    }

    pub fn is_embedding(&self) -> bool {
        self.kind == RelationKind::Embedding
    }
}

/// How a key passed to `set` is routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KeyClass<'a> {
    Embedding(&'a Relation),
    Reference(&'a Relation),
    IdReference(&'a Relation),
    Plain,
}

/// Per-type lookup from relation keys and derived id keys to relations,
/// built once with the schema.
#[derive(Clone, Debug, Default)]
pub(crate) struct RelationIndex {
    relations: Vec<Relation>,
    by_key: HashMap<String, usize>,
    by_id_ref: HashMap<String, usize>,
}

impl RelationIndex {
    pub fn new(relations: Vec<Relation>) -> Self {
        let mut by_key = HashMap::new();
        let mut by_id_ref = HashMap::new();
        for (index, relation) in relations.iter().enumerate() {
            by_key.insert(relation.key.clone(), index);
            if let Some(id_ref) = &relation.id_ref {
                if id_ref != &relation.key {
                    by_id_ref.insert(id_ref.clone(), index);
                }
            }
        }
        Self {
            relations,
            by_key,
            by_id_ref,
        }
    }

    pub fn classify(&self, key: &str) -> KeyClass<'_> {
        if let Some(index) = self.by_key.get(key) {
            let relation = &self.relations[*index];
            return match relation.kind {
                RelationKind::Embedding => KeyClass::Embedding(relation),
                RelationKind::Reference => KeyClass::Reference(relation),
            };
        }
        if let Some(index) = self.by_id_ref.get(key) {
            return KeyClass::IdReference(&self.relations[*index]);
        }
        KeyClass::Plain
    }

    pub fn relation(&self, key: &str) -> Option<&Relation> {
        self.by_key.get(key).map(|index| &self.relations[*index])
    }

    /// Relation owning `key`, whether `key` is the relation key or its id key.
    pub fn canonical(&self, key: &str) -> Option<&Relation> {
        match self.classify(key) {
            KeyClass::Embedding(relation)
            | KeyClass::Reference(relation)
            | KeyClass::IdReference(relation) => Some(relation),
            KeyClass::Plain => None,
        }
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.iter()
    }

    pub fn embeddings(&self) -> impl Iterator<Item = &Relation> {
        self.relations.iter().filter(|relation| relation.is_embedding())
    }
}

pub(crate) fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `author` + `id` → `authorId`.
pub(crate) fn to_one_id_ref(key: &str, id_attribute: &str) -> String {
    format!("{}{}", key, capitalize(id_attribute))
}

/// `tags` + `id` → `tagIds`, `manyAs` → `manyAIds`.
pub(crate) fn to_many_id_ref(key: &str, id_attribute: &str) -> String {
    let stem = key.strip_suffix('s').unwrap_or(key);
    format!("{}{}s", stem, capitalize(id_attribute))
}
