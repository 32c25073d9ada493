//! Type registry. Declarations are collected by a [`SchemaBuilder`] and
//! resolved in one pass by [`SchemaBuilder::build`]: every relation
//! descriptor becomes a [`RelationTarget`] and every model type gets a
//! precomputed key index.

mod collection_type;
mod error;
mod model_type;
mod relation;

use std::collections::HashMap;

use log::debug;

pub use collection_type::CollectionType;
pub use error::ConfigurationError;
pub use model_type::ModelType;
pub use relation::{Relation, RelationKind, RelationTarget, TypeDescriptor};

pub(crate) use relation::{KeyClass, RelationIndex};

use relation::{to_many_id_ref, to_one_id_ref};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModelTypeId(pub(crate) usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CollectionTypeId(pub(crate) usize);

pub(crate) struct ModelDef {
    pub decl: ModelType,
    pub index: RelationIndex,
}

pub(crate) struct CollectionDef {
    pub decl: CollectionType,
    pub item: ModelTypeId,
}

#[derive(Default)]
pub struct SchemaBuilder {
    models: Vec<ModelType>,
    collections: Vec<CollectionType>,
}

impl SchemaBuilder {
    pub fn model(mut self, model: ModelType) -> Self {
        self.models.push(model);
        self
    }

    pub fn collection(mut self, collection: CollectionType) -> Self {
        self.collections.push(collection);
        self
    }

    pub fn build(self) -> Result<Schema, ConfigurationError> {
        let mut names: HashMap<String, RelationTarget> = HashMap::new();
        for (index, model) in self.models.iter().enumerate() {
            register_name(&mut names, &model.name, RelationTarget::ToOne(ModelTypeId(index)))?;
        }
        for (index, collection) in self.collections.iter().enumerate() {
            register_name(
                &mut names,
                &collection.name,
                RelationTarget::ToMany(CollectionTypeId(index)),
            )?;
        }

        let mut collections = Vec::with_capacity(self.collections.len());
        for collection in self.collections {
            let item_name = collection.model.type_name();
            let item = match names.get(&item_name) {
                Some(RelationTarget::ToOne(model)) => *model,
                _ => {
                    return Err(ConfigurationError::InvalidCollectionItem {
                        collection: collection.name.clone(),
                        item: item_name,
                    })
                }
            };
            collections.push(CollectionDef {
                decl: collection,
                item,
            });
        }

        let mut indices = Vec::with_capacity(self.models.len());
        for model in &self.models {
            let mut relations = Vec::new();
            for (key, descriptor) in &model.embeddings {
                let target = resolve(&names, model, key, descriptor)?;
                relations.push(Relation {
                    key: key.clone(),
                    kind: RelationKind::Embedding,
                    target,
                    id_ref: None,
                });
            }
            for (key, descriptor) in &model.references {
                if model.embeddings.iter().any(|(embedded, _)| embedded == key) {
                    return Err(ConfigurationError::AmbiguousRelation {
                        owner: model.name.clone(),
                        key: key.clone(),
                    });
                }
                let target = resolve(&names, model, key, descriptor)?;
                let id_ref = match &model.id_ref_name {
                    Some(naming) => naming(key),
                    None => match target {
                        RelationTarget::ToOne(target_model) => {
                            to_one_id_ref(key, &self.models[target_model.0].id_attribute)
                        }
                        RelationTarget::ToMany(target_collection) => {
                            let item = collections[target_collection.0].item;
                            to_many_id_ref(key, &self.models[item.0].id_attribute)
                        }
                    },
                };
                relations.push(Relation {
                    key: key.clone(),
                    kind: RelationKind::Reference,
                    target,
                    id_ref: Some(id_ref),
                });
            }
            debug!("Schema: resolved {} relations for '{}'", relations.len(), model.name);
            indices.push(RelationIndex::new(relations));
        }

        let models = self
            .models
            .into_iter()
            .zip(indices)
            .map(|(decl, index)| ModelDef { decl, index })
            .collect();

        Ok(Schema {
            models,
            collections,
            names,
        })
    }
}

fn register_name(
    names: &mut HashMap<String, RelationTarget>,
    name: &str,
    target: RelationTarget,
) -> Result<(), ConfigurationError> {
    if names.insert(name.to_string(), target).is_some() {
        return Err(ConfigurationError::DuplicateType {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn resolve(
    names: &HashMap<String, RelationTarget>,
    owner: &ModelType,
    key: &str,
    descriptor: &TypeDescriptor,
) -> Result<RelationTarget, ConfigurationError> {
    let target = descriptor.type_name();
    names
        .get(&target)
        .copied()
        .ok_or_else(|| ConfigurationError::UnresolvedRelationTarget {
            owner: owner.name.clone(),
            key: key.to_string(),
            target,
        })
}

/// Resolved, immutable type registry shared by every node of a
/// [`Graph`](crate::Graph).
pub struct Schema {
    models: Vec<ModelDef>,
    collections: Vec<CollectionDef>,
    names: HashMap<String, RelationTarget>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn target(&self, name: &str) -> Option<RelationTarget> {
        self.names.get(name).copied()
    }

    pub fn model_type_id(&self, name: &str) -> Result<ModelTypeId, ConfigurationError> {
        match self.names.get(name) {
            Some(RelationTarget::ToOne(model)) => Ok(*model),
            _ => Err(ConfigurationError::UnknownType {
                name: name.to_string(),
            }),
        }
    }

    pub fn collection_type_id(&self, name: &str) -> Result<CollectionTypeId, ConfigurationError> {
        match self.names.get(name) {
            Some(RelationTarget::ToMany(collection)) => Ok(*collection),
            _ => Err(ConfigurationError::UnknownType {
                name: name.to_string(),
            }),
        }
    }

    /// Relations declared by a model type, embeddings first.
    pub fn relations(&self, model: ModelTypeId) -> impl Iterator<Item = &Relation> {
        self.models[model.0].index.relations()
    }

    pub fn model_name(&self, model: ModelTypeId) -> &str {
        &self.models[model.0].decl.name
    }

    pub fn collection_name(&self, collection: CollectionTypeId) -> &str {
        &self.collections[collection.0].decl.name
    }

    pub fn collection_item(&self, collection: CollectionTypeId) -> ModelTypeId {
        self.collections[collection.0].item
    }

    pub(crate) fn model(&self, model: ModelTypeId) -> &ModelDef {
        &self.models[model.0]
    }

    pub(crate) fn collection(&self, collection: CollectionTypeId) -> &CollectionDef {
        &self.collections[collection.0]
    }
}
