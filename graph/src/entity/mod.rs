mod attrs;
mod entity_id;
mod node;

pub use attrs::{AttrValue, Attrs};
pub use entity_id::EntityId;
pub use node::{Ownership, Slot};

pub(crate) use node::{CollectionNode, ModelNode, Node};
