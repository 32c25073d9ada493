use crate::schema::relation::TypeDescriptor;

/// Declaration of a collection type holding models of one type.
#[derive(Clone, Debug)]
pub struct CollectionType {
    pub(crate) name: String,
    pub(crate) model: TypeDescriptor,
    pub(crate) url: Option<String>,
}

impl CollectionType {
    pub fn new(name: impl Into<String>, model: impl Into<TypeDescriptor>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            url: None,
        }
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
