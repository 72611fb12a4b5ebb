use std::collections::HashMap;

/// The record a visibility rule is evaluated against: flat field values plus
/// an optional record type id.
#[derive(Debug, Clone, Default)]
pub struct Context {
    fields: HashMap<String, String>,
    record_type_id: Option<String>,
}

impl Context {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field value.
    #[must_use]
    pub fn set(mut self, field: &str, value: &str) -> Self {
        self.insert(field, value);
        self
    }

    /// Insert a field value (mutable reference version).
    pub fn insert(&mut self, field: &str, value: &str) {
        self.fields.insert(field.to_owned(), value.to_owned());
    }

    /// Set the record type id.
    #[must_use]
    pub fn record_type(mut self, record_type_id: &str) -> Self {
        self.record_type_id = Some(record_type_id.to_owned());
        self
    }

    /// Look up a field value. Returns `None` if the field was never set.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn record_type_id(&self) -> Option<&str> {
        self.record_type_id.as_deref()
    }
}
