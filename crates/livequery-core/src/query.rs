//! Query descriptor - the subscription payload sent to the server

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Server-side query a subscription watches.
///
/// The `where` clause is carried as opaque JSON; the client never
/// interprets it, it only forwards it on subscribe and re-subscribe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    #[serde(rename = "className")]
    pub class_name: String,

    #[serde(rename = "where")]
    pub where_clause: Value,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fields: Option<Vec<String>>,
}

impl QueryDescriptor {
    /// Create a query matching every object of a class
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            where_clause: Value::Object(Map::new()),
            fields: None,
        }
    }

    /// Set the where clause
    pub fn with_where(mut self, where_clause: Value) -> Self {
        self.where_clause = where_clause;
        self
    }

    /// Restrict events to the given fields
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }
}
