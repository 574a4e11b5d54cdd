use std::collections::HashMap;

use bson::{Bson, Document};

/// Flattens a document into a key/value map. Later duplicate keys win.
pub fn into_map(doc: Document) -> HashMap<String, Bson> {
    doc.into_iter().collect()
}
