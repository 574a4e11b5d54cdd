//! UUIDs stored as BSON binary subtype 4
//!
//! Use the serde helpers on entity fields:
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct Device {
//!     #[serde(with = "mongorepo::codec::uuid_as_binary")]
//!     serial: Uuid,
//!     #[serde(with = "mongorepo::codec::option_uuid_as_binary", default)]
//!     parent: Option<Uuid>,
//! }
//! ```

use bson::{spec::BinarySubtype, Binary, Bson};
use uuid::Uuid;

use crate::{RepoError, Result};

/// `uuid` as a subtype 4 binary value
pub fn encode_uuid(uuid: Uuid) -> Bson {
    Bson::Binary(Binary {
        subtype: BinarySubtype::Uuid,
        bytes: uuid.as_bytes().to_vec(),
    })
}

/// Read a UUID from a subtype 4 binary value.
pub fn decode_uuid(value: Bson) -> Result<Uuid> {
    match value {
        Bson::Binary(Binary {
            subtype: BinarySubtype::Uuid,
            bytes,
        }) => Uuid::from_slice(&bytes)
            .map_err(|e| RepoError::Deserialization(format!("invalid UUID bytes: {}", e))),
        Bson::Binary(binary) => Err(RepoError::Deserialization(format!(
            "unsupported binary subtype {:?} for UUID",
            binary.subtype
        ))),
        other => Err(RepoError::Deserialization(format!(
            "cannot decode {:?} into a UUID",
            other.element_type()
        ))),
    }
}

/// `#[serde(with = "...")]` helper for `Uuid` fields
pub mod uuid_as_binary {
    use bson::Bson;
    use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
    use uuid::Uuid;

    pub fn serialize<S: Serializer>(uuid: &Uuid, serializer: S) -> Result<S::Ok, S::Error> {
        super::encode_uuid(*uuid).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Uuid, D::Error> {
        let value = Bson::deserialize(deserializer)?;
        super::decode_uuid(value).map_err(D::Error::custom)
    }
}

/// `#[serde(with = "...")]` helper for `Option<Uuid>` fields; null and
/// undefined read as `None`
pub mod option_uuid_as_binary {
    use bson::Bson;
    use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
    use uuid::Uuid;

    pub fn serialize<S: Serializer>(uuid: &Option<Uuid>, serializer: S) -> Result<S::Ok, S::Error> {
        match uuid {
            Some(uuid) => super::encode_uuid(*uuid).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Uuid>, D::Error> {
        match Bson::deserialize(deserializer)? {
            Bson::Null | Bson::Undefined => Ok(None),
            value => super::decode_uuid(value).map(Some).map_err(D::Error::custom),
        }
    }
}
