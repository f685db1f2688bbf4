use serde::{Deserialize, Serialize};

pub mod render_job;

/// A record kept in its own SurrealDB table.
pub trait StoredObject: Serialize + for<'de> Deserialize<'de> {
    fn table_name() -> &'static str;
    fn get_id(&self) -> &str;
}

/// Serde adapters between the record structs and SurrealDB's native id and datetime types.
pub mod surreal_serde {
    use std::fmt;

    use chrono::{DateTime, Utc};
    use serde::{
        de::{self, Visitor},
        Deserialize, Deserializer, Serialize, Serializer,
    };
    use surrealdb::sql::{Datetime, Thing};

    struct RecordIdVisitor;

    impl<'de> Visitor<'de> for RecordIdVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a record id string or a Thing")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            Ok(value.to_string())
        }

        fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
            Ok(value)
        }

        fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
        where
            A: de::MapAccess<'de>,
        {
            let thing = Thing::deserialize(de::value::MapAccessDeserializer::new(map))?;
            Ok(thing.id.to_raw())
        }
    }

    /// Accepts `table:id` things as returned by queries and bare ids as written by us.
    pub fn deserialize_record_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        deserializer.deserialize_any(RecordIdVisitor)
    }

    pub fn serialize_datetime<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        Datetime::from(*date).serialize(serializer)
    }

    pub fn deserialize_datetime<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        Datetime::deserialize(deserializer).map(DateTime::<Utc>::from)
    }

    pub fn serialize_option_datetime<S: Serializer>(
        date: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(dt) => serializer.serialize_some(&Datetime::from(*dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize_option_datetime<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<Datetime>::deserialize(deserializer).map(|value| value.map(DateTime::<Utc>::from))
    }
}

/// Declares a record struct with `id`, `created_at` and `updated_at` plus the given fields.
///
/// The serde helpers are imported into the calling module so field attributes can name
/// them directly, e.g. `serialize_with = "serialize_option_datetime"`.
#[macro_export]
macro_rules! stored_object {
    ($name:ident, $table:expr, {$($(#[$attr:meta])* $field:ident: $ty:ty),*}) => {
        #[allow(unused_imports)]
        use $crate::storage::types::surreal_serde::{
            deserialize_datetime, deserialize_option_datetime, deserialize_record_id,
            serialize_datetime, serialize_option_datetime,
        };
        use $crate::storage::types::StoredObject;
        use chrono::{DateTime, Utc};

        #[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
        pub struct $name {
            #[serde(deserialize_with = "deserialize_record_id")]
            pub id: String,
            #[serde(serialize_with = "serialize_datetime", deserialize_with = "deserialize_datetime", default)]
            pub created_at: DateTime<Utc>,
            #[serde(serialize_with = "serialize_datetime", deserialize_with = "deserialize_datetime", default)]
            pub updated_at: DateTime<Utc>,
            $( $(#[$attr])* pub $field: $ty),*
        }

        impl StoredObject for $name {
            fn table_name() -> &'static str {
                $table
            }

            fn get_id(&self) -> &str {
                &self.id
            }
        }
    };
}
