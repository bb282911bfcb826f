//! Name-dispatched factories for Things and Actions.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::io;

use super::error::ParseError;
use super::json::JsonConfig;
use crate::codec::{ByteReader, ByteWriter, CodecError};

/// A value that belongs to a closed, name-dispatched set of variants.
pub trait Variant {
    /// The variant's name (`type` for Things, `action` for Actions).
    fn variant(&self) -> &'static str;

    /// JSON fields of this value, without the discriminator.
    fn to_json(&self, config: &JsonConfig) -> Map<String, Value>;

    /// Binary body of this value, without the discriminator.
    fn compress(&self, writer: &mut ByteWriter);
}

/// Constructors for one variant.
pub struct Factory<T> {
    pub from_json: fn(&Map<String, Value>, &JsonConfig) -> Result<T, ParseError>,
    pub uncompress: fn(&mut ByteReader<'_>) -> Result<T, CodecError>,
}

impl<T> Clone for Factory<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Factory<T> {}

/// An explicit table of variant factories keyed by name.
///
/// Each schema builds one registry for its Things and one for its Actions
/// and hands them to whoever needs to parse. The `discriminator` is the
/// JSON field holding the variant name.
pub struct Registry<T> {
    discriminator: &'static str,
    factories: IndexMap<&'static str, Factory<T>>,
}

impl<T: Variant> Registry<T> {
    pub fn new(discriminator: &'static str) -> Self {
        Self {
            discriminator,
            factories: IndexMap::new(),
        }
    }

    /// Register a variant. A later registration under the same name wins.
    pub fn register(mut self, name: &'static str, factory: Factory<T>) -> Self {
        self.factories.insert(name, factory);
        self
    }

    pub fn discriminator(&self) -> &'static str {
        self.discriminator
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    fn factory(&self, name: &str) -> Option<&Factory<T>> {
        self.factories.get(name)
    }

    /// Parse one value from a JSON tree.
    pub fn parse(&self, value: &Value, config: &JsonConfig) -> Result<T, ParseError> {
        let object = value.as_object().ok_or(ParseError::NotAnObject)?;
        let name = object
            .get(self.discriminator)
            .and_then(Value::as_str)
            .ok_or(ParseError::MissingDiscriminator {
                key: self.discriminator,
            })?;
        let name = config.resolve(name);
        let factory = self.factory(name).ok_or_else(|| ParseError::Unknown {
            key: self.discriminator,
            name: name.to_owned(),
        })?;
        (factory.from_json)(object, config)
    }

    /// Parse one value from JSON text.
    pub fn parse_str(&self, json: &str, config: &JsonConfig) -> Result<T, ParseError> {
        let value: Value = serde_json::from_str(json)?;
        self.parse(&value, config)
    }

    /// Parse a stream of concatenated or whitespace-separated JSON values.
    ///
    /// Values are tokenized incrementally from `reader`; each item is parsed
    /// as soon as it is complete.
    pub fn parse_stream<'a, R>(
        &'a self,
        reader: R,
        config: &'a JsonConfig,
    ) -> impl Iterator<Item = Result<T, ParseError>> + 'a
    where
        R: io::Read + 'a,
    {
        serde_json::Deserializer::from_reader(reader)
            .into_iter::<Value>()
            .map(move |value| self.parse(&value?, config))
    }

    /// Serialize to a JSON tree, discriminator included.
    pub fn to_json(&self, value: &T, config: &JsonConfig) -> Value {
        let mut object = Map::new();
        object.insert(
            self.discriminator.to_owned(),
            Value::String(value.variant().to_owned()),
        );
        object.extend(value.to_json(config));
        Value::Object(object)
    }

    /// Write the variant name followed by the value's body.
    pub fn write(&self, value: &T, writer: &mut ByteWriter) {
        writer.write_string(value.variant());
        value.compress(writer);
    }

    /// Read a value written by [`write`](Self::write).
    pub fn read(&self, reader: &mut ByteReader<'_>) -> Result<T, CodecError> {
        let name = reader.read_string()?;
        let factory = self
            .factory(&name)
            .ok_or(CodecError::UnknownType { tag: name.clone() })?;
        (factory.uncompress)(reader)
    }

    /// Encode a single value to bytes.
    pub fn compress(&self, value: &T) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        self.write(value, &mut writer);
        writer.into_bytes()
    }

    /// Decode a single value from bytes.
    pub fn uncompress(&self, bytes: &[u8]) -> Result<T, CodecError> {
        self.read(&mut ByteReader::new(bytes))
    }
}
