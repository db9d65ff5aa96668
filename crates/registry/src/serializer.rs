//! Serializers, and the registry binding them to message types.
//!
//! A serializer writes only the payload; the envelope's id byte is someone else's problem.  Decoding must consume
//! exactly the bytes encoding produced, since there's no length prefix to fall back on.
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Buf;

use crate::ConfigError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SerializerError {
    #[error("Needed {needed} bytes but only {remaining} remain")]
    NotEnoughData { needed: usize, remaining: usize },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Check that a hand-written decoder can read `needed` more bytes.
///
/// The `get_*` methods of [bytes::Buf] panic on short input, so decoders call this first.
pub fn ensure_remaining(source: &impl Buf, needed: usize) -> Result<(), SerializerError> {
    if source.remaining() < needed {
        return Err(SerializerError::NotEnoughData {
            needed,
            remaining: source.remaining(),
        });
    }
    Ok(())
}

/// Encodes and decodes the payload of one message type.
pub trait Serializer<M>: Send + Sync + 'static {
    fn encode(&self, message: &M, dest: &mut Vec<u8>) -> Result<(), SerializerError>;

    /// Decode a message, advancing `source` past exactly the bytes consumed.
    fn decode(&self, source: &mut &[u8]) -> Result<M, SerializerError>;
}

pub type EncodeFn<M> = fn(&M, &mut Vec<u8>) -> Result<(), SerializerError>;
pub type DecodeFn<M> = fn(&mut &[u8]) -> Result<M, SerializerError>;

/// A serializer made of a plain (encode, decode) function pair.
pub struct FnSerializer<M> {
    encode: EncodeFn<M>,
    decode: DecodeFn<M>,
}

impl<M> FnSerializer<M> {
    pub fn new(encode: EncodeFn<M>, decode: DecodeFn<M>) -> Self {
        FnSerializer { encode, decode }
    }
}

impl<M: 'static> Serializer<M> for FnSerializer<M> {
    fn encode(&self, message: &M, dest: &mut Vec<u8>) -> Result<(), SerializerError> {
        (self.encode)(message, dest)
    }

    fn decode(&self, source: &mut &[u8]) -> Result<M, SerializerError> {
        (self.decode)(source)
    }
}

/// Serializes any serde type with bincode's default (fixed-int, little endian) encoding.
pub struct BincodeSerializer<M>(PhantomData<fn() -> M>);

impl<M> Default for BincodeSerializer<M> {
    fn default() -> Self {
        BincodeSerializer(PhantomData)
    }
}

impl<M> Serializer<M> for BincodeSerializer<M>
where
    M: serde::Serialize + serde::de::DeserializeOwned + 'static,
{
    fn encode(&self, message: &M, dest: &mut Vec<u8>) -> Result<(), SerializerError> {
        bincode::serialize_into(dest, message)?;
        Ok(())
    }

    fn decode(&self, source: &mut &[u8]) -> Result<M, SerializerError> {
        Ok(bincode::deserialize_from(source)?)
    }
}

struct SerializerEntry {
    name: &'static str,

    /// Always an `Arc<dyn Serializer<M>>` for the `M` this entry is keyed by.
    serializer: Box<dyn Any + Send + Sync>,
}

/// Maps message types to their serializers.
///
/// Every message type needs exactly one serializer, bound before it is registered with a channel.
#[derive(Default)]
pub struct SerializerRegistry {
    by_type: HashMap<TypeId, SerializerEntry>,
    by_name: HashMap<&'static str, TypeId>,
}

impl SerializerRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn bind<M: 'static>(&mut self, serializer: impl Serializer<M>) -> Result<(), ConfigError> {
        let name = type_name::<M>();
        let type_id = TypeId::of::<M>();
        if self.by_type.contains_key(&type_id) {
            return Err(ConfigError::DuplicateSerializer(name));
        }

        let erased: Arc<dyn Serializer<M>> = Arc::new(serializer);
        self.by_type.insert(
            type_id,
            SerializerEntry {
                name,
                serializer: Box::new(erased),
            },
        );
        self.by_name.insert(name, type_id);
        Ok(())
    }

    pub fn get<M: 'static>(&self) -> Result<Arc<dyn Serializer<M>>, ConfigError> {
        self.by_type
            .get(&TypeId::of::<M>())
            .and_then(|e| e.serializer.downcast_ref::<Arc<dyn Serializer<M>>>())
            .cloned()
            .ok_or_else(|| ConfigError::MissingSerializer(type_name::<M>()))
    }

    /// Whether a serializer is bound for the fully-qualified type name.
    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn iter_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_type.values().map(|e| e.name)
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}
