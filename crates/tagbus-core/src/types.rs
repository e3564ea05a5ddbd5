//! Tag identity and value types shared by the registry and backplane.

use std::fmt;

/// A registry handle. Zero is reserved and never returned by
/// [`crate::registry::TagRegistry::register`].
pub type Handle = u32;

/// The access role a tag was registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TagRole {
    /// The owning plugin writes this tag; others may read it.
    Producer,
    /// The owning plugin only reads this tag.
    Consumer,
}

/// Metadata describing a registered tag.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TagDescriptor {
    pub handle: Handle,
    pub path: String,
    pub role: TagRole,
    pub owner_plugin_instance_id: String,
}

/// A tagged-union value carried by a tag update.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl TagValue {
    /// Best-effort coercion into a target type, following the widening/
    /// narrowing and string conversion rules of the tag service layer.
    /// Returns `None` when the value cannot be represented as `T`.
    pub fn coerce<T: TagCoerce>(&self) -> Option<T> {
        T::from_tag_value(self)
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Bool(b) => write!(f, "{b}"),
            TagValue::Int(i) => write!(f, "{i}"),
            TagValue::Float(v) => write!(f, "{v}"),
            TagValue::Text(s) => write!(f, "{s}"),
            TagValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Implemented for the scalar types tags can coerce into.
pub trait TagCoerce: Sized + Default {
    fn from_tag_value(value: &TagValue) -> Option<Self>;
    fn into_tag_value(self) -> TagValue;
}

macro_rules! impl_int_coerce {
    ($($t:ty),*) => {
        $(impl TagCoerce for $t {
            fn from_tag_value(value: &TagValue) -> Option<Self> {
                match value {
                    TagValue::Bool(b) => Some(if *b { 1 } else { 0 }),
                    TagValue::Int(i) => <$t>::try_from(*i).ok(),
                    TagValue::Float(v) => Some(*v as $t),
                    TagValue::Text(s) => s.parse().ok(),
                    TagValue::Bytes(_) => None,
                }
            }

            fn into_tag_value(self) -> TagValue {
                TagValue::Int(self as i64)
            }
        })*
    };
}

impl_int_coerce!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl TagCoerce for f64 {
    fn from_tag_value(value: &TagValue) -> Option<Self> {
        match value {
            TagValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            TagValue::Int(i) => Some(*i as f64),
            TagValue::Float(v) => Some(*v),
            TagValue::Text(s) => s.parse().ok(),
            TagValue::Bytes(_) => None,
        }
    }

    fn into_tag_value(self) -> TagValue {
        TagValue::Float(self)
    }
}

impl TagCoerce for f32 {
    fn from_tag_value(value: &TagValue) -> Option<Self> {
        f64::from_tag_value(value).map(|v| v as f32)
    }

    fn into_tag_value(self) -> TagValue {
        TagValue::Float(self as f64)
    }
}

impl TagCoerce for bool {
    fn from_tag_value(value: &TagValue) -> Option<Self> {
        match value {
            TagValue::Bool(b) => Some(*b),
            TagValue::Int(i) => Some(*i != 0),
            TagValue::Float(v) => Some(*v != 0.0),
            TagValue::Text(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            TagValue::Bytes(_) => None,
        }
    }

    fn into_tag_value(self) -> TagValue {
        TagValue::Bool(self)
    }
}

impl TagCoerce for String {
    fn from_tag_value(value: &TagValue) -> Option<Self> {
        Some(value.to_string())
    }

    fn into_tag_value(self) -> TagValue {
        TagValue::Text(self)
    }
}

/// Quality flag attached to every published value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Quality {
    Unknown,
    #[default]
    Good,
    Bad,
}

/// One item of a `RegisterTags` request: a path/role pair, optionally
/// registered on behalf of a different owner than the calling plugin.
#[derive(Debug, Clone)]
pub struct TagRegistrationItem {
    pub path: String,
    pub role: TagRole,
    pub source_override: Option<String>,
}

/// The registry's response to one item of a `RegisterTags` request.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AssignedTag {
    pub tag_path: String,
    pub role: TagRole,
    pub handle: Handle,
    /// The effective owner: `source_override` if given, else the caller.
    pub source_plugin_instance_id: String,
    /// The plugin instance that issued the `RegisterTags` call.
    pub reference_plugin_instance_id: String,
}

/// An update delivered through the backplane: a value plus provenance.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TagEnvelope {
    pub handle: Handle,
    pub value: TagValue,
    pub timestamp_ms: u64,
    pub quality: Quality,
    pub source: String,
}
