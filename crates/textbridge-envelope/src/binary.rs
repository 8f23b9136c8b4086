//! Binary payloads and typed numeric views.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{EnvelopeError, Result};

/// Element type of a binary payload. `Raw` is an untyped byte buffer; every
/// other variant is a typed numeric view over the same bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementType {
    #[default]
    Raw,
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
    Int64,
    Uint64,
}

impl ElementType {
    /// Width of one element in bytes.
    pub fn width(self) -> usize {
        match self {
            ElementType::Raw | ElementType::Int8 | ElementType::Uint8 | ElementType::Uint8Clamped => 1,
            ElementType::Int16 | ElementType::Uint16 => 2,
            ElementType::Int32 | ElementType::Uint32 | ElementType::Float32 => 4,
            ElementType::Float64 | ElementType::Int64 | ElementType::Uint64 => 8,
        }
    }

    /// Wire name of the element type.
    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Raw => "raw",
            ElementType::Int8 => "int8",
            ElementType::Uint8 => "uint8",
            ElementType::Uint8Clamped => "uint8-clamped",
            ElementType::Int16 => "int16",
            ElementType::Uint16 => "uint16",
            ElementType::Int32 => "int32",
            ElementType::Uint32 => "uint32",
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
            ElementType::Int64 => "int64",
            ElementType::Uint64 => "uint64",
        }
    }

    pub fn is_raw(self) -> bool {
        self == ElementType::Raw
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A binary payload: bytes plus the element type they are viewed as.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binary {
    element: ElementType,
    bytes: Bytes,
}

impl Binary {
    /// An untyped byte buffer.
    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        Self {
            element: ElementType::Raw,
            bytes: bytes.into(),
        }
    }

    /// A typed view over `bytes`. The length must be a multiple of the
    /// element width.
    pub fn typed(element: ElementType, bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        let width = element.width();
        if bytes.len() % width != 0 {
            return Err(EnvelopeError::MisalignedView {
                subtype: element,
                len: bytes.len(),
                width,
            });
        }
        Ok(Self { element, bytes })
    }

    /// Decode a lowercase (or uppercase) hex string, two digits per byte.
    pub fn from_hex(element: ElementType, hex: &str) -> Result<Self> {
        Self::typed(element, hex::decode(hex)?)
    }

    /// Encode the bytes as lowercase hex, two digits per byte, in byte order.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn element_type(&self) -> ElementType {
        self.element
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// Byte length.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of elements in the view (bytes for raw payloads).
    pub fn element_count(&self) -> usize {
        self.bytes.len() / self.element.width()
    }
}

macro_rules! numeric_views {
    ($($element:ident, $ty:ty, $from:ident, $to:ident;)*) => {
        impl Binary {
            $(
                #[doc = concat!("Build a `", stringify!($ty), "` view (little-endian).")]
                pub fn $from(values: &[$ty]) -> Self {
                    let mut bytes = Vec::with_capacity(values.len() * std::mem::size_of::<$ty>());
                    for value in values {
                        bytes.extend_from_slice(&value.to_le_bytes());
                    }
                    Self {
                        element: ElementType::$element,
                        bytes: Bytes::from(bytes),
                    }
                }

                #[doc = concat!("Read the elements of a `", stringify!($ty), "` view, or `None` for any other element type.")]
                pub fn $to(&self) -> Option<Vec<$ty>> {
                    if self.element != ElementType::$element {
                        return None;
                    }
                    let values = self
                        .bytes
                        .chunks_exact(std::mem::size_of::<$ty>())
                        .map(|chunk| {
                            let mut buf = [0u8; std::mem::size_of::<$ty>()];
                            buf.copy_from_slice(chunk);
                            <$ty>::from_le_bytes(buf)
                        })
                        .collect();
                    Some(values)
                }
            )*
        }
    };
}

numeric_views! {
    Int8, i8, from_i8s, to_i8s;
    Uint8, u8, from_u8s, to_u8s;
    Int16, i16, from_i16s, to_i16s;
    Uint16, u16, from_u16s, to_u16s;
    Int32, i32, from_i32s, to_i32s;
    Uint32, u32, from_u32s, to_u32s;
    Float32, f32, from_f32s, to_f32s;
    Float64, f64, from_f64s, to_f64s;
    Int64, i64, from_i64s, to_i64s;
    Uint64, u64, from_u64s, to_u64s;
}

impl Binary {
    /// Build a clamped byte view.
    pub fn from_clamped(values: &[u8]) -> Self {
        Self {
            element: ElementType::Uint8Clamped,
            bytes: Bytes::copy_from_slice(values),
        }
    }

    /// Read a clamped byte view.
    pub fn to_clamped(&self) -> Option<Vec<u8>> {
        (self.element == ElementType::Uint8Clamped).then(|| self.bytes.to_vec())
    }
}

impl From<Vec<u8>> for Binary {
    fn from(bytes: Vec<u8>) -> Self {
        Self::raw(bytes)
    }
}

impl From<Bytes> for Binary {
    fn from(bytes: Bytes) -> Self {
        Self::raw(bytes)
    }
}
