use std::fmt;
use std::str::FromStr;

use byte_slice_cast::{ToByteSlice, ToMutByteSlice};
use serde::{Deserialize, Serialize};

/// Element type of a variable.
#[derive(Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Clone, Copy)]
pub enum Datatype {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl Datatype {
    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        use Datatype::*;

        match self {
            Int8 | UInt8 => 1,
            Int16 | UInt16 => 2,
            Int32 | UInt32 | Float32 => 4,
            Int64 | UInt64 | Float64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Datatype::Float32 | Datatype::Float64)
    }

    pub fn is_signed(&self) -> bool {
        use Datatype::*;
        matches!(self, Int8 | Int16 | Int32 | Int64 | Float32 | Float64)
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Datatype::*;

        let s = match self {
            Int8 => "int8",
            Int16 => "int16",
            Int32 => "int32",
            Int64 => "int64",
            UInt8 => "uint8",
            UInt16 => "uint16",
            UInt32 => "uint32",
            UInt64 => "uint64",
            Float32 => "float32",
            Float64 => "float64",
        };
        f.write_str(s)
    }
}

impl FromStr for Datatype {
    type Err = anyhow::Error;

    /// Parses both numpy style names (`int32`, `float64`) and the engine's type
    /// names (`int32_t`, `double`, `char`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use Datatype::*;

        let s = s.trim();
        let s = s.strip_suffix("_t").unwrap_or(s);

        Ok(match s {
            // plain `char` is always read as a signed byte, also where the
            // platform `char` is unsigned (aarch64 and arm linux).
            "int8" | "char" | "signed char" => Int8,
            "int16" => Int16,
            "int32" => Int32,
            "int64" => Int64,
            "uint8" | "unsigned char" => UInt8,
            "uint16" => UInt16,
            "uint32" => UInt32,
            "uint64" => UInt64,
            "float32" | "float" => Float32,
            "float64" | "double" => Float64,
            _ => return Err(anyhow!("unsupported datatype: {s}")),
        })
    }
}

/// Rust scalar types which can be stored in a variable.
pub trait Element: ToByteSlice + ToMutByteSlice + Copy + Default + fmt::Debug + 'static {
    const DATATYPE: Datatype;
}

macro_rules! impl_element {
    ($($ty:ty => $dt:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DATATYPE: Datatype = Datatype::$dt;
            }
        )*
    };
}

impl_element! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
}
