//! Attributes: named metadata scoped to a container or to a variable.
//!
//! Variable attributes are stored by the engine as `"{variable}/{name}"`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::file::File;
use crate::types::Datatype;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attribute {
    String(String),
    Strings(Vec<String>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

/// Numeric types which can be read from an [`Attribute`].
pub trait AttributeValue: Sized {
    fn values(attr: &Attribute) -> Option<&[Self]>;
}

macro_rules! impl_attribute {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Attribute {
                fn from(v: $ty) -> Self {
                    Attribute::$variant(vec![v])
                }
            }

            impl From<Vec<$ty>> for Attribute {
                fn from(v: Vec<$ty>) -> Self {
                    Attribute::$variant(v)
                }
            }

            impl From<&[$ty]> for Attribute {
                fn from(v: &[$ty]) -> Self {
                    Attribute::$variant(v.to_vec())
                }
            }

            impl<const N: usize> From<[$ty; N]> for Attribute {
                fn from(v: [$ty; N]) -> Self {
                    Attribute::$variant(v.to_vec())
                }
            }

            impl AttributeValue for $ty {
                fn values(attr: &Attribute) -> Option<&[Self]> {
                    match attr {
                        Attribute::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_attribute! {
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

impl From<&str> for Attribute {
    fn from(s: &str) -> Self {
        Attribute::String(s.to_string())
    }
}

impl From<String> for Attribute {
    fn from(s: String) -> Self {
        Attribute::String(s)
    }
}

impl From<Vec<String>> for Attribute {
    fn from(s: Vec<String>) -> Self {
        Attribute::Strings(s)
    }
}

impl From<&[&str]> for Attribute {
    fn from(s: &[&str]) -> Self {
        Attribute::Strings(s.iter().map(|s| s.to_string()).collect())
    }
}

impl Attribute {
    /// Datatype of numeric attributes.
    pub fn dtype(&self) -> Option<Datatype> {
        use Attribute::*;

        match self {
            String(_) | Strings(_) => None,
            Int8(_) => Some(Datatype::Int8),
            Int16(_) => Some(Datatype::Int16),
            Int32(_) => Some(Datatype::Int32),
            Int64(_) => Some(Datatype::Int64),
            UInt8(_) => Some(Datatype::UInt8),
            UInt16(_) => Some(Datatype::UInt16),
            UInt32(_) => Some(Datatype::UInt32),
            UInt64(_) => Some(Datatype::UInt64),
            Float32(_) => Some(Datatype::Float32),
            Float64(_) => Some(Datatype::Float64),
        }
    }

    pub fn len(&self) -> usize {
        use Attribute::*;

        match self {
            String(_) => 1,
            Strings(v) => v.len(),
            Int8(v) => v.len(),
            Int16(v) => v.len(),
            Int32(v) => v.len(),
            Int64(v) => v.len(),
            UInt8(v) => v.len(),
            UInt16(v) => v.len(),
            UInt32(v) => v.len(),
            UInt64(v) => v.len(),
            Float32(v) => v.len(),
            Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Attribute::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            Attribute::Strings(s) => Some(s),
            _ => None,
        }
    }

    /// Values of a numeric attribute, `None` if `T` is not its datatype.
    pub fn values<T: AttributeValue>(&self) -> Option<&[T]> {
        T::values(self)
    }

    /// The single value of a numeric attribute.
    pub fn value<T: AttributeValue + Copy>(&self) -> Option<T> {
        match self.values::<T>()? {
            [v] => Some(*v),
            _ => None,
        }
    }
}

pub(crate) fn attribute_key(name: &str, variable: Option<&str>) -> String {
    match variable {
        Some(var) => format!("{var}/{name}"),
        None => name.to_string(),
    }
}

/// Names of the attributes in scope, with the variable prefix stripped.
fn scoped_keys(keys: Vec<String>, variable: Option<&str>) -> BTreeSet<String> {
    match variable {
        None => keys.into_iter().filter(|k| !k.contains('/')).collect(),
        Some(var) => {
            let pfx = format!("{var}/");
            keys.into_iter()
                .filter_map(|k| k.strip_prefix(&pfx).map(str::to_string))
                .collect()
        }
    }
}

/// Read only view of the attributes of a container or a variable.
#[derive(Debug)]
pub struct Attrs<'a> {
    file: &'a File,
    variable: Option<String>,
    keys: BTreeSet<String>,
}

impl<'a> Attrs<'a> {
    pub(crate) fn new(file: &'a File, variable: Option<&str>) -> Attrs<'a> {
        let keys = scoped_keys(file.engine().available_attributes(), variable);

        Attrs {
            file,
            variable: variable.map(str::to_string),
            keys,
        }
    }

    /// The variable these attributes belong to, `None` for the container.
    pub fn variable(&self) -> Option<&str> {
        self.variable.as_deref()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.keys.contains(name)
    }

    pub fn get(&self, name: &str) -> Result<Attribute> {
        self.file.read_attribute(name, self.variable())
    }

    /// Attributes in order of name. A listed attribute which the engine then
    /// fails to return is yielded as an error.
    pub fn iter(&self) -> impl Iterator<Item = Result<(&str, Attribute)>> + '_ {
        self.keys
            .iter()
            .map(move |k| self.get(k).map(|a| (k.as_str(), a)))
    }
}

/// Writable view of the attributes of a container or a variable.
#[derive(Debug)]
pub struct AttrsMut<'a> {
    file: &'a mut File,
    variable: Option<String>,
}

impl<'a> AttrsMut<'a> {
    pub(crate) fn new(file: &'a mut File, variable: Option<&str>) -> AttrsMut<'a> {
        AttrsMut {
            file,
            variable: variable.map(str::to_string),
        }
    }

    pub fn get(&self, name: &str) -> Result<Attribute> {
        self.file.read_attribute(name, self.variable.as_deref())
    }

    /// Set attribute `name`. Setting a value equal to the current one does
    /// nothing.
    pub fn set(&mut self, name: &str, value: impl Into<Attribute>) -> Result<()> {
        self.file
            .write_attribute(name, value.into(), self.variable.as_deref())
    }

    pub fn as_attrs(&self) -> Attrs<'_> {
        Attrs::new(&*self.file, self.variable.as_deref())
    }
}

pub(crate) fn not_found(name: &str, variable: Option<&str>) -> Error {
    match variable {
        Some(var) => Error::NotFound(format!("attribute {name} of variable {var}")),
        None => Error::NotFound(format!("attribute {name}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(Attribute::from("K"), Attribute::String("K".into()));
        assert_eq!(Attribute::from(1.5f32).value::<f32>(), Some(1.5));
        assert_eq!(Attribute::from(1.5f32).value::<f64>(), None);
        assert_eq!(
            Attribute::from([1u16, 2, 3]).values::<u16>(),
            Some(&[1u16, 2, 3][..])
        );
        assert_eq!(Attribute::from(vec![1i64, 2]).value::<i64>(), None);
        assert_eq!(Attribute::from(vec![1i64, 2]).dtype(), Some(Datatype::Int64));
        assert_eq!(
            Attribute::from(&["x", "y"][..]).as_strings().map(|s| s.len()),
            Some(2)
        );
        assert_eq!(Attribute::from("K").dtype(), None);
        assert_eq!(Attribute::from("K").as_str(), Some("K"));
        assert!(Attribute::from(Vec::<u8>::new()).is_empty());
    }

    #[test]
    fn scoping() {
        let keys = vec![
            "title".to_string(),
            "b/units".to_string(),
            "b/long_name".to_string(),
            "bb/units".to_string(),
        ];

        assert_eq!(
            scoped_keys(keys.clone(), None),
            BTreeSet::from(["title".to_string()])
        );
        assert_eq!(
            scoped_keys(keys.clone(), Some("b")),
            BTreeSet::from(["units".to_string(), "long_name".to_string()])
        );
        assert_eq!(attribute_key("units", Some("b")), "b/units");
        assert_eq!(attribute_key("title", None), "title");
    }

    #[test]
    fn serialize() {
        let a = Attribute::from(vec![1.0f64, 2.0]);
        let s = bincode::serialize(&a).unwrap();
        assert_eq!(bincode::deserialize::<Attribute>(&s).unwrap(), a);
    }
}
