//! The I/O engine which stores variables, steps and attributes.
//!
//! Containers only talk to the engine through [`Engine`], and open engines
//! through a [`Backend`]. The engine is responsible for the storage format and
//! transport; this crate only computes which region of a variable to transfer.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::attribute::Attribute;
use crate::error::Error;
use crate::index::Selection;
use crate::types::Datatype;

pub mod memory;

pub use memory::{MemoryBackend, MemoryEngine};

/// Mode a container is opened with.
#[derive(Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Clone, Copy)]
pub enum Mode {
    /// Sequential reading, one step at a time (`"r"`).
    Read,
    /// Reading with arbitrary step selection (`"rra"`).
    ReadRandomAccess,
    /// Writing (`"w"`).
    Write,
}

impl Mode {
    pub fn is_read(&self) -> bool {
        matches!(self, Mode::Read | Mode::ReadRandomAccess)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Read => "r",
            Mode::ReadRandomAccess => "rra",
            Mode::Write => "w",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" => Ok(Mode::Read),
            "rra" => Ok(Mode::ReadRandomAccess),
            "w" => Ok(Mode::Write),
            _ => Err(Error::InvalidMode(format!("unknown mode: {s}"))),
        }
    }
}

/// Outcome of beginning a step.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StepStatus {
    Ok,
    /// No more steps, and none will become available.
    EndOfStream,
    /// The next step is not available yet.
    NotReady,
}

/// Declaration of a variable.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone)]
pub struct VariableInfo {
    pub name: String,
    pub dtype: Datatype,
    /// Shape of the variable in a single step.
    pub shape: Vec<usize>,
}

impl VariableInfo {
    pub fn new(name: &str, dtype: Datatype, shape: &[usize]) -> VariableInfo {
        VariableInfo {
            name: name.to_string(),
            dtype,
            shape: shape.to_vec(),
        }
    }

    /// Number of elements in one step.
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }
}

/// An open engine for one container.
///
/// All calls are synchronous: `get` and `put` have completed transferring the
/// data when they return.
pub trait Engine {
    /// Name of the container, usually its path.
    fn name(&self) -> &str;

    fn mode(&self) -> Mode;

    fn inquire_variable(&self, name: &str) -> Option<VariableInfo>;

    fn available_variables(&self) -> Vec<VariableInfo>;

    /// Declare a new variable with a fixed shape.
    fn define_variable(
        &mut self,
        name: &str,
        dtype: Datatype,
        shape: &[usize],
    ) -> Result<VariableInfo, anyhow::Error>;

    fn begin_step(&mut self) -> Result<StepStatus, anyhow::Error>;

    fn end_step(&mut self) -> Result<(), anyhow::Error>;

    /// Index of the active step, or of the last step begun.
    fn current_step(&self) -> usize;

    /// Total number of steps available.
    fn steps(&self) -> usize;

    /// Read `selection` of variable `name` into `dst`, which must hold exactly
    /// `selection.len()` elements of the variable's datatype in C order.
    fn get(&self, name: &str, selection: &Selection, dst: &mut [u8]) -> Result<(), anyhow::Error>;

    /// Write all of variable `name` in the active step.
    fn put(&mut self, name: &str, src: &[u8]) -> Result<(), anyhow::Error>;

    fn define_attribute(&mut self, name: &str, value: Attribute) -> Result<(), anyhow::Error>;

    fn inquire_attribute(&self, name: &str) -> Option<Attribute>;

    fn available_attributes(&self) -> Vec<String>;

    fn close(&mut self) -> Result<(), anyhow::Error>;
}

/// Opens engines for containers.
pub trait Backend {
    fn open(&self, path: &Path, mode: Mode) -> Result<Box<dyn Engine>, anyhow::Error>;
}

impl<B: Backend + ?Sized> Backend for &B {
    fn open(&self, path: &Path, mode: Mode) -> Result<Box<dyn Engine>, anyhow::Error> {
        (**self).open(path, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mode() {
        assert_eq!("r".parse::<Mode>().unwrap(), Mode::Read);
        assert_eq!("rra".parse::<Mode>().unwrap(), Mode::ReadRandomAccess);
        assert_eq!("w".parse::<Mode>().unwrap(), Mode::Write);
        assert!(matches!("a".parse::<Mode>(), Err(Error::InvalidMode(_))));

        for m in [Mode::Read, Mode::ReadRandomAccess, Mode::Write] {
            assert_eq!(m.to_string().parse::<Mode>().unwrap(), m);
        }
    }

    #[test]
    fn serialize_info() {
        let info = VariableInfo::new("b", Datatype::Float64, &[5]);
        let s = bincode::serialize(&info).unwrap();
        let d: VariableInfo = bincode::deserialize(&s).unwrap();
        assert_eq!(info, d);
        assert_eq!(d.size(), 5);
        assert!(!d.is_scalar());
    }
}
