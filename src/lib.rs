//! # STEPIO
//!
//! Step-structured containers of n-dimensional variables, read and written
//! through an I/O engine.
//!
//! A container holds named variables with a fixed shape and element type, written once per step.
//! Opened for reading, each variable is seen as an array with an extra leading step dimension, and
//! can be sliced with numpy-like index expressions. The [index translator](index::translate) turns
//! an expression into the step range and block which is requested from the
//! [engine](engine::Engine), and the shape of the resulting array.
//!
//! The engine does the actual storage and transport. An in-memory engine is included
//! ([`MemoryBackend`]).
//!
//! ## Usage
//!
//! Write two steps, then read them back:
//!
//! ```
//! use ndarray::{arr0, arr1, Array1};
//! use stepio::prelude::*;
//!
//! let backend = MemoryBackend::new();
//!
//! let mut f = File::open(&backend, "test.bp", Mode::Write).unwrap();
//! for step in 0..2 {
//!     f.begin_step().unwrap();
//!     f.write("a", &arr0(99i64)).unwrap();
//!     f.write("b", &(Array1::range(0., 5., 1.) + step as f64)).unwrap();
//!     f.end_step().unwrap();
//! }
//! f.close().unwrap();
//!
//! let f = File::open(&backend, "test.bp", Mode::ReadRandomAccess).unwrap();
//! let b = f.variable("b").unwrap();
//! assert_eq!(b.shape(), [2, 5]);
//!
//! let values = b.read::<f64, _>((1, 1..3)).unwrap();
//! assert_eq!(values, arr1(&[2., 3.]).into_dyn());
//! ```
//!
//! In streaming mode ([`Mode::Read`]) steps are visited in order with [`File::iter_steps`], and
//! only the active step can be read.

#[macro_use]
extern crate anyhow;

#[macro_use]
extern crate log;

pub mod attribute;
pub mod engine;
pub mod error;
pub mod file;
pub mod index;
pub mod lookup;
pub mod step;
pub mod types;
pub mod variable;

pub use attribute::{Attribute, Attrs, AttrsMut};
pub use engine::{Backend, Engine, MemoryBackend, Mode};
pub use error::{Error, Result};
pub use file::File;
pub use index::{translate, Ellipsis, Expr, Selection, Selector, Translation};
pub use lookup::Lookup;
pub use step::{Step, Steps};
pub use types::{Datatype, Element};
pub use variable::{AnyArray, StepBinding, Variable};

pub mod prelude {
    pub use super::attribute::Attribute;
    pub use super::engine::{Backend, MemoryBackend, Mode};
    pub use super::error::{Error, Result};
    pub use super::file::File;
    pub use super::index::{Ellipsis, Expr, Selector};
    pub use super::lookup::Lookup;
    pub use super::types::{Datatype, Element};
    pub use super::variable::Variable;
}
