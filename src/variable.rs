//! Lazy array handles to variables.

use std::any::Any;
use std::fmt;

use ndarray::ArrayD;

use crate::attribute::Attrs;
use crate::engine::VariableInfo;
use crate::error::{Error, Result};
use crate::file::File;
use crate::index::{Expr, Selector};
use crate::types::{Datatype, Element};

/// Which steps a [`Variable`] handle covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepBinding {
    /// All steps, the step is the first dimension of the handle.
    All,
    /// A single step, the handle has the declared shape of the variable.
    At(usize),
}

/// Array-like handle to a variable.
///
/// Only the declaration is held, data is read from the engine when the handle
/// is indexed with [`Variable::read`].
#[derive(Debug, Clone)]
pub struct Variable<'a> {
    file: &'a File,
    info: VariableInfo,
    binding: StepBinding,
}

impl<'a> Variable<'a> {
    pub(crate) fn new(file: &'a File, info: VariableInfo, binding: StepBinding) -> Variable<'a> {
        Variable {
            file,
            info,
            binding,
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn dtype(&self) -> Datatype {
        self.info.dtype
    }

    pub fn info(&self) -> &VariableInfo {
        &self.info
    }

    pub fn binding(&self) -> StepBinding {
        self.binding
    }

    /// Shape of the handle, including the step dimension when bound to all
    /// steps.
    pub fn shape(&self) -> Vec<usize> {
        match self.binding {
            StepBinding::All => std::iter::once(self.file.step_extent())
                .chain(self.info.shape.iter().copied())
                .collect(),
            StepBinding::At(_) => self.info.shape.clone(),
        }
    }

    pub fn ndim(&self) -> usize {
        match self.binding {
            StepBinding::All => self.info.shape.len() + 1,
            StepBinding::At(_) => self.info.shape.len(),
        }
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        self.shape().iter().product()
    }

    /// Length of the first dimension.
    pub fn len(&self) -> Result<usize> {
        self.shape()
            .first()
            .copied()
            .ok_or_else(|| Error::InvalidIndex("len() of unsized object".into()))
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn expr(&self, expr: Expr) -> Expr {
        match self.binding {
            StepBinding::All => expr,
            StepBinding::At(step) => expr.prepend(Selector::Index(step as i64)),
        }
    }

    /// Read the region selected by `index`.
    ///
    /// ```rust
    /// # use stepio::prelude::*;
    /// # use ndarray::arr1;
    /// # let backend = MemoryBackend::new();
    /// # let mut f = File::open(&backend, "doc.bp", Mode::Write)?;
    /// # f.next_step(|s| s.write("b", &arr1(&[0.0, 1.0, 2.0])))?;
    /// # f.close()?;
    /// let f = File::open(&backend, "doc.bp", Mode::ReadRandomAccess)?;
    /// let b = f.variable("b")?;
    /// assert_eq!(b.shape(), [1, 3]);
    ///
    /// // Step 0, elements 1 and 2
    /// let v = b.read::<f64, _>((0, 1..))?;
    /// assert_eq!(v, arr1(&[1.0, 2.0]).into_dyn());
    ///
    /// // Last element of every step
    /// let v = b.read::<f64, _>((Ellipsis, -1))?;
    /// assert_eq!(v, arr1(&[2.0]).into_dyn());
    /// # Ok::<(), stepio::Error>(())
    /// ```
    pub fn read<T, E>(&self, index: E) -> Result<ArrayD<T>>
    where
        T: Element,
        E: TryInto<Expr>,
        Error: From<E::Error>,
    {
        let expr = self.expr(index.try_into()?);
        self.file.read(&self.info, &expr)
    }

    /// Read the region selected by `index` in the datatype of the variable.
    pub fn read_any<E>(&self, index: E) -> Result<AnyArray>
    where
        E: TryInto<Expr>,
        Error: From<E::Error>,
    {
        let expr = self.expr(index.try_into()?);
        self.file.read_any(&self.info, &expr)
    }

    /// Read everything.
    pub fn values<T: Element>(&self) -> Result<ArrayD<T>> {
        self.read(Expr::all())
    }

    pub fn attrs(&self) -> Attrs<'a> {
        Attrs::new(self.file, Some(&self.info.name))
    }
}

impl fmt::Display for Variable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Variable(name={}, shape={:?}, dtype={}",
            self.info.name,
            self.shape(),
            self.info.dtype
        )?;
        match self.binding {
            StepBinding::All => f.write_str(", step=all)"),
            StepBinding::At(s) => write!(f, ", step={s})"),
        }
    }
}

/// An array in the datatype of the variable it was read from.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyArray {
    Int8(ArrayD<i8>),
    Int16(ArrayD<i16>),
    Int32(ArrayD<i32>),
    Int64(ArrayD<i64>),
    UInt8(ArrayD<u8>),
    UInt16(ArrayD<u16>),
    UInt32(ArrayD<u32>),
    UInt64(ArrayD<u64>),
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
}

macro_rules! each_array {
    ($self: expr, $a: ident => $e: expr) => {
        match $self {
            AnyArray::Int8($a) => $e,
            AnyArray::Int16($a) => $e,
            AnyArray::Int32($a) => $e,
            AnyArray::Int64($a) => $e,
            AnyArray::UInt8($a) => $e,
            AnyArray::UInt16($a) => $e,
            AnyArray::UInt32($a) => $e,
            AnyArray::UInt64($a) => $e,
            AnyArray::Float32($a) => $e,
            AnyArray::Float64($a) => $e,
        }
    };
}

impl AnyArray {
    pub fn dtype(&self) -> Datatype {
        use AnyArray::*;

        match self {
            Int8(_) => Datatype::Int8,
            Int16(_) => Datatype::Int16,
            Int32(_) => Datatype::Int32,
            Int64(_) => Datatype::Int64,
            UInt8(_) => Datatype::UInt8,
            UInt16(_) => Datatype::UInt16,
            UInt32(_) => Datatype::UInt32,
            UInt64(_) => Datatype::UInt64,
            Float32(_) => Datatype::Float32,
            Float64(_) => Datatype::Float64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        each_array!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        each_array!(self, a => a.ndim())
    }

    /// The array with elements of type `T`, which must be the datatype of the
    /// array.
    pub fn into_array<T: Element>(self) -> Result<ArrayD<T>> {
        let expected = self.dtype();
        let a: Box<dyn Any> = each_array!(self, a => Box::new(a));

        a.downcast::<ArrayD<T>>()
            .map(|a| *a)
            .map_err(|_| Error::Datatype {
                expected,
                found: T::DATATYPE,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MemoryBackend, Mode};
    use crate::Ellipsis;
    use ndarray::{arr1, arr2, Array2};

    fn grid(b: &MemoryBackend) {
        let mut f = File::open(b, "grid.bp", Mode::Write).unwrap();
        for step in 0..3i32 {
            f.begin_step().unwrap();
            let g = Array2::from_shape_fn((2, 3), |(i, j)| 100 * step + 10 * i as i32 + j as i32);
            f.write("g", &g).unwrap();
            f.end_step().unwrap();
        }
        f.close().unwrap();
    }

    #[test]
    fn handle_metadata() {
        let b = MemoryBackend::new();
        grid(&b);

        let f = File::open(&b, "grid.bp", Mode::ReadRandomAccess).unwrap();
        let g = f.variable("g").unwrap();
        assert_eq!(g.name(), "g");
        assert_eq!(g.dtype(), Datatype::Int32);
        assert_eq!(g.shape(), [3, 2, 3]);
        assert_eq!(g.ndim(), 3);
        assert_eq!(g.size(), 18);
        assert_eq!(g.len().unwrap(), 3);
        assert_eq!(g.binding(), StepBinding::All);
        assert_eq!(g.to_string(), "Variable(name=g, shape=[3, 2, 3], dtype=int32, step=all)");
    }

    #[test]
    fn slicing() {
        let b = MemoryBackend::new();
        grid(&b);

        let f = File::open(&b, "grid.bp", Mode::ReadRandomAccess).unwrap();
        let g = f.variable("g").unwrap();

        assert_eq!(
            g.read::<i32, _>((1, .., 1..)).unwrap(),
            arr2(&[[101, 102], [111, 112]]).into_dyn()
        );
        assert_eq!(
            g.read::<i32, _>((.., 1, 2)).unwrap(),
            arr1(&[12, 112, 212]).into_dyn()
        );
        assert_eq!(
            g.read::<i32, _>((1.., Ellipsis, 0)).unwrap(),
            arr2(&[[100, 110], [200, 210]]).into_dyn()
        );
        assert_eq!(
            g.read::<i32, _>(ndarray::s![-1, -1, ..2]).unwrap(),
            arr1(&[210, 211]).into_dyn()
        );
        assert_eq!(g.values::<i32>().unwrap().shape(), &[3, 2, 3]);

        assert!(matches!(
            g.read::<i32, _>((0, 0, 0, 0)),
            Err(Error::InvalidIndex(_))
        ));
        assert!(matches!(
            g.read::<f32, _>(..),
            Err(Error::Datatype {
                expected: Datatype::Int32,
                found: Datatype::Float32
            })
        ));
    }

    #[test]
    fn any_array() {
        let b = MemoryBackend::new();
        grid(&b);

        let f = File::open(&b, "grid.bp", Mode::ReadRandomAccess).unwrap();
        let a = f.variable("g").unwrap().read_any((0, 0)).unwrap();
        assert_eq!(a.dtype(), Datatype::Int32);
        assert_eq!(a.shape(), &[3]);
        assert_eq!(a.ndim(), 1);
        assert!(matches!(
            a.clone().into_array::<i64>(),
            Err(Error::Datatype { .. })
        ));
        assert_eq!(a.into_array::<i32>().unwrap(), arr1(&[0, 1, 2]).into_dyn());
    }

    #[test]
    fn scalar_len() {
        let b = MemoryBackend::new();
        let mut f = File::open(&b, "s.bp", Mode::Write).unwrap();
        f.next_step(|s| s.write("s", &ndarray::arr0(1.5f32))).unwrap();
        f.close().unwrap();

        let mut f = File::open(&b, "s.bp", Mode::ReadRandomAccess).unwrap();
        assert_eq!(f.variable("s").unwrap().len().unwrap(), 1);

        let step = f.step(0).unwrap();
        let s = step.variable("s").unwrap();
        assert_eq!(s.shape(), Vec::<usize>::new());
        assert!(matches!(s.len(), Err(Error::InvalidIndex(_))));
        assert_eq!(s.values::<f32>().unwrap(), ndarray::arr0(1.5).into_dyn());
    }
}
