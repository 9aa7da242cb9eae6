//! Index expressions and their translation into engine selections.
//!
//! A variable is viewed as an array with an implicit leading step dimension,
//! e.g. a variable declared with shape `[5]` in a container with 2 steps is
//! indexed as an array of shape `[2, 5]`. An [`Expr`] over that array is
//! translated into a [`Selection`]: a step range plus a block of
//! `(start, count)` pairs for the declared dimensions.
//!
//! Expressions are built with `From` conversions, numpy style:
//! ```rust
//! # use stepio::index::{Ellipsis, Expr, Selector};
//! fn take_expr(e: impl Into<Expr>) {}
//! // Everything
//! take_expr(..);
//! take_expr(Ellipsis);
//! take_expr(());
//! // Step 1, all data
//! take_expr(1);
//! // Step 1, elements 1 and 2 of the first dimension
//! take_expr((1, 1..3));
//! // Last step, last element of the last dimension
//! take_expr((-1, Ellipsis, -1));
//! // Selectors of mixed kinds
//! take_expr(vec![Selector::Full, Selector::Index(2)]);
//! ```
//!
//! The `ndarray::s!` macro can also be used through `TryFrom`.

use std::convert::Infallible;
use std::fmt;
use std::ops::{Range, RangeFrom, RangeFull, RangeInclusive, RangeTo, RangeToInclusive};

use ndarray::{Dimension, SliceInfo, SliceInfoElem};

use crate::error::{Error, Result};

/// One component of an index expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// The full dimension.
    Full,
    /// A slice with python semantics: negative bounds count from the end and
    /// bounds are clamped to the dimension.
    Slice {
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    },
    /// Expands to as many `Full` selectors as needed.
    Ellipsis,
    /// A single index, the dimension is dropped from the result.
    Index(i64),
}

/// Marker for `...` in index expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ellipsis;

impl From<Ellipsis> for Selector {
    fn from(_: Ellipsis) -> Self {
        Selector::Ellipsis
    }
}

impl From<RangeFull> for Selector {
    fn from(_: RangeFull) -> Self {
        Selector::Full
    }
}

impl<T: Into<Selector>> From<Option<T>> for Selector {
    /// `None` selects the full dimension.
    fn from(s: Option<T>) -> Self {
        s.map_or(Selector::Full, Into::into)
    }
}

/// Bounds past `i64::MAX` saturate, so they are clamped by slices and out of
/// bounds for indices.
fn saturating_i64<T: TryInto<i64>>(v: T) -> i64 {
    v.try_into().unwrap_or(i64::MAX)
}

macro_rules! impl_integer_selector {
    ($($ty: ty),*) => {
        $(
            impl From<$ty> for Selector {
                fn from(i: $ty) -> Self {
                    Selector::Index(saturating_i64(i))
                }
            }

            impl From<Range<$ty>> for Selector {
                fn from(r: Range<$ty>) -> Self {
                    Selector::Slice {
                        start: Some(saturating_i64(r.start)),
                        stop: Some(saturating_i64(r.end)),
                        step: None,
                    }
                }
            }

            impl From<RangeFrom<$ty>> for Selector {
                fn from(r: RangeFrom<$ty>) -> Self {
                    Selector::Slice {
                        start: Some(saturating_i64(r.start)),
                        stop: None,
                        step: None,
                    }
                }
            }

            impl From<RangeTo<$ty>> for Selector {
                fn from(r: RangeTo<$ty>) -> Self {
                    Selector::Slice {
                        start: None,
                        stop: Some(saturating_i64(r.end)),
                        step: None,
                    }
                }
            }

            impl From<RangeInclusive<$ty>> for Selector {
                fn from(r: RangeInclusive<$ty>) -> Self {
                    Selector::Slice {
                        start: Some(saturating_i64(*r.start())),
                        stop: Some(saturating_i64(*r.end()).saturating_add(1)),
                        step: None,
                    }
                }
            }

            impl From<RangeToInclusive<$ty>> for Selector {
                fn from(r: RangeToInclusive<$ty>) -> Self {
                    Selector::Slice {
                        start: None,
                        stop: Some(saturating_i64(r.end).saturating_add(1)),
                        step: None,
                    }
                }
            }
        )*
    };
}

impl_integer_selector!(i32, i64, isize, usize);

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn bound(f: &mut fmt::Formatter<'_>, b: Option<i64>) -> fmt::Result {
            match b {
                Some(b) => write!(f, "{b}"),
                None => Ok(()),
            }
        }

        match *self {
            Selector::Full => f.write_str(":"),
            Selector::Ellipsis => f.write_str("..."),
            Selector::Index(i) => write!(f, "{i}"),
            Selector::Slice { start, stop, step } => {
                bound(f, start)?;
                f.write_str(":")?;
                bound(f, stop)?;
                if let Some(step) = step {
                    write!(f, ":{step}")?;
                }
                Ok(())
            }
        }
    }
}

/// An index expression: an ordered sequence of selectors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expr(Vec<Selector>);

impl Expr {
    pub fn new(selectors: Vec<Selector>) -> Expr {
        Expr(selectors)
    }

    /// Select everything.
    pub fn all() -> Expr {
        Expr(vec![])
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new expression with `selector` in front.
    pub fn prepend(&self, selector: Selector) -> Expr {
        let mut selectors = Vec::with_capacity(self.0.len() + 1);
        selectors.push(selector);
        selectors.extend_from_slice(&self.0);
        Expr(selectors)
    }

    /// Expand ellipsis and pad with `Full` so that there is exactly one
    /// selector for each of `ndim` dimensions.
    fn expand(&self, ndim: usize) -> Result<Vec<Selector>> {
        let ellipses = self
            .0
            .iter()
            .filter(|s| matches!(s, Selector::Ellipsis))
            .count();

        if ellipses > 1 {
            return Err(Error::InvalidIndex(
                "an index can only have a single ellipsis".into(),
            ));
        }

        let explicit = self.0.len() - ellipses;
        if explicit > ndim {
            return Err(Error::InvalidIndex(format!(
                "too many indices: {explicit} given, but only {ndim} dimensions"
            )));
        }

        let mut selectors = Vec::with_capacity(ndim);
        for s in &self.0 {
            match s {
                Selector::Ellipsis => {
                    selectors.extend(std::iter::repeat(Selector::Full).take(ndim - explicit))
                }
                s => selectors.push(*s),
            }
        }
        selectors.resize(ndim, Selector::Full);

        Ok(selectors)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, s) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{s}")?;
        }
        f.write_str("]")
    }
}

macro_rules! impl_selector_as_expr {
    ($($item: ty),* $(,)?) => {
        $(
            impl From<$item> for Expr {
                fn from(item: $item) -> Self {
                    Expr(vec![item.into()])
                }
            }
        )*
    };
}

impl_selector_as_expr!(Selector, Ellipsis);

macro_rules! impl_integer_expr {
    ($($ty: ty),*) => {
        $(
            impl_selector_as_expr!(
                $ty,
                Range<$ty>,
                RangeFrom<$ty>,
                RangeTo<$ty>,
                RangeInclusive<$ty>,
                RangeToInclusive<$ty>,
            );
        )*
    };
}

impl_integer_expr!(i32, i64, isize, usize);

impl From<RangeFull> for Expr {
    fn from(_: RangeFull) -> Self {
        Expr::all()
    }
}

impl From<()> for Expr {
    fn from(_: ()) -> Self {
        Expr::all()
    }
}

impl From<&Expr> for Expr {
    fn from(expr: &Expr) -> Self {
        expr.clone()
    }
}

impl From<&[Selector]> for Expr {
    fn from(selectors: &[Selector]) -> Self {
        Expr(selectors.to_vec())
    }
}

impl<T: Into<Selector>> From<Vec<T>> for Expr {
    fn from(selectors: Vec<T>) -> Self {
        Expr(selectors.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Selector>, const N: usize> From<[T; N]> for Expr {
    fn from(selectors: [T; N]) -> Self {
        Expr(selectors.into_iter().map(Into::into).collect())
    }
}

macro_rules! impl_tuple {
    () => ();

    ($head:ident, $($tail:ident,)*) => (
        #[allow(non_snake_case)]
        impl<$head, $($tail,)*> From<($head, $($tail,)*)> for Expr
            where
                $head: Into<Selector>,
                $(
                    $tail: Into<Selector>,
                )*
        {
            fn from(selectors: ($head, $($tail,)*)) -> Self {
                let ($head, $($tail,)*) = selectors;
                Expr(vec![$head.into(), $($tail.into(),)*])
            }
        }

        impl_tuple! { $($tail,)* }
    )
}

impl_tuple! { T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, }

impl<T, Din: Dimension, Dout: Dimension> TryFrom<&'_ SliceInfo<T, Din, Dout>> for Expr
where
    T: AsRef<[SliceInfoElem]>,
{
    type Error = Error;

    fn try_from(slice: &SliceInfo<T, Din, Dout>) -> Result<Self, Self::Error> {
        let slice: &[SliceInfoElem] = slice.as_ref();

        slice
            .iter()
            .map(|&s| match s {
                SliceInfoElem::Slice { start, end, step } => Ok(Selector::Slice {
                    start: Some(start as i64),
                    stop: end.map(|e| e as i64),
                    step: Some(step as i64),
                }),
                SliceInfoElem::Index(index) => Ok(Selector::Index(index as i64)),
                SliceInfoElem::NewAxis => Err(Error::NotImplemented(
                    "can't add new axis in this context".into(),
                )),
            })
            .collect::<Result<Vec<_>>>()
            .map(Expr)
    }
}

impl<T, Din: Dimension, Dout: Dimension> TryFrom<SliceInfo<T, Din, Dout>> for Expr
where
    T: AsRef<[SliceInfoElem]>,
{
    type Error = Error;

    fn try_from(slice: SliceInfo<T, Din, Dout>) -> Result<Self, Self::Error> {
        Self::try_from(&slice)
    }
}

impl From<Infallible> for Error {
    fn from(e: Infallible) -> Self {
        match e {}
    }
}

/// Region of a variable transferred by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// First step and number of steps.
    pub step: (usize, usize),
    /// Start and count along each declared dimension.
    pub block: Vec<(usize, usize)>,
}

impl Selection {
    /// Select all of `shape` in a single step.
    pub fn step_of(step: usize, shape: &[usize]) -> Selection {
        Selection {
            step: (step, 1),
            block: shape.iter().map(|&n| (0, n)).collect(),
        }
    }

    pub fn start(&self) -> impl Iterator<Item = usize> + '_ {
        self.block.iter().map(|&(start, _)| start)
    }

    pub fn count(&self) -> impl Iterator<Item = usize> + '_ {
        self.block.iter().map(|&(_, count)| count)
    }

    /// Number of elements in one step of the block.
    pub fn block_len(&self) -> usize {
        self.count().product()
    }

    /// Number of elements in the selection.
    pub fn len(&self) -> usize {
        self.step.1 * self.block_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of translating an expression against a shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub selection: Selection,
    /// Shape of the result, dimensions selected by a single index are dropped.
    pub shape: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Resolved {
    start: usize,
    count: usize,
    keep: bool,
}

fn clamp(bound: Option<i64>, default: usize, len: usize) -> usize {
    match bound {
        None => default,
        Some(b) if b < 0 => (b + len as i64).max(0) as usize,
        Some(b) => (b as usize).min(len),
    }
}

fn resolve(selector: Selector, len: usize) -> Result<Resolved> {
    match selector {
        Selector::Full => Ok(Resolved {
            start: 0,
            count: len,
            keep: true,
        }),
        Selector::Slice { start, stop, step } => {
            match step {
                None | Some(1) => {}
                Some(0) => return Err(Error::InvalidIndex("slice step cannot be zero".into())),
                Some(step) => {
                    return Err(Error::NotImplemented(format!(
                        "slices with step {step} are not supported"
                    )))
                }
            }

            let start = clamp(start, 0, len);
            let stop = clamp(stop, len, len);

            if start >= stop {
                return Err(Error::InvalidIndex(format!(
                    "empty slice {start}:{stop} in dimension of size {len}"
                )));
            }

            Ok(Resolved {
                start,
                count: stop - start,
                keep: true,
            })
        }
        Selector::Index(index) => {
            let i = if index < 0 { index + len as i64 } else { index };
            if i < 0 || i >= len as i64 {
                return Err(Error::InvalidIndex(format!(
                    "index {index} is out of bounds for dimension of size {len}"
                )));
            }

            Ok(Resolved {
                start: i as usize,
                count: 1,
                keep: false,
            })
        }
        Selector::Ellipsis => Err(Error::InvalidIndex("unexpanded ellipsis".into())),
    }
}

/// Translate `expr` against `dims`, the step count followed by the declared
/// shape of the variable.
pub fn translate(dims: &[usize], expr: &Expr) -> Result<Translation> {
    let Some((&steps, shape)) = dims.split_first() else {
        return Err(Error::InvalidIndex("missing step dimension".into()));
    };

    let selectors = expr.expand(dims.len())?;

    let step = resolve(selectors[0], steps)?;
    let block = selectors[1..]
        .iter()
        .zip(shape)
        .map(|(&s, &len)| resolve(s, len))
        .collect::<Result<Vec<_>>>()?;

    let result_shape = std::iter::once(&step)
        .chain(&block)
        .filter(|r| r.keep)
        .map(|r| r.count)
        .collect();

    Ok(Translation {
        selection: Selection {
            step: (step.start, step.count),
            block: block.iter().map(|r| (r.start, r.count)).collect(),
        },
        shape: result_shape,
    })
}
