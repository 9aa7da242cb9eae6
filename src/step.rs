//! Steps of a container.

use ndarray::{ArrayBase, ArrayD, Data, Dimension};

use crate::attribute::Attrs;
use crate::error::{Error, Result};
use crate::file::File;
use crate::lookup::Lookup;
use crate::types::Element;
use crate::variable::{AnyArray, StepBinding, Variable};

/// A single step of a container.
///
/// Variables looked up through a step have the declared shape of the
/// variable, without the step dimension.
#[derive(Debug)]
pub struct Step<'a> {
    file: &'a mut File,
    index: usize,
}

impl<'a> Step<'a> {
    pub(crate) fn new(file: &'a mut File, index: usize) -> Step<'a> {
        Step { file, index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn variables(&self) -> Vec<String> {
        self.file.variables()
    }

    pub fn variable(&self, name: &str) -> Result<Variable<'_>> {
        // Checks the mode.
        let var = self.file.variable(name)?;
        Ok(Variable::new(
            &*self.file,
            var.info().clone(),
            StepBinding::At(self.index),
        ))
    }

    /// Read all of variable `name` in this step.
    pub fn read<T: Element>(&self, name: &str) -> Result<ArrayD<T>> {
        self.variable(name)?.values()
    }

    pub fn read_any(&self, name: &str) -> Result<AnyArray> {
        self.variable(name)?.read_any(())
    }

    /// Write `data` to variable `name` in this step.
    pub fn write<T, S, D>(&mut self, name: &str, data: &ArrayBase<S, D>) -> Result<()>
    where
        T: Element,
        S: Data<Elem = T>,
        D: Dimension,
    {
        self.file.write(name, data)
    }

    /// Container attributes.
    pub fn attrs(&self) -> Attrs<'_> {
        self.file.attrs()
    }
}

impl Lookup for Step<'_> {
    fn lookup(&self, name: &str) -> Result<Variable<'_>> {
        self.variable(name)
    }

    fn keys(&self) -> Vec<String> {
        self.variables()
    }
}

/// Iterator over the remaining steps of a container.
///
/// Each call to [`Steps::next`] ends the previous step and begins the next.
/// Dropping the iterator ends the active step, so a later iteration continues
/// with the following step.
///
/// ```rust
/// # use stepio::prelude::*;
/// # use ndarray::arr1;
/// let backend = MemoryBackend::new();
///
/// let mut f = File::open(&backend, "steps.bp", Mode::Write)?;
/// for i in 0..3 {
///     f.next_step(|s| s.write("x", &arr1(&[i as f32])))?;
/// }
/// f.close()?;
///
/// let mut f = File::open(&backend, "steps.bp", Mode::Read)?;
/// let mut steps = f.iter_steps();
/// while let Some(step) = steps.next()? {
///     let x = step.read::<f32>("x")?;
///     assert_eq!(x[[0]], step.index() as f32);
/// }
/// # Ok::<(), stepio::Error>(())
/// ```
#[derive(Debug)]
pub struct Steps<'a> {
    file: &'a mut File,
}

impl<'a> Steps<'a> {
    pub(crate) fn new(file: &'a mut File) -> Steps<'a> {
        Steps { file }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<Step<'_>>> {
        if self.file.in_step() {
            self.file.end_step()?;
        }

        match self.file.begin_step() {
            Ok(index) => Ok(Some(Step::new(&mut *self.file, index))),
            Err(Error::EndOfStream) => {
                trace!("{}: end of stream", self.file.path().display());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl Drop for Steps<'_> {
    fn drop(&mut self) {
        if self.file.in_step() {
            if let Err(e) = self.file.end_step() {
                warn!("failed to end step: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MemoryBackend, Mode};
    use ndarray::{arr0, arr1};

    fn counter(b: &MemoryBackend, n: i64) {
        let mut f = File::open(b, "n.bp", Mode::Write).unwrap();
        let mut steps = f.iter_steps();
        for i in 0..n {
            let mut step = steps.next().unwrap().unwrap();
            assert_eq!(step.index(), i as usize);
            step.write("n", &arr0(i)).unwrap();
        }
    }

    #[test]
    fn iterate() {
        let b = MemoryBackend::new();
        counter(&b, 4);

        let mut f = File::open(&b, "n.bp", Mode::Read).unwrap();
        let mut seen = Vec::new();
        let mut steps = f.iter_steps();
        while let Some(step) = steps.next().unwrap() {
            seen.push(step.read::<i64>("n").unwrap()[[]]);
        }
        assert_eq!(seen, [0, 1, 2, 3]);
        assert!(steps.next().unwrap().is_none());
    }

    #[test]
    fn iterate_random_access() {
        let b = MemoryBackend::new();
        counter(&b, 3);

        let mut f = File::open(&b, "n.bp", Mode::ReadRandomAccess).unwrap();
        let mut steps = f.iter_steps();
        let mut n = 0;
        while let Some(step) = steps.next().unwrap() {
            assert_eq!(step.read_any("n").unwrap().into_array::<i64>().unwrap()[[]], n);
            n += 1;
        }
        assert_eq!(n, 3);
    }

    #[test]
    fn resume_after_break() {
        let b = MemoryBackend::new();
        counter(&b, 4);

        let mut f = File::open(&b, "n.bp", Mode::Read).unwrap();
        {
            let mut steps = f.iter_steps();
            let step = steps.next().unwrap().unwrap();
            assert_eq!(step.index(), 0);
        }
        assert!(!f.in_step());

        let mut steps = f.iter_steps();
        let step = steps.next().unwrap().unwrap();
        assert_eq!(step.index(), 1);
        assert_eq!(step.read::<i64>("n").unwrap()[[]], 1);
    }

    #[test]
    fn step_handles() {
        let b = MemoryBackend::new();
        let mut f = File::open(&b, "h.bp", Mode::Write).unwrap();
        for i in 0..2 {
            f.next_step(|s| s.write("v", &arr1(&[i, i + 1, i + 2])))
                .unwrap();
        }
        f.close().unwrap();

        let mut f = File::open(&b, "h.bp", Mode::ReadRandomAccess).unwrap();
        let step = f.step(1).unwrap();
        let v = step.variable("v").unwrap();
        assert_eq!(v.shape(), [3]);
        assert_eq!(v.binding(), StepBinding::At(1));
        assert_eq!(v.read::<i32, _>(1..).unwrap(), arr1(&[2, 3]).into_dyn());
        assert_eq!(v.read::<i32, _>(-1).unwrap(), arr0(3).into_dyn());
        assert!(matches!(step.variable("w"), Err(Error::NotFound(_))));
        assert_eq!(step.keys(), ["v"]);
        assert!(step.contains("v"));
        drop(step);

        assert!(matches!(f.step(2), Err(Error::InvalidIndex(_))));
    }

    #[test]
    fn next_step_closure() {
        let b = MemoryBackend::new();
        counter(&b, 2);

        let mut f = File::open(&b, "n.bp", Mode::Read).unwrap();
        let v = f.next_step(|s| s.read::<i64>("n")).unwrap();
        assert_eq!(v[[]], 0);
        assert!(!f.in_step());

        // errors in the closure still end the step
        assert!(f.next_step(|s| s.read::<i64>("x")).is_err());
        assert!(!f.in_step());

        assert!(matches!(
            f.next_step(|s| s.read::<i64>("n")),
            Err(Error::EndOfStream)
        ));
    }
}
