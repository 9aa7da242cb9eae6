use std::fmt;
use std::path::{Path, PathBuf};

use byte_slice_cast::{AsByteSlice, AsMutByteSlice};
use ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn};

use crate::attribute::{self, Attribute, Attrs, AttrsMut};
use crate::engine::{Backend, Engine, Mode, StepStatus, VariableInfo};
use crate::error::{Error, Result};
use crate::index::{translate, Expr, Selection};
use crate::lookup::Lookup;
use crate::step::{Step, Steps};
use crate::types::{Datatype, Element};
use crate::variable::{AnyArray, StepBinding, Variable};

/// A container of variables written in steps.
///
/// The container tracks the active step. In sequential read mode (`"r"`) and
/// write mode (`"w"`) steps are begun and ended through the engine, in random
/// access mode (`"rra"`) any step can be read at any time and stepping only
/// moves a local cursor.
pub struct File {
    engine: Box<dyn Engine>,
    mode: Mode,
    path: PathBuf,
    /// Last step begun.
    last_step: Option<usize>,
    in_step: bool,
    closed: bool,
}

impl File {
    /// Open the container at `path` through `backend`.
    pub fn open<B, P>(backend: &B, path: P, mode: Mode) -> Result<File>
    where
        B: Backend + ?Sized,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let engine = backend.open(path, mode)?;

        debug!("opened {} in mode {mode}", path.display());

        Ok(File {
            engine,
            mode,
            path: path.into(),
            last_step: None,
            in_step: false,
            closed: false,
        })
    }

    /// Close the container, ending the active step if any.
    pub fn close(mut self) -> Result<()> {
        self.close_impl()
    }

    fn close_impl(&mut self) -> Result<()> {
        let ended = if self.in_step {
            self.end_step()
        } else {
            Ok(())
        };
        self.in_step = false;
        self.closed = true;
        let closed = self.engine.close();

        debug!("closed {}", self.path.display());
        ended?;
        closed?;
        Ok(())
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    /// Total number of steps in the container.
    pub fn steps(&self) -> usize {
        self.engine.steps()
    }

    pub fn in_step(&self) -> bool {
        self.in_step
    }

    /// The active step, if any.
    pub fn current_step(&self) -> Option<usize> {
        if self.in_step {
            self.last_step
        } else {
            None
        }
    }

    /// Begin the next step.
    ///
    /// Returns [`Error::EndOfStream`] when there are no more steps.
    pub fn begin_step(&mut self) -> Result<usize> {
        if self.in_step {
            return Err(Error::StepOrder(format!(
                "step {:?} is already active",
                self.last_step
            )));
        }

        let step = match self.mode {
            Mode::ReadRandomAccess => {
                let next = self.last_step.map_or(0, |s| s + 1);
                if next >= self.steps() {
                    return Err(Error::EndOfStream);
                }
                next
            }
            Mode::Read | Mode::Write => match self.engine.begin_step()? {
                StepStatus::Ok => self.engine.current_step(),
                StepStatus::EndOfStream => return Err(Error::EndOfStream),
                status => {
                    return Err(Error::Engine(anyhow!(
                        "begin_step failed with status {status:?}"
                    )))
                }
            },
        };

        self.last_step = Some(step);
        self.in_step = true;

        debug!("{}: begin step {step}", self.path.display());
        Ok(step)
    }

    pub fn end_step(&mut self) -> Result<()> {
        if !self.in_step {
            return Err(Error::StepOrder("no active step".into()));
        }

        if self.mode != Mode::ReadRandomAccess {
            self.engine.end_step()?;
        }
        self.in_step = false;

        debug!("{}: end step {:?}", self.path.display(), self.last_step);
        Ok(())
    }

    /// Iterate over the remaining steps.
    pub fn iter_steps(&mut self) -> Steps<'_> {
        Steps::new(self)
    }

    /// Begin the next step, call `f` with it and end the step again.
    pub fn next_step<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Step<'_>) -> Result<R>,
    {
        let index = self.begin_step()?;
        let r = f(&mut Step::new(self, index));
        let end = self.end_step();

        let r = r?;
        end?;
        Ok(r)
    }

    /// Select a step by index, only in random access mode.
    pub fn step(&mut self, index: usize) -> Result<Step<'_>> {
        if self.mode != Mode::ReadRandomAccess {
            return Err(Error::InvalidMode(format!(
                "selecting steps by index is only supported in mode {}, not {}",
                Mode::ReadRandomAccess,
                self.mode
            )));
        }

        let steps = self.steps();
        if index >= steps {
            return Err(Error::InvalidIndex(format!(
                "step {index} is out of range, {steps} steps available"
            )));
        }

        Ok(Step::new(self, index))
    }

    /// Declaration of variable `name`, without reading any data.
    pub fn describe(&self, name: &str) -> Result<VariableInfo> {
        self.engine
            .inquire_variable(name)
            .ok_or_else(|| Error::NotFound(format!("variable {name}")))
    }

    /// Names of the variables in the container.
    pub fn variables(&self) -> Vec<String> {
        self.engine
            .available_variables()
            .into_iter()
            .map(|v| v.name)
            .collect()
    }

    /// Variable `name` over all steps, the step is the first dimension.
    pub fn variable(&self, name: &str) -> Result<Variable<'_>> {
        self.ensure_read()?;
        let info = self.describe(name)?;
        Ok(Variable::new(self, info, StepBinding::All))
    }

    pub fn attrs(&self) -> Attrs<'_> {
        Attrs::new(self, None)
    }

    pub fn attrs_mut(&mut self) -> AttrsMut<'_> {
        AttrsMut::new(self, None)
    }

    /// Attributes of variable `name`, which need not be defined yet.
    pub fn variable_attrs_mut(&mut self, name: &str) -> AttrsMut<'_> {
        AttrsMut::new(self, Some(name))
    }

    /// Write `data` to variable `name` in the active step.
    ///
    /// The variable is defined with the shape and datatype of `data` the first
    /// time it is written, later writes must match both.
    pub fn write<T, S, D>(&mut self, name: &str, data: &ArrayBase<S, D>) -> Result<()>
    where
        T: Element,
        S: Data<Elem = T>,
        D: Dimension,
    {
        if self.mode != Mode::Write {
            return Err(Error::InvalidMode(format!(
                "cannot write variables in mode {}",
                self.mode
            )));
        }

        if !self.in_step {
            return Err(Error::StepOrder(
                "data needs to be written inside an active step".into(),
            ));
        }

        let shape = data.shape();

        match self.engine.inquire_variable(name) {
            Some(info) => {
                if info.dtype != T::DATATYPE {
                    return Err(Error::Datatype {
                        expected: info.dtype,
                        found: T::DATATYPE,
                    });
                }
                if info.shape != shape {
                    return Err(Error::Shape {
                        name: name.to_string(),
                        expected: info.shape,
                        found: shape.to_vec(),
                    });
                }
            }
            None => {
                self.engine.define_variable(name, T::DATATYPE, shape)?;
                debug!("defined {name}: {} {shape:?}", T::DATATYPE);
            }
        }

        let data = data.as_standard_layout();
        let values = data
            .as_slice()
            .ok_or_else(|| anyhow!("array is not in standard layout"))?;

        self.engine.put(name, values.as_byte_slice())?;
        Ok(())
    }

    fn ensure_read(&self) -> Result<()> {
        if self.mode.is_read() {
            Ok(())
        } else {
            Err(Error::InvalidMode(format!(
                "cannot read variables in mode {}",
                self.mode
            )))
        }
    }

    /// Number of steps as seen by the step dimension of a variable.
    pub(crate) fn step_extent(&self) -> usize {
        match self.current_step() {
            Some(current) if self.mode == Mode::Read => self.steps().max(current + 1),
            _ => self.steps(),
        }
    }

    /// Only the active step can be read in streaming mode.
    fn check_step_selection(&self, selection: &Selection) -> Result<()> {
        match self.mode {
            Mode::ReadRandomAccess => Ok(()),
            _ => match self.current_step() {
                Some(current) if selection.step == (current, 1) => Ok(()),
                _ => Err(Error::StepOrder(
                    "trying to access non-current step in streaming mode".into(),
                )),
            },
        }
    }

    pub(crate) fn read<T: Element>(&self, info: &VariableInfo, expr: &Expr) -> Result<ArrayD<T>> {
        self.ensure_read()?;

        if info.dtype != T::DATATYPE {
            return Err(Error::Datatype {
                expected: info.dtype,
                found: T::DATATYPE,
            });
        }

        let dims: Vec<usize> = std::iter::once(self.step_extent())
            .chain(info.shape.iter().copied())
            .collect();
        let translation = translate(&dims, expr)?;
        self.check_step_selection(&translation.selection)?;

        trace!(
            "read {}{expr}: {:?} -> {:?}",
            info.name,
            translation.selection,
            translation.shape
        );

        let mut buf = vec![T::default(); translation.selection.len()];
        self.engine
            .get(&info.name, &translation.selection, buf.as_mut_byte_slice())?;

        ArrayD::from_shape_vec(IxDyn(&translation.shape), buf)
            .map_err(|e| Error::Engine(e.into()))
    }

    pub(crate) fn read_any(&self, info: &VariableInfo, expr: &Expr) -> Result<AnyArray> {
        use Datatype::*;

        Ok(match info.dtype {
            Int8 => AnyArray::Int8(self.read(info, expr)?),
            Int16 => AnyArray::Int16(self.read(info, expr)?),
            Int32 => AnyArray::Int32(self.read(info, expr)?),
            Int64 => AnyArray::Int64(self.read(info, expr)?),
            UInt8 => AnyArray::UInt8(self.read(info, expr)?),
            UInt16 => AnyArray::UInt16(self.read(info, expr)?),
            UInt32 => AnyArray::UInt32(self.read(info, expr)?),
            UInt64 => AnyArray::UInt64(self.read(info, expr)?),
            Float32 => AnyArray::Float32(self.read(info, expr)?),
            Float64 => AnyArray::Float64(self.read(info, expr)?),
        })
    }

    pub(crate) fn read_attribute(&self, name: &str, variable: Option<&str>) -> Result<Attribute> {
        self.engine
            .inquire_attribute(&attribute::attribute_key(name, variable))
            .ok_or_else(|| attribute::not_found(name, variable))
    }

    pub(crate) fn write_attribute(
        &mut self,
        name: &str,
        value: Attribute,
        variable: Option<&str>,
    ) -> Result<()> {
        if self.mode != Mode::Write {
            return Err(Error::InvalidMode(format!(
                "cannot write attributes in mode {}",
                self.mode
            )));
        }

        let key = attribute::attribute_key(name, variable);
        if self.engine.inquire_attribute(&key).as_ref() == Some(&value) {
            trace!("attribute {key} unchanged");
            return Ok(());
        }

        self.engine.define_attribute(&key, value)?;
        Ok(())
    }
}

impl Lookup for File {
    fn lookup(&self, name: &str) -> Result<Variable<'_>> {
        self.variable(name)
    }

    fn keys(&self) -> Vec<String> {
        self.variables()
    }
}

impl Drop for File {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close_impl() {
                warn!("failed to close {}: {e}", self.path.display());
            }
        }
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("current_step", &self.current_step())
            .finish()
    }
}
