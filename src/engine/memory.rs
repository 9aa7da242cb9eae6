//! An in-memory engine.
//!
//! Containers live in a [`MemoryBackend`] keyed by path. A writer stores its
//! steps directly in the shared container, while readers work on a snapshot
//! taken when they are opened.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use itertools::izip;
use parking_lot::Mutex;

use super::{Backend, Engine, Mode, StepStatus, VariableInfo};
use crate::attribute::Attribute;
use crate::index::Selection;
use crate::types::Datatype;

#[derive(Debug, Clone)]
struct StoredVariable {
    info: VariableInfo,
    /// Data of each step the variable was written in.
    data: BTreeMap<usize, Vec<u8>>,
}

#[derive(Debug, Default, Clone)]
struct Container {
    variables: BTreeMap<String, StoredVariable>,
    attributes: BTreeMap<String, Attribute>,
    steps: usize,
}

/// Containers kept in memory, shared between all engines opened from clones
/// of the same backend.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    containers: Arc<Mutex<HashMap<PathBuf, Arc<Mutex<Container>>>>>,
}

impl MemoryBackend {
    pub fn new() -> MemoryBackend {
        MemoryBackend::default()
    }

    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        self.containers.lock().contains_key(path.as_ref())
    }

    pub fn remove<P: AsRef<Path>>(&self, path: P) -> bool {
        self.containers.lock().remove(path.as_ref()).is_some()
    }
}

impl Backend for MemoryBackend {
    fn open(&self, path: &Path, mode: Mode) -> Result<Box<dyn Engine>, anyhow::Error> {
        let container = match mode {
            Mode::Write => {
                let container = Arc::new(Mutex::new(Container::default()));
                self.containers
                    .lock()
                    .insert(path.to_path_buf(), Arc::clone(&container));
                Store::Shared(container)
            }
            Mode::Read | Mode::ReadRandomAccess => {
                let containers = self.containers.lock();
                let container = containers
                    .get(path)
                    .ok_or_else(|| anyhow!("no such container: {}", path.display()))?;
                let snapshot = container.lock().clone();
                Store::Snapshot(snapshot)
            }
        };

        debug!("memory engine: opened {} in mode {mode}", path.display());

        Ok(Box::new(MemoryEngine {
            name: path.display().to_string(),
            mode,
            store: container,
            step: None,
            next_step: 0,
            closed: false,
        }))
    }
}

#[derive(Debug)]
enum Store {
    Shared(Arc<Mutex<Container>>),
    Snapshot(Container),
}

impl Store {
    fn with<R>(&self, f: impl FnOnce(&Container) -> R) -> R {
        match self {
            Store::Shared(c) => f(&c.lock()),
            Store::Snapshot(c) => f(c),
        }
    }

    fn with_mut<R>(&mut self, f: impl FnOnce(&mut Container) -> R) -> R {
        match self {
            Store::Shared(c) => f(&mut c.lock()),
            Store::Snapshot(c) => f(c),
        }
    }
}

/// Engine for one container of a [`MemoryBackend`].
#[derive(Debug)]
pub struct MemoryEngine {
    name: String,
    mode: Mode,
    store: Store,
    /// Active step.
    step: Option<usize>,
    next_step: usize,
    closed: bool,
}

impl MemoryEngine {
    fn ensure_open(&self) -> Result<(), anyhow::Error> {
        ensure!(!self.closed, "engine for {} is closed", self.name);
        Ok(())
    }

    fn ensure_write(&self) -> Result<(), anyhow::Error> {
        self.ensure_open()?;
        ensure!(
            self.mode == Mode::Write,
            "{} is not opened for writing",
            self.name
        );
        Ok(())
    }

    fn commit_step(&mut self) {
        if let Some(step) = self.step.take() {
            self.store.with_mut(|c| c.steps = step + 1);
            debug!("memory engine: committed step {step} of {}", self.name);
        }
    }
}

impl Engine for MemoryEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn inquire_variable(&self, name: &str) -> Option<VariableInfo> {
        self.store
            .with(|c| c.variables.get(name).map(|v| v.info.clone()))
    }

    fn available_variables(&self) -> Vec<VariableInfo> {
        self.store
            .with(|c| c.variables.values().map(|v| v.info.clone()).collect())
    }

    fn define_variable(
        &mut self,
        name: &str,
        dtype: Datatype,
        shape: &[usize],
    ) -> Result<VariableInfo, anyhow::Error> {
        self.ensure_write()?;

        let info = VariableInfo::new(name, dtype, shape);
        self.store.with_mut(|c| {
            ensure!(
                !c.variables.contains_key(name),
                "variable {name} is already defined"
            );
            c.variables.insert(
                name.to_string(),
                StoredVariable {
                    info: info.clone(),
                    data: BTreeMap::new(),
                },
            );
            Ok(())
        })?;

        Ok(info)
    }

    fn begin_step(&mut self) -> Result<StepStatus, anyhow::Error> {
        self.ensure_open()?;
        ensure!(self.step.is_none(), "step {:?} is still active", self.step);

        match self.mode {
            Mode::ReadRandomAccess => {
                Err(anyhow!("steps can not be begun in random access mode"))
            }
            Mode::Read => {
                if self.next_step >= self.steps() {
                    return Ok(StepStatus::EndOfStream);
                }
                self.step = Some(self.next_step);
                self.next_step += 1;
                Ok(StepStatus::Ok)
            }
            Mode::Write => {
                self.step = Some(self.steps());
                Ok(StepStatus::Ok)
            }
        }
    }

    fn end_step(&mut self) -> Result<(), anyhow::Error> {
        self.ensure_open()?;
        ensure!(self.step.is_some(), "no active step");

        match self.mode {
            Mode::Write => self.commit_step(),
            _ => self.step = None,
        }

        Ok(())
    }

    fn current_step(&self) -> usize {
        self.step.unwrap_or(self.next_step.saturating_sub(1))
    }

    fn steps(&self) -> usize {
        self.store.with(|c| c.steps)
    }

    fn get(&self, name: &str, selection: &Selection, dst: &mut [u8]) -> Result<(), anyhow::Error> {
        self.ensure_open()?;
        ensure!(self.mode.is_read(), "{} is not opened for reading", self.name);

        trace!("memory engine: get {name} {selection:?}");

        let (step_start, step_count) = selection.step;

        if self.mode == Mode::Read {
            ensure!(
                self.step.is_some() && selection.step == (self.current_step(), 1),
                "only the current step can be read in streaming mode"
            );
        }

        self.store.with(|c| {
            let var = c
                .variables
                .get(name)
                .ok_or_else(|| anyhow!("variable {name} not found"))?;
            let info = &var.info;
            let dsize = info.dtype.size();

            ensure!(
                step_start + step_count <= c.steps,
                "steps {step_start}..{} out of range, {} steps available",
                step_start + step_count,
                c.steps
            );
            ensure!(
                selection.block.len() == info.shape.len(),
                "selection has {} dimensions, variable {name} has {}",
                selection.block.len(),
                info.shape.len()
            );
            ensure!(
                izip!(&selection.block, &info.shape).all(|(&(s, n), &d)| s + n <= d),
                "selection {:?} out of bounds for shape {:?}",
                selection.block,
                info.shape
            );
            ensure!(
                dst.len() == selection.len() * dsize,
                "destination buffer has size {}, expected {}",
                dst.len(),
                selection.len() * dsize
            );

            let step_sz = selection.block_len() * dsize;
            if step_sz == 0 {
                return Ok(());
            }

            for (step, dst) in (step_start..step_start + step_count).zip(dst.chunks_exact_mut(step_sz))
            {
                let src = var
                    .data
                    .get(&step)
                    .ok_or_else(|| anyhow!("variable {name} has no data in step {step}"))?;
                copy_block(src, &info.shape, &selection.block, dsize, dst);
            }

            Ok(())
        })
    }

    fn put(&mut self, name: &str, src: &[u8]) -> Result<(), anyhow::Error> {
        self.ensure_write()?;
        let step = self.step.ok_or_else(|| anyhow!("put outside of a step"))?;

        trace!("memory engine: put {name} in step {step}, {} bytes", src.len());

        self.store.with_mut(|c| {
            let var = c
                .variables
                .get_mut(name)
                .ok_or_else(|| anyhow!("variable {name} not defined"))?;
            let expected = var.info.size() * var.info.dtype.size();
            ensure!(
                src.len() == expected,
                "buffer has size {}, variable {name} has {expected} bytes",
                src.len()
            );
            var.data.insert(step, src.to_vec());
            Ok(())
        })
    }

    fn define_attribute(&mut self, name: &str, value: Attribute) -> Result<(), anyhow::Error> {
        self.ensure_write()?;
        self.store.with_mut(|c| c.attributes.insert(name.to_string(), value));
        Ok(())
    }

    fn inquire_attribute(&self, name: &str) -> Option<Attribute> {
        self.store.with(|c| c.attributes.get(name).cloned())
    }

    fn available_attributes(&self) -> Vec<String> {
        self.store.with(|c| c.attributes.keys().cloned().collect())
    }

    fn close(&mut self) -> Result<(), anyhow::Error> {
        self.ensure_open()?;
        if self.mode == Mode::Write {
            self.commit_step();
        }
        self.step = None;
        self.closed = true;
        debug!("memory engine: closed {}", self.name);
        Ok(())
    }
}

/// Copy `block` out of `src`, a C ordered array of `shape` with elements of
/// `dsize` bytes.
fn copy_block(src: &[u8], shape: &[usize], block: &[(usize, usize)], dsize: usize, dst: &mut [u8]) {
    let Some((&(last_start, last_count), outer)) = block.split_last() else {
        // scalar
        dst.copy_from_slice(&src[..dsize]);
        return;
    };

    let nd = shape.len();
    let mut strides = vec![1; nd];
    for d in (0..nd - 1).rev() {
        strides[d] = strides[d + 1] * shape[d + 1];
    }

    let run = last_count * dsize;
    let mut pos = vec![0; outer.len()];

    for dst in dst.chunks_exact_mut(run) {
        let offset = izip!(outer, &pos, &strides)
            .map(|(&(start, _), &p, &stride)| (start + p) * stride)
            .sum::<usize>()
            + last_start;
        let offset = offset * dsize;

        dst.copy_from_slice(&src[offset..offset + run]);

        // advance to the next row
        for d in (0..outer.len()).rev() {
            pos[d] += 1;
            if pos[d] < outer[d].1 {
                break;
            }
            pos[d] = 0;
        }
    }
}
