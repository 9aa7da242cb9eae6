use crate::error::Result;
use crate::variable::Variable;

/// Named access to the variables of a container or a step.
pub trait Lookup {
    /// Look up variable `name`, [`crate::Error::NotFound`] if it does not
    /// exist.
    fn lookup(&self, name: &str) -> Result<Variable<'_>>;

    /// Names of all variables.
    fn keys(&self) -> Vec<String>;

    fn len(&self) -> usize {
        self.keys().len()
    }

    fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    fn contains(&self, name: &str) -> bool {
        self.keys().iter().any(|k| k == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MemoryBackend, Mode};
    use crate::error::Error;
    use crate::file::File;
    use ndarray::arr1;

    fn names<L: Lookup>(l: &L) -> Vec<String> {
        l.keys()
            .iter()
            .map(|k| l.lookup(k).unwrap().to_string())
            .collect()
    }

    #[test]
    fn file_and_step() {
        let b = MemoryBackend::new();
        let mut f = File::open(&b, "l.bp", Mode::Write).unwrap();
        f.next_step(|s| {
            s.write("x", &arr1(&[1u64, 2]))?;
            s.write("y", &arr1(&[1i16]))
        })
        .unwrap();
        f.close().unwrap();

        let mut f = File::open(&b, "l.bp", Mode::ReadRandomAccess).unwrap();
        assert_eq!(f.len(), 2);
        assert!(!f.is_empty());
        assert!(f.contains("y"));
        assert!(!f.contains("z"));
        assert!(matches!(f.lookup("z"), Err(Error::NotFound(_))));
        assert_eq!(
            names(&f),
            [
                "Variable(name=x, shape=[1, 2], dtype=uint64, step=all)",
                "Variable(name=y, shape=[1, 1], dtype=int16, step=all)"
            ]
        );

        let step = f.step(0).unwrap();
        assert_eq!(
            names(&step),
            [
                "Variable(name=x, shape=[2], dtype=uint64, step=0)",
                "Variable(name=y, shape=[1], dtype=int16, step=0)"
            ]
        );
    }

    #[test]
    fn empty() {
        let b = MemoryBackend::new();
        File::open(&b, "e.bp", Mode::Write).unwrap().close().unwrap();

        let f = File::open(&b, "e.bp", Mode::ReadRandomAccess).unwrap();
        assert!(f.is_empty());
        assert_eq!(f.len(), 0);
    }
}
