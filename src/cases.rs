use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::errors::{FastError, Result};
use crate::naming;
use crate::registry::CaseSource;
use crate::types::{BenchmarkCase, Value};

/// The cases of one benchmark run, generated on first use and cached.
///
/// Every input file written through the set is removed when it is cleaned or
/// dropped, whichever path the run takes. [`CaseSet::persist`] keeps them.
pub struct CaseSet<'a> {
    source: &'a dyn CaseSource,
    workdir: PathBuf,
    cases: BTreeMap<usize, BenchmarkCase>,
    instances: usize,
    constant_payload: Option<String>,
    written: Vec<PathBuf>,
}

impl<'a> CaseSet<'a> {
    pub fn new(source: &'a dyn CaseSource, workdir: &Path) -> Self {
        CaseSet {
            source,
            workdir: workdir.to_path_buf(),
            cases: BTreeMap::new(),
            instances: source.definition().instances,
            constant_payload: None,
            written: Vec::new(),
        }
    }

    /// Overrides the number of cases in a full pass.
    pub fn with_instances(mut self, instances: usize) -> Self {
        self.instances = instances;
        self
    }

    pub fn benchmark(&self) -> &str {
        self.source.name()
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Number of cases in a full pass.
    pub fn len(&self) -> usize {
        self.instances
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Case `index` (1-based), generating its input file on first request.
    pub fn case(&mut self, index: usize) -> Result<&BenchmarkCase> {
        if index == 0 {
            return Err(FastError::InvalidArgument {
                detail: format!("Case index must start at 1 (benchmark {})", self.benchmark()),
            });
        }
        if !self.cases.contains_key(&index) {
            let case = self.generate(index)?;
            self.cases.insert(index, case);
        }
        Ok(&self.cases[&index])
    }

    /// All cases `1..=len()`, in order. Clones are cheap relative to a process spawn.
    pub fn all(&mut self) -> Result<Vec<BenchmarkCase>> {
        (1..=self.len())
            .map(|i| self.case(i).cloned())
            .collect()
    }

    fn generate(&mut self, index: usize) -> Result<BenchmarkCase> {
        let argv = self.source.generate_args(index)?;
        let args: Vec<Value> = argv.iter().map(|a| Value::parse(a)).collect();
        let label = self.source.label_for(index, &args);

        if !is_valid_label(&label) {
            return Err(FastError::InvalidArgument {
                detail: format!(
                    "Case {} of benchmark {} has label '{}'; labels must be non-empty, without whitespace or path separators",
                    index,
                    self.benchmark(),
                    label
                ),
            });
        }
        if let Some(other) = self.cases.values().find(|c| c.label == label) {
            return Err(FastError::InvalidArgument {
                detail: format!(
                    "Cases {} and {} of benchmark {} share the label '{}'",
                    other.index,
                    index,
                    self.benchmark(),
                    label
                ),
            });
        }

        let payload = if self.source.definition().constant_input {
            match &self.constant_payload {
                Some(p) => p.clone(),
                None => {
                    let p = self.source.generate_input(index, &label)?;
                    self.constant_payload = Some(p.clone());
                    p
                }
            }
        } else {
            self.source.generate_input(index, &label)?
        };

        let path = self
            .workdir
            .join(naming::input_file(self.benchmark(), &label));
        std::fs::write(&path, payload).map_err(|e| FastError::io(&path, e))?;
        trace!("Generated {}", path.display());
        self.written.push(path.clone());

        Ok(BenchmarkCase {
            index,
            label,
            argv,
            args,
            input: path,
        })
    }

    /// Removes every input file written so far and forgets the cache.
    pub fn clean(&mut self) {
        for path in self.written.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => trace!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => debug!("Could not remove {}: {}", path.display(), e),
            }
        }
        self.cases.clear();
        self.constant_payload = None;
    }

    /// Keeps the written files on disk and returns their paths.
    pub fn persist(mut self) -> Vec<PathBuf> {
        self.cases.clear();
        std::mem::take(&mut self.written)
    }
}

/// Labels become part of file names and the first column of `.stats` rows.
pub fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && !label
            .chars()
            .any(|c| c.is_whitespace() || c == '/' || c == '\\')
        && label != "."
        && label != ".."
}

impl Drop for CaseSet<'_> {
    fn drop(&mut self) {
        self.clean();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BenchmarkDefinition;
    use std::cell::Cell;
    use std::fs;

    struct Counting {
        def: BenchmarkDefinition,
        calls: Cell<usize>,
        fixed_label: Option<&'static str>,
    }

    impl Counting {
        fn new(instances: usize, constant: bool) -> Self {
            Counting {
                def: BenchmarkDefinition {
                    name: "count".to_string(),
                    target: "count".to_string(),
                    candidates: vec![],
                    instances,
                    executions: 1,
                    xlabel: "Input".to_string(),
                    constant_input: constant,
                    diff_script: None,
                },
                calls: Cell::new(0),
                fixed_label: None,
            }
        }
    }

    impl CaseSource for Counting {
        fn definition(&self) -> &BenchmarkDefinition {
            &self.def
        }

        fn generate_input(&self, case: usize, label: &str) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            Ok(format!("{} {}\n", case, label))
        }

        fn generate_args(&self, case: usize) -> Result<Vec<String>> {
            Ok(vec![format!("{:02}", case * 10)])
        }

        fn label_for(&self, case: usize, _args: &[Value]) -> String {
            match self.fixed_label {
                Some(label) => label.to_string(),
                None => case.to_string(),
            }
        }
    }

    #[test]
    fn generates_named_files_lazily_and_caches() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let source = Counting::new(3, false);
        let mut set = CaseSet::new(&source, tmp.path());

        let first = set.case(2).unwrap().clone();
        assert_eq!(first.label, "2");
        assert_eq!(first.argv, ["20"]);
        assert_eq!(first.args, vec![Value::Int(20)]);
        assert_eq!(first.input, tmp.path().join("count_2.in"));
        assert_eq!(fs::read_to_string(&first.input).unwrap(), "2 2\n");

        let again = set.case(2).unwrap().clone();
        assert_eq!(first, again);
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn all_returns_cases_in_order() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let source = Counting::new(4, false);
        let mut set = CaseSet::new(&source, tmp.path());

        let labels: Vec<String> = set.all().unwrap().into_iter().map(|c| c.label).collect();
        assert_eq!(labels, ["1", "2", "3", "4"]);
        // Second pass shares the generated inputs.
        set.all().unwrap();
        assert_eq!(source.calls.get(), 4);
    }

    #[test]
    fn regeneration_after_clean_is_identical() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let source = Counting::new(2, false);
        let mut set = CaseSet::new(&source, tmp.path());

        let a = set.case(1).unwrap().clone();
        let a_content = fs::read(&a.input).unwrap();
        set.clean();
        assert!(!a.input.exists());

        let b = set.case(1).unwrap().clone();
        assert_eq!(a.input, b.input);
        assert_eq!(a_content, fs::read(&b.input).unwrap());
    }

    #[test]
    fn constant_input_generated_once() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let source = Counting::new(3, true);
        let mut set = CaseSet::new(&source, tmp.path());

        let cases = set.all().unwrap();
        assert_eq!(source.calls.get(), 1);
        for case in &cases {
            assert_eq!(fs::read_to_string(&case.input).unwrap(), "1 1\n");
        }
    }

    #[test]
    fn drop_removes_input_files() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let source = Counting::new(3, false);
        let paths: Vec<PathBuf> = {
            let mut set = CaseSet::new(&source, tmp.path());
            set.all().unwrap().into_iter().map(|c| c.input).collect()
        };
        assert_eq!(paths.len(), 3);
        assert!(paths.iter().all(|p| !p.exists()));
    }

    #[test]
    fn persist_keeps_files() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let source = Counting::new(2, false);
        let mut set = CaseSet::new(&source, tmp.path());
        set.case(1).unwrap();
        let kept = set.persist();
        assert_eq!(kept, vec![tmp.path().join("count_1.in")]);
        assert!(kept[0].exists());
    }

    #[test]
    fn duplicate_labels_rejected() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let mut source = Counting::new(2, false);
        source.fixed_label = Some("x");
        let mut set = CaseSet::new(&source, tmp.path());
        set.case(1).unwrap();
        assert!(matches!(set.case(2), Err(FastError::InvalidArgument { .. })));
    }

    #[test]
    fn unsafe_labels_rejected() {
        let tmp = assert_fs::TempDir::new().unwrap();
        for label in ["", "size 1", "a\tb", "../escaped1", "sub/1", ".."] {
            let mut source = Counting::new(1, false);
            source.fixed_label = Some(label);
            let mut set = CaseSet::new(&source, tmp.path());
            match set.case(1) {
                Err(FastError::InvalidArgument { detail }) => {
                    assert!(detail.contains("count"), "{}", detail);
                }
                other => panic!("label {:?} accepted: {:?}", label, other),
            }
            assert_eq!(source.calls.get(), 0);
        }
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn label_alphabet() {
        assert!(is_valid_label("500"));
        assert!(is_valid_label("0.25"));
        assert!(is_valid_label("-3"));
        assert!(!is_valid_label("a b"));
        assert!(!is_valid_label("a/b"));
        assert!(!is_valid_label(""));
    }

    #[test]
    fn instance_override() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let source = Counting::new(5, false);
        let mut set = CaseSet::new(&source, tmp.path()).with_instances(2);
        assert_eq!(set.len(), 2);
        assert_eq!(set.all().unwrap().len(), 2);
    }

    #[test]
    fn index_zero_rejected() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let source = Counting::new(2, false);
        let mut set = CaseSet::new(&source, tmp.path());
        assert!(set.case(0).is_err());
    }
}
