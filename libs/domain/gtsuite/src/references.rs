//! Stored experiments read back from disk.

use std::path::{Path, PathBuf};

use anyhow::Context;
use gtgguf::{GgufReader, GgufTensor};

/// Content of a stored `.gguf` file.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub path: PathBuf,
    pub description: Option<String>,
    pub name: Option<String>,
    pub tensors: Vec<GgufTensor>,
}

impl Reference {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let reader =
            GgufReader::open(path).with_context(|| format!("Failed to read {:?}", path))?;
        let tensors = reader
            .tensors()
            .with_context(|| format!("Failed to read tensors of {:?}", path))?;
        Ok(Self {
            path: path.to_path_buf(),
            description: reader.description().map(str::to_string),
            name: reader.name().map(str::to_string),
            tensors,
        })
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.path.display())?;
        writeln!(
            f,
            "  description: {}",
            self.description.as_deref().unwrap_or("-")
        )?;
        writeln!(f, "  name: {}", self.name.as_deref().unwrap_or("-"))?;
        for tensor in &self.tensors {
            writeln!(f, "  {} {:?} {:?}", tensor.name, tensor.shape, tensor.data)?;
        }
        Ok(())
    }
}

/// Read every `.gguf` file under `dir`, recursively, sorted by path.
pub fn iterate_gguf_files(dir: impl AsRef<Path>) -> anyhow::Result<Vec<Reference>> {
    let mut paths = Vec::new();
    _collect(dir.as_ref(), &mut paths)?;
    paths.sort();
    log::debug!("{} gguf files found under {:?}", paths.len(), dir.as_ref());
    paths.iter().map(Reference::open).collect()
}

fn _collect(dir: &Path, paths: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to list directory {:?}", dir))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        // symlinks are not followed
        if entry.file_type()?.is_dir() {
            _collect(&path, paths)?;
        } else if path.extension().is_some_and(|ext| ext == "gguf") {
            paths.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use gtgguf::GgufWriter;

    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gtsuite_refs_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_gguf(path: &Path, description: &str) {
        GgufWriter::new("gradient-tracer")
            .add_description(description)
            .add_tensor("result", &[2], &[1.0, 2.0])
            .unwrap()
            .write(path)
            .unwrap();
    }

    #[test]
    fn test_iterate_gguf_files() {
        let dir = temp_dir("iterate");
        std::fs::create_dir_all(dir.join("TS-0002")).unwrap();
        std::fs::create_dir_all(dir.join("TS-0001")).unwrap();
        write_gguf(&dir.join("TS-0002/b.gguf"), "second");
        write_gguf(&dir.join("TS-0001/a.gguf"), "first");
        std::fs::write(dir.join("TS-0001/a.dot"), "digraph {}").unwrap();

        let refs = iterate_gguf_files(&dir).unwrap();

        let descriptions: Vec<_> = refs.iter().map(|r| r.description.as_deref()).collect();
        assert_eq!(descriptions, vec![Some("first"), Some("second")]);
        assert_eq!(refs[0].path, dir.join("TS-0001/a.gguf"));
        assert_eq!(refs[0].name, None);
        assert_eq!(refs[0].tensors[0].data, vec![1.0, 2.0]);
        assert!(refs[0].to_string().contains("description: first"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_iterate_symlink_cycle() {
        let dir = temp_dir("symlink");
        std::fs::create_dir_all(dir.join("TS-0001")).unwrap();
        write_gguf(&dir.join("TS-0001/a.gguf"), "first");
        std::os::unix::fs::symlink(&dir, dir.join("TS-0001/loop")).unwrap();

        let refs = iterate_gguf_files(&dir).unwrap();

        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].path, dir.join("TS-0001/a.gguf"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_iterate_corrupted_file() {
        let dir = temp_dir("corrupted");
        std::fs::write(dir.join("broken.gguf"), b"NOPE").unwrap();

        assert!(iterate_gguf_files(&dir).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_iterate_missing_dir() {
        let dir = std::env::temp_dir().join("gtsuite_refs_missing_dir");

        assert!(iterate_gguf_files(dir).is_err());
    }
}
