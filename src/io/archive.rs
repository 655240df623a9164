/*
    Regolith, small-body exploration simulation
    Copyright (C) 2024 Regolith contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! The per-run archive: a hierarchical key/value store laid out as a
//! directory tree. A group is a directory, a dataset is one JSON file, and
//! every dataset write goes through a temp file plus rename so a reader
//! never sees a torn value. The per-tick `time` index is written last and
//! acts as the commit record of a tick.

use crate::errors::SimError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Handle on the archive root directory.
pub struct Archive {
    root: PathBuf,
}

impl Archive {
    /// Creates a fresh archive; refuses to clobber an existing one.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, SimError> {
        let root = path.as_ref().to_path_buf();
        if root.exists() {
            return Err(SimError::Archive(format!(
                "{} already exists",
                root.display()
            )));
        }
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Opens an existing archive.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SimError> {
        let root = path.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(SimError::Archive(format!(
                "{} is missing or not an archive",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    /// Opens if present, creates otherwise.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self, SimError> {
        let root = path.as_ref().to_path_buf();
        if root.is_dir() {
            Ok(Self { root })
        } else {
            Self::create(root)
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A (possibly nested) group, e.g. `"simulation_parameters/dumbbell"`.
    pub fn group(&self, name: &str) -> Group {
        Group {
            dir: self.root.join(name),
        }
    }

    /// Writes a dataset directly under the root.
    pub fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SimError> {
        self.group("").write(key, value)
    }

    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<T, SimError> {
        self.group("").read(key)
    }

    /// Whether a group directory exists.
    pub fn has_group(&self, name: &str) -> bool {
        self.root.join(name).is_dir()
    }
}

/// One directory of datasets inside the archive.
pub struct Group {
    dir: PathBuf,
}

impl Group {
    pub fn subgroup(&self, name: &str) -> Group {
        Group {
            dir: self.dir.join(name),
        }
    }

    /// Serializes `value` under `key`, atomically (temp file + rename).
    pub fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SimError> {
        fs::create_dir_all(&self.dir)?;
        let tmp = self.dir.join(format!(".{key}.tmp"));
        let target = self.dir.join(format!("{key}.json"));
        let data = serde_json::to_vec(value)?;
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }

    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<T, SimError> {
        let path = self.dir.join(format!("{key}.json"));
        let data = fs::read(&path).map_err(|e| {
            SimError::Archive(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn has(&self, key: &str) -> bool {
        self.dir.join(format!("{key}.json")).is_file()
    }

    /// Dataset keys of this group, numerically sorted where possible.
    pub fn keys(&self) -> Result<Vec<String>, SimError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(|e| {
            SimError::Archive(format!("cannot list {}: {e}", self.dir.display()))
        })? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stem) = name.strip_suffix(".json") {
                keys.push(stem.to_string());
            }
        }
        keys.sort_by(|a, b| match (a.parse::<i64>(), b.parse::<i64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => a.cmp(b),
        });
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_refuses_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run");
        Archive::create(&path).unwrap();
        assert!(Archive::create(&path).is_err());
        assert!(Archive::open(&path).is_ok());
    }

    #[test]
    fn open_missing_archive_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Archive::open(dir.path().join("nope")).is_err());
    }

    #[test]
    fn float_datasets_roundtrip_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::create(dir.path().join("run")).unwrap();
        let group = archive.group("state");
        let state: Vec<f64> = vec![
            1.495_746_722_510_590,
            1.002_669_66e-6,
            -0.006_129_720_493_607,
            std::f64::consts::PI,
            1e-300,
            -0.0,
        ];
        group.write("42", &state).unwrap();
        let back: Vec<f64> = group.read("42").unwrap();
        assert_eq!(back.len(), state.len());
        for (a, b) in state.iter().zip(&back) {
            assert_eq!(a.to_bits(), b.to_bits(), "float not bit-identical");
        }
    }

    #[test]
    fn keys_sort_numerically() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::create(dir.path().join("run")).unwrap();
        let group = archive.group("state");
        for k in [10, 2, 1, 30, 3] {
            group.write(&k.to_string(), &k).unwrap();
        }
        assert_eq!(group.keys().unwrap(), vec!["1", "2", "3", "10", "30"]);
    }

    #[test]
    fn nested_groups() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::create(dir.path().join("run")).unwrap();
        archive
            .group("simulation_parameters/dumbbell")
            .write("m1", &500.0)
            .unwrap();
        let m1: f64 = archive
            .group("simulation_parameters")
            .subgroup("dumbbell")
            .read("m1")
            .unwrap();
        assert_eq!(m1, 500.0);
        assert!(archive.has_group("simulation_parameters"));
    }
}
