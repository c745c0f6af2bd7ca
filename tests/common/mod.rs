#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use csv_blend::{
    loader::{LoadOptions, load_table},
    table::Table,
};
use tempfile::{TempDir, tempdir};

/// Absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Loads a fixture with default options (detected delimiter, UTF-8, header row).
pub fn load_fixture(name: &str) -> Table {
    let bytes = fs::read(fixture_path(name)).expect("read fixture");
    load_table(&bytes, &LoadOptions::default()).expect("load fixture")
}

pub fn load_text(text: &str) -> Table {
    load_table(text.as_bytes(), &LoadOptions::default()).expect("load table")
}

/// Scratch directory for files a test writes; removed on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` to `name` inside the workspace and returns its path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write workspace file");
        path
    }
}
