#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Creates `dir` under the workspace holding the given `(file, contents)` pairs.
    pub fn folder(&self, dir: &str, files: &[(&str, &str)]) -> PathBuf {
        let folder = self.temp_dir.path().join(dir);
        fs::create_dir_all(&folder).expect("create folder");
        for (name, contents) in files {
            self.write(&format!("{dir}/{name}"), contents);
        }
        folder
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.temp_dir.path().join(name)).expect("read workspace file")
    }
}

/// Survey-shaped fixture: two data files sharing `id` and a coded `Q1`.
pub const SURVEY_A: &str = "id,Q1,city\n1,1,Rome\n2,2,Oslo\n3,3,Rome\n4,,Oslo\n";
pub const SURVEY_B: &str = "id,Q1,Q2\n5,2,x\n6,1,y\n";
pub const STRUCTURE: &str =
    "DCM_name,Question,DVG_SUBSET_NM\nsurvey_a.csv,Q1,S1\nsurvey_b,Q1,S1\nsurvey_b,Q2,S2\n";
pub const VALUES: &str = "DVG_SUBSET_NM,DVG_VAL,DVG_LVAL\nS1,1,No\nS1,2,Yes\nS2,x,Ex\n";
