//! Test fixtures for common test scenarios.
//!
//! A [`ProjectFixture`] is a `Wrapsync.toml` plus a set of files, written
//! into a fresh temporary directory on demand.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::core::project::{Project, PROJECT_FILE_NAME};

/// Two modules, one native dependency, one disabled header. Only the
/// `Encoder` descriptor exists on disk (plus the disabled `Legacy` one).
pub const SAMPLE_MANIFEST: &str = r#"
[project]
package_root = "src"
yaml_root = "wrapcfg"

[modules."robot.hal._hal"]
depends = ["native"]
defines = ["HAL_EXPORT 1"]

[modules."robot.hal._hal".headers]
Counter = "Counter.h"
Encoder = "Encoder.h"
Legacy = { header = "Legacy.h", enabled = false }

[modules."robot.motor._motor".headers]
Motor = "Motor.h"

[dependencies.native]
include_dirs = ["third_party/native/include"]
"#;

pub const ENCODER_HEADER: &str = r#"#pragma once

#include "native.h"

namespace robot {

class Encoder {
 public:
  explicit Encoder(int channel);
  int Get() const;
  void Reset();
  int count;

 private:
  int m_raw;
};

}  // namespace robot
"#;

/// Hand-edited descriptor for `Encoder.h`: one rename, `Reset` and
/// `count` not yet listed.
pub const ENCODER_DESCRIPTOR: &str = r#"---

classes:
  robot::Encoder:
    methods:
      Encoder:
      Get:
        rename: get
"#;

pub const COUNTER_HEADER: &str = r#"#pragma once

namespace robot {

enum class CountMode { kUp, kDown };

class Counter {
 public:
  void Increment();
};

}  // namespace robot
"#;

pub const MOTOR_HEADER: &str = r#"#pragma once

namespace robot {

void SetSpeed(double speed);
void SetSpeed(int percent);

}  // namespace robot
"#;

pub const LEGACY_DESCRIPTOR: &str = "---\n\nclasses:\n  robot::Legacy:\n";

/// Fixture for a complete project structure.
#[derive(Debug, Clone)]
pub struct ProjectFixture {
    /// `Wrapsync.toml` content
    pub manifest: String,
    /// Files relative to the project root
    pub files: BTreeMap<PathBuf, String>,
}

impl ProjectFixture {
    pub fn new(manifest: impl Into<String>) -> Self {
        ProjectFixture {
            manifest: manifest.into(),
            files: BTreeMap::new(),
        }
    }

    /// The sample robot project.
    pub fn sample() -> Self {
        ProjectFixture::new(SAMPLE_MANIFEST)
            .file("src/robot/hal/Encoder.h", ENCODER_HEADER)
            .file("src/robot/hal/Counter.h", COUNTER_HEADER)
            .file("src/robot/hal/Legacy.h", "class Legacy {};\n")
            .file("src/robot/motor/Motor.h", MOTOR_HEADER)
            .file("third_party/native/include/native.h", "typedef int native_t;\n")
            .file("wrapcfg/robot/hal/_hal/Encoder.yml", ENCODER_DESCRIPTOR)
            .file("wrapcfg/robot/hal/_hal/Legacy.yml", LEGACY_DESCRIPTOR)
    }

    /// Add a file.
    pub fn file(mut self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.files.insert(path.into(), contents.into());
        self
    }

    /// Write the fixture to a new temporary directory.
    pub fn write(&self) -> TempDir {
        let tmp = TempDir::new().expect("failed to create temp dir");
        std::fs::write(tmp.path().join(PROJECT_FILE_NAME), &self.manifest)
            .expect("failed to write project file");
        for (path, contents) in &self.files {
            let path = tmp.path().join(path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).expect("failed to create fixture dir");
            }
            std::fs::write(&path, contents).expect("failed to write fixture file");
        }
        tmp
    }

    /// Write the fixture and load its project file.
    pub fn load(&self) -> (TempDir, Project) {
        let tmp = self.write();
        let project =
            Project::load(&tmp.path().join(PROJECT_FILE_NAME)).expect("fixture project loads");
        (tmp, project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_fixture_writes_files() {
        let (tmp, project) = ProjectFixture::sample().load();
        assert!(tmp.path().join("src/robot/hal/Encoder.h").is_file());
        assert!(tmp.path().join("wrapcfg/robot/hal/_hal/Legacy.yml").is_file());
        assert_eq!(project.modules().len(), 2);
        assert!(project.invalid_modules().is_empty());
    }
}
