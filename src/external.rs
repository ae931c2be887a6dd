//! Invocation of the external texture-compression, hashing and coordinate tools.

use std::path::Path;
use std::process::Command;

use crate::error::{BuildResult, BuilderError};

/// A command line for one of the external programs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalTool {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// DDS compression of every `t*.bmp` patch into `out_dir`.
    pub fn dds_compressor(program: &str, patch_dir: &Path, out_dir: &Path) -> Self {
        Self::new(program)
            .arg("-quality_highest")
            .arg("-nmips")
            .arg("12")
            .arg("-dxt3")
            .arg("-Triangle")
            .arg("-file")
            .arg(patch_dir.join("t*.bmp").display().to_string())
            .arg("-outdir")
            .arg(out_dir.display().to_string())
    }

    /// Terrain and forest hash regeneration for an installed landscape.
    pub fn hash_generator(program: &str, landscape: &str) -> Self {
        Self::new(program).arg("-hash").arg(landscape)
    }

    /// Run to completion and return stdout. A missing program or a non-zero
    /// exit status is an error.
    pub fn run(&self) -> BuildResult<String> {
        log::debug!("Running {} {}", self.program, self.args.join(" "));
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| BuilderError::ExternalTool {
                tool: self.program.clone(),
                reason: format!("could not start: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BuilderError::ExternalTool {
                tool: self.program.clone(),
                reason: format!("exited with {}: {}", output.status, stderr.trim()),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
