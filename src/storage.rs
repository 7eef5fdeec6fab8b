//! Saved scenario reports
//!
//! Each run gets `<results>/<project>_<scenario>_<YYYYmmdd_HHMMSS>/` with a
//! `result.json` and one `step_<i>_body.{json,txt}` per HTTP step.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::common::{paths, Result};
use crate::scenario::{ScenarioResult, StepOutput};

#[derive(Serialize)]
struct Report<'a> {
    project: &'a str,
    scenario: &'a str,
    result: &'a ScenarioResult,
    ts: String,
}

#[derive(Debug, Clone)]
pub struct RunStorage {
    dir: PathBuf,
}

impl RunStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a report and return the path of its `result.json`
    pub fn save(&self, project: &str, scenario: &str, result: &ScenarioResult) -> Result<PathBuf> {
        let now = chrono::Local::now();
        let base = format!(
            "{}_{}_{}",
            paths::sanitize(project),
            paths::sanitize(scenario),
            now.format("%Y%m%d_%H%M%S")
        );
        let run_dir = self.unique_dir(&base);
        paths::ensure_dir(&run_dir)?;

        let mut result = result.clone();
        for (idx, step) in result.steps.iter_mut().enumerate() {
            let Some(StepOutput::Http(http)) = step.output.as_mut() else {
                continue;
            };
            let (ext, content) = match serde_json::from_str::<serde_json::Value>(&http.body) {
                Ok(parsed) => ("json", serde_json::to_string_pretty(&parsed)?),
                Err(_) => ("txt", http.body.clone()),
            };
            let body_file = run_dir.join(format!("step_{idx}_body.{ext}"));
            std::fs::write(&body_file, content)?;
            http.body_file = Some(body_file.display().to_string());
        }

        let report = Report {
            project,
            scenario,
            result: &result,
            ts: now.to_rfc3339(),
        };
        let file = run_dir.join("result.json");
        std::fs::write(&file, serde_json::to_string_pretty(&report)?)?;
        Ok(file)
    }

    /// Remove every saved report
    pub fn clear(&self) -> Result<usize> {
        if !self.dir.is_dir() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
            removed += 1;
        }
        Ok(removed)
    }

    /// Runs saved within the same second get a numeric suffix
    fn unique_dir(&self, base: &str) -> PathBuf {
        let mut candidate = self.dir.join(base);
        let mut n = 2;
        while candidate.exists() {
            candidate = self.dir.join(format!("{base}_{n}"));
            n += 1;
        }
        candidate
    }
}
