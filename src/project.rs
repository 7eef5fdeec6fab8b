//! Project registry
//!
//! Each project is one YAML file in the projects directory:
//!
//! ```yaml
//! name: shop
//! title: Shop API
//! projectRoot: /srv/shop
//! entryPoint: public/index.php
//! tests:
//!   scenariosDir: tests/shop/scenarios
//!   routesDir: tests/shop/routes
//! env:
//!   APP_ENV: test
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::common::{paths, Error, Result};
use crate::target::TargetSpec;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(alias = "path", skip_serializing_if = "Option::is_none")]
    project_root: Option<PathBuf>,
    #[serde(alias = "entry", skip_serializing_if = "Option::is_none")]
    entry_point: Option<PathBuf>,
    #[serde(default)]
    tests: TestsSection,
    #[serde(default)]
    env: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "ServerSection::is_empty")]
    server: ServerSection,
    #[serde(skip_serializing_if = "Option::is_none")]
    added_at: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct TestsSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    scenarios_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    routes_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ServerSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<Vec<String>>,
}

impl ServerSection {
    fn is_empty(&self) -> bool {
        self.command.is_none()
    }
}

/// A configured system under test
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub name: String,
    pub title: String,
    pub root: PathBuf,
    pub entry: Option<PathBuf>,
    pub scenarios_dir: Option<PathBuf>,
    pub routes_dir: Option<PathBuf>,
    /// Exported to CLI steps through the context
    pub env: IndexMap<String, Value>,
    pub server_command: Option<Vec<String>>,
}

impl Project {
    /// `tests.scenariosDir` from the working directory, else `<root>/scenarios`
    pub fn scenarios_path(&self) -> PathBuf {
        match &self.scenarios_dir {
            Some(dir) => paths::resolve(dir),
            None => self.root.join("scenarios"),
        }
    }

    pub fn target(&self) -> TargetSpec {
        TargetSpec {
            name: self.name.clone(),
            root: self.root.clone(),
            entry: self.entry.clone(),
            command: self.server_command.clone(),
        }
    }
}

/// All projects found in a directory, by name
#[derive(Debug, Default)]
pub struct ProjectRegistry {
    projects: BTreeMap<String, Project>,
}

impl ProjectRegistry {
    /// Load every `*.yaml` in `dir`; a missing directory is an empty registry
    pub fn load(dir: &Path) -> Result<Self> {
        let mut projects = BTreeMap::new();
        if !dir.is_dir() {
            return Ok(Self { projects });
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect();
        files.sort();

        for file in files {
            if let Some(project) = load_project(&file)? {
                projects.insert(project.name.clone(), project);
            }
        }
        Ok(Self { projects })
    }

    /// Projects sorted by name
    pub fn all(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn get(&self, name: &str) -> Option<&Project> {
        self.projects.get(name)
    }

    /// Like [`get`](Self::get) but a missing project is an error
    pub fn require(&self, name: &str) -> Result<&Project> {
        self.get(name)
            .ok_or_else(|| Error::ProjectNotFound(name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

fn load_project(file: &Path) -> Result<Option<Project>> {
    let content = std::fs::read_to_string(file).map_err(|e| Error::file_read(file, e))?;
    let data: ProjectFile = serde_yaml::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse project file '{}': {}",
            file.display(),
            e
        ))
    })?;

    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let name = data.name.unwrap_or_else(|| stem.to_string());
    let Some(root) = data.project_root.filter(|p| !p.as_os_str().is_empty()) else {
        warn!(file = %file.display(), "Project file has no projectRoot, skipping");
        return Ok(None);
    };
    if name.is_empty() {
        return Ok(None);
    }

    Ok(Some(Project {
        title: data.title.unwrap_or_else(|| name.clone()),
        name,
        root,
        entry: data.entry_point,
        scenarios_dir: data.tests.scenarios_dir,
        routes_dir: data.tests.routes_dir,
        env: data.env,
        server_command: data.server.command,
    }))
}

/// Arguments for [`add_project`]
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub path: PathBuf,
    pub title: Option<String>,
    pub entry: Option<PathBuf>,
    pub force: bool,
}

/// Default entry point written for new projects
pub const DEFAULT_ENTRY: &str = "public/index.php";

/// Write a project file into `projects_dir` and scaffold `tests_root/<name>`
///
/// Returns the path of the written project file.
pub fn add_project(projects_dir: &Path, tests_root: &Path, new: &NewProject) -> Result<PathBuf> {
    if new.name.trim().is_empty() || paths::sanitize(&new.name) != new.name {
        return Err(Error::Config(format!(
            "Invalid project name '{}': use letters, digits, '-' and '_'",
            new.name
        )));
    }
    if !new.path.is_dir() {
        return Err(Error::Config(format!(
            "Project path is not a directory: {}",
            new.path.display()
        )));
    }
    let root = new.path.canonicalize()?;

    let config_file = projects_dir.join(format!("{}.yaml", new.name));
    if config_file.exists() && !new.force {
        return Err(Error::ProjectExists(new.name.clone()));
    }

    let tests_dir = tests_root.join(&new.name);
    for sub in ["scenarios", "routes"] {
        let dir = paths::ensure_dir(&tests_dir.join(sub))?;
        let keep = dir.join(".gitkeep");
        if !keep.exists() {
            std::fs::write(&keep, "")?;
        }
    }

    let relative_tests = Path::new("tests").join(&new.name);
    let data = ProjectFile {
        name: Some(new.name.clone()),
        title: Some(new.title.clone().unwrap_or_else(|| new.name.clone())),
        project_root: Some(root),
        entry_point: Some(
            new.entry
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ENTRY)),
        ),
        tests: TestsSection {
            scenarios_dir: Some(relative_tests.join("scenarios")),
            routes_dir: Some(relative_tests.join("routes")),
        },
        env: IndexMap::new(),
        server: ServerSection::default(),
        added_at: Some(chrono::Local::now().to_rfc3339()),
    };

    paths::ensure_dir(projects_dir)?;
    std::fs::write(&config_file, serde_yaml::to_string(&data)?)?;
    Ok(config_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_projects() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("shop.yaml"),
            r#"
title: Shop API
path: /srv/shop
entry: web/index.php
tests:
  scenariosDir: tests/shop/scenarios
env:
  APP_ENV: test
server:
  command: ["python3", "-m", "http.server", "{port}"]
"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken-root.yaml"), "title: No root\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = ProjectRegistry::load(dir.path()).unwrap();
        let names: Vec<&str> = registry.all().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["shop"]);

        let shop = registry.require("shop").unwrap();
        assert_eq!(shop.title, "Shop API");
        assert_eq!(shop.root, PathBuf::from("/srv/shop"));
        assert_eq!(shop.entry, Some(PathBuf::from("web/index.php")));
        assert_eq!(shop.env["APP_ENV"], json!("test"));
        assert!(shop.scenarios_path().ends_with("tests/shop/scenarios"));
        assert_eq!(shop.target().command.unwrap()[0], "python3");

        assert!(matches!(
            registry.require("blog"),
            Err(Error::ProjectNotFound(_))
        ));
    }

    #[test]
    fn test_default_scenarios_path() {
        let project = Project {
            name: "blog".into(),
            title: "blog".into(),
            root: PathBuf::from("/srv/blog"),
            entry: None,
            scenarios_dir: None,
            routes_dir: None,
            env: IndexMap::new(),
            server_command: None,
        };
        assert_eq!(project.scenarios_path(), PathBuf::from("/srv/blog/scenarios"));
    }

    #[test]
    fn test_add_project_round_trip() {
        let work = tempfile::tempdir().unwrap();
        let app = work.path().join("app");
        std::fs::create_dir_all(&app).unwrap();
        let projects_dir = work.path().join("config/projects");
        let tests_root = work.path().join("tests");

        let new = NewProject {
            name: "shop".into(),
            path: app.clone(),
            title: Some("Shop".into()),
            entry: None,
            force: false,
        };
        let file = add_project(&projects_dir, &tests_root, &new).unwrap();
        assert!(file.exists());
        assert!(tests_root.join("shop/scenarios/.gitkeep").exists());
        assert!(tests_root.join("shop/routes/.gitkeep").exists());

        let registry = ProjectRegistry::load(&projects_dir).unwrap();
        let shop = registry.require("shop").unwrap();
        assert_eq!(shop.title, "Shop");
        assert_eq!(shop.root, app.canonicalize().unwrap());
        assert_eq!(shop.entry, Some(PathBuf::from(DEFAULT_ENTRY)));

        let again = add_project(&projects_dir, &tests_root, &new).unwrap_err();
        assert!(matches!(again, Error::ProjectExists(_)));

        let forced = NewProject { force: true, ..new };
        add_project(&projects_dir, &tests_root, &forced).unwrap();
    }

    #[test]
    fn test_add_project_rejects_bad_input() {
        let work = tempfile::tempdir().unwrap();
        let new = NewProject {
            name: "shop".into(),
            path: work.path().join("missing"),
            title: None,
            entry: None,
            force: false,
        };
        assert!(add_project(work.path(), work.path(), &new).is_err());

        let new = NewProject {
            name: "../evil".into(),
            path: work.path().to_path_buf(),
            ..new
        };
        assert!(add_project(work.path(), work.path(), &new).is_err());
    }
}
