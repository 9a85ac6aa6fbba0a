use mccode_utils::{Error, McResult, PosString};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    process::Command,
};

/// Extensions tried, in order, when looking up the file of a component.
const COMPONENT_EXTENSIONS: [&str; 3] = ["comp", "cmp", "com"];

/// Library sub-directories searched for components, in order.
const LIBRARY_DIRS: [&str; 10] = [
    "sources",
    "optics",
    "samples",
    "monitors",
    "misc",
    "contrib",
    "obsolete",
    "examples",
    "union",
    "sasmodels",
];

/// A Workspace tracks where files referenced by an instrument are looked up.
///
/// # Example
/// When compiling `dir/Test.instr`:
/// ```text
/// DEFINE INSTRUMENT Test()
/// TRACE
/// SEARCH "my_comps"
/// COMPONENT src = Source_simple(..) AT (0, 0, 0) ABSOLUTE
/// END
/// ```
/// `Source_simple` is unknown so the builder asks the workspace for
/// `Source_simple.comp`. The file is searched, in order, in `dir`, in every
/// directory given with `-I`, in `my_comps` (added by `SEARCH` while the
/// instrument is being built), and finally in the library directory and its
/// standard sub-directories.
#[derive(Debug, Default, Clone)]
pub struct Workspace {
    /// Directory of the top-level file.
    pub base: PathBuf,
    /// Directories given on the command line.
    pub user_dirs: Vec<PathBuf>,
    /// Directories added by `SEARCH` statements.
    pub search_dirs: Vec<PathBuf>,
    /// Root of the component library.
    pub lib_path: Option<PathBuf>,
    /// Files that have been `%include`d, to detect inclusion loops.
    included: HashSet<PathBuf>,
}

impl Workspace {
    /// Construct a workspace for the top-level `file`.
    pub fn construct(
        file: &Option<PathBuf>,
        user_dirs: &[PathBuf],
        lib_path: Option<PathBuf>,
    ) -> Self {
        let base = file
            .as_ref()
            .and_then(|f| Self::get_parent(f))
            .unwrap_or_else(|| PathBuf::from("."));
        Workspace {
            base,
            user_dirs: user_dirs.to_vec(),
            search_dirs: Vec::new(),
            lib_path,
            included: HashSet::new(),
        }
    }

    fn get_parent(p: &Path) -> Option<PathBuf> {
        p.parent().map(|parent| {
            if parent.as_os_str().is_empty() {
                PathBuf::from(".")
            } else {
                parent.to_path_buf()
            }
        })
    }

    /// All directories searched, in order.
    pub fn search_path(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.base.clone()];
        dirs.extend(self.user_dirs.iter().cloned());
        dirs.extend(self.search_dirs.iter().cloned());
        if let Some(lib) = &self.lib_path {
            dirs.push(lib.clone());
            dirs.extend(LIBRARY_DIRS.iter().map(|sub| lib.join(sub)));
        }
        dirs
    }

    /// Add a directory from a `SEARCH` statement.
    pub fn add_search_dir(&mut self, dir: PathBuf) {
        if !self.search_dirs.contains(&dir) {
            log::debug!("Adding search directory {}", dir.to_string_lossy());
            self.search_dirs.push(dir);
        }
    }

    /// Look up `name` with no extension guessing.
    pub fn find_file(&self, name: &str) -> Option<PathBuf> {
        let path = Path::new(name);
        if path.is_absolute() {
            return path.exists().then(|| path.to_path_buf());
        }
        self.search_path()
            .into_iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    /// Look up the file defining the component `name`.
    pub fn find_component(&self, name: &str) -> Option<PathBuf> {
        self.search_path().into_iter().find_map(|dir| {
            COMPONENT_EXTENSIONS
                .iter()
                .map(|ext| dir.join(format!("{name}.{ext}")))
                .find(|candidate| candidate.is_file())
        })
    }

    /// Resolve the file of an `%include "file"` of another instrument.
    /// The `.instr` extension is added when missing. Including the same file
    /// twice is an error.
    pub fn resolve_include(&mut self, include: &PosString) -> McResult<PathBuf> {
        let name = include.as_str();
        let path = self
            .find_file(name)
            .or_else(|| self.find_file(&format!("{name}.instr")))
            .ok_or_else(|| {
                Error::fatal(format!(
                    "Cannot find included instrument `{name}' in the search path ({})",
                    self.search_path()
                        .iter()
                        .map(|d| d.to_string_lossy().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
                .with_pos(include)
            })?;
        let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
        if !self.included.insert(canonical) {
            return Err(Error::fatal(format!(
                "Instrument `{}' is included more than once",
                path.to_string_lossy()
            ))
            .with_pos(include));
        }
        Ok(path)
    }

    /// Run a `SHELL` command from the directory of the top-level file and
    /// return its standard output. A failing command is fatal.
    pub fn run_shell(&self, cmd: &PosString) -> McResult<String> {
        log::info!("Running shell command: {cmd}");
        let mut command = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.args(["/C", cmd.as_str()]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", cmd.as_str()]);
            c
        };
        let output =
            command.current_dir(&self.base).output().map_err(|err| {
                Error::fatal(format!(
                    "Could not run SHELL command `{cmd}': {err}"
                ))
                .with_pos(cmd)
            })?;
        if !output.status.success() {
            return Err(Error::fatal(format!(
                "SHELL command `{cmd}' failed ({})",
                output.status
            ))
            .with_pos(cmd));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Handle `SEARCH "dir"` and `SEARCH SHELL "cmd"`. The output of a
    /// command is split on whitespace and every word becomes a directory.
    pub fn search(&mut self, shell: bool, path: &PosString) -> McResult<()> {
        if shell {
            let out = self.run_shell(path)?;
            for dir in out.split_whitespace() {
                self.add_search_dir(PathBuf::from(dir));
            }
        } else {
            let dir = PathBuf::from(path.as_str());
            let dir = if dir.is_relative() {
                self.base.join(dir)
            } else {
                dir
            };
            self.add_search_dir(dir);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_order() {
        let ws = Workspace::construct(
            &Some(PathBuf::from("instr/Test.instr")),
            &[PathBuf::from("user")],
            Some(PathBuf::from("/lib")),
        );
        let path = ws.search_path();
        assert_eq!(path[0], PathBuf::from("instr"));
        assert_eq!(path[1], PathBuf::from("user"));
        assert_eq!(path[2], PathBuf::from("/lib"));
        assert_eq!(path[3], PathBuf::from("/lib/sources"));
    }

    #[test]
    fn bare_file_name_uses_current_directory() {
        let ws = Workspace::construct(
            &Some(PathBuf::from("Test.instr")),
            &[],
            None,
        );
        assert_eq!(ws.search_path(), vec![PathBuf::from(".")]);
    }
}
