//! Support files of the generated program.
use mccode_frontend::Workspace;
use std::{
    io,
    path::{Path, PathBuf},
};

/// Runtime files copied before the instrument code, in order.
pub const RUNTIME_HEADER: [&str; 4] =
    ["mccode-r.h", "mcstas-r.h", "mccode-r.c", "mcstas-r.c"];

/// Runtime files always copied after the instrument code, in order.
pub const RUNTIME_TRAILER: [&str; 2] = ["metadata-r.c", "mccode_main.c"];

/// Provides the text of support files: the runtime library and the
/// libraries requested with `%include` in code blocks.
pub trait RuntimeEmbedder {
    /// Contents of the file `name`.
    fn read(&self, name: &str) -> io::Result<String>;
    /// Path under which the generated program `#include`s `name` when the
    /// runtime is not copied in.
    fn include_path(&self, name: &str) -> String;
}

/// Support files looked up on disk: first in the `share` directory of the
/// library, then along the search path of the instrument.
pub struct LibraryFiles {
    share: Option<PathBuf>,
    dirs: Vec<PathBuf>,
}

impl LibraryFiles {
    pub fn new(ws: &Workspace) -> Self {
        let share = ws.lib_path.as_ref().map(|lib| lib.join("share"));
        let dirs = share.iter().cloned().chain(ws.search_path()).collect();
        Self { share, dirs }
    }

    fn find(&self, name: &str) -> Option<PathBuf> {
        let path = Path::new(name);
        if path.is_absolute() {
            return path.is_file().then(|| path.to_path_buf());
        }
        self.dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }
}

impl RuntimeEmbedder for LibraryFiles {
    fn read(&self, name: &str) -> io::Result<String> {
        let path = self.find(name).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "`{name}' not found in {}",
                    self.dirs
                        .iter()
                        .map(|d| d.to_string_lossy().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )
        })?;
        log::info!("Embedding file {}", path.to_string_lossy());
        std::fs::read_to_string(path)
    }

    fn include_path(&self, name: &str) -> String {
        let path = match &self.share {
            Some(share) => share.join(name),
            None => PathBuf::from(name),
        };
        path.to_string_lossy().replace('\\', "\\\\")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn share_directory_comes_first() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("lib");
        fs::create_dir_all(lib.join("share")).unwrap();
        fs::write(lib.join("share").join("mccode-r.h"), "from share").unwrap();
        fs::write(dir.path().join("mccode-r.h"), "from instrument").unwrap();
        let ws = Workspace::construct(
            &Some(dir.path().join("T.instr")),
            &[],
            Some(lib.clone()),
        );
        let files = LibraryFiles::new(&ws);
        assert_eq!(files.read("mccode-r.h").unwrap(), "from share");
        assert!(files.read("missing.h").is_err());
        assert_eq!(
            files.include_path("mccode-r.h"),
            lib.join("share").join("mccode-r.h").to_string_lossy()
        );
    }
}
