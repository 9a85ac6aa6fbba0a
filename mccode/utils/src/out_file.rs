use crate::{Error, McResult};
use std::{
    io::{self, BufWriter},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Possible choices for output streams. Used by the `-o` option to the compiler.
/// * "-" and "<out>" are treated as stdout.
/// * "<err>" is treated as stderr.
/// * "<null>" is treated as a null output stream.
/// * All other strings are treated as file paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFile {
    Null,
    Stdout,
    Stderr,
    File {
        path: PathBuf,
        // Has the writer been initialized?
        init: bool,
    },
}

impl OutputFile {
    pub fn file(path: PathBuf) -> Self {
        OutputFile::File { path, init: false }
    }

    /// Default output for an instrument: the file name with its `.instr`
    /// extension replaced by `.c`, in the current directory.
    pub fn for_instrument(input: &Path) -> Self {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "instrument".to_string());
        OutputFile::file(PathBuf::from(format!("{stem}.c")))
    }

    pub fn as_path_string(&self) -> String {
        match self {
            OutputFile::Null => "<null>".to_string(),
            OutputFile::Stdout => "<stdout>".to_string(),
            OutputFile::Stderr => "<stderr>".to_string(),
            OutputFile::File { path, .. } => path.to_string_lossy().to_string(),
        }
    }

    /// A writer for the stream. The first writer of a file truncates it,
    /// later ones append, so a backend can emit in several steps.
    pub fn get_write(&mut self) -> McResult<Box<dyn io::Write>> {
        Ok(match self {
            OutputFile::Stdout => Box::new(BufWriter::new(io::stdout())),
            OutputFile::Stderr => Box::new(BufWriter::new(io::stderr())),
            OutputFile::File { path, init } => {
                let file = if *init {
                    std::fs::OpenOptions::new().append(true).open(&*path)
                } else {
                    std::fs::File::create(&*path)
                }
                .map_err(|err| {
                    Error::fatal(format!(
                        "Cannot write output file `{}': {err}",
                        path.to_string_lossy()
                    ))
                })?;
                *init = true;
                Box::new(BufWriter::new(file))
            }
            OutputFile::Null => Box::new(io::sink()),
        })
    }
}

impl FromStr for OutputFile {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "-" | "<out>" => Ok(OutputFile::Stdout),
            "<err>" => Ok(OutputFile::Stderr),
            "<null>" => Ok(OutputFile::Null),
            _ => Ok(OutputFile::file(PathBuf::from(s))),
        }
    }
}

impl std::fmt::Display for OutputFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFile::Stdout => write!(f, "-"),
            OutputFile::Stderr => write!(f, "<err>"),
            OutputFile::Null => write!(f, "<null>"),
            OutputFile::File { path, .. } => {
                write!(f, "{}", path.to_string_lossy())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_output_names() {
        assert_eq!("-".parse::<OutputFile>().unwrap(), OutputFile::Stdout);
        assert_eq!("<err>".parse::<OutputFile>().unwrap(), OutputFile::Stderr);
        assert_eq!(
            "out.c".parse::<OutputFile>().unwrap().as_path_string(),
            "out.c"
        );
    }

    #[test]
    fn default_name_from_instrument() {
        let out = OutputFile::for_instrument(Path::new("dir/ILL_H15.instr"));
        assert_eq!(out.to_string(), "ILL_H15.c");
    }
}
