//! Command line parsing for the McCode compiler.
use argh::FromArgs;
use mccode_backend::{Backend, BackendOpt, CBackend, JsonBackend};
use mccode_ir as ir;
use mccode_utils::{Error, McResult, OutputFile};
use std::path::{Path, PathBuf};

/// Library root used when neither `--lib-dir` nor `MCCODE` is given.
const DEFAULT_LIB_DIR: &str = "/usr/share/mccode";

/// Options followed by a value, which may itself be `-`.
const VALUE_OPTIONS: [&str; 13] = [
    "-o",
    "--output-file",
    "-I",
    "--search-dir",
    "--lib-dir",
    "-b",
    "--pass",
    "-d",
    "--disable-pass",
    "-x",
    "--extra-opt",
    "--log",
    "--",
];

#[derive(FromArgs, Debug)]
#[argh(help_triggers("-h", "--help"))]
/// Compiler from McCode instrument descriptions to C
pub struct Opts {
    /// instrument file, `-` for stdin
    #[argh(positional)]
    pub file: Option<PathBuf>,

    /// output file: `-` for stdout, `<err>`, `<null>` or a path. Defaults to
    /// the instrument name with a `.c` extension
    #[argh(option, short = 'o', long = "output-file")]
    pub output: Option<OutputFile>,

    /// extra directory searched for components
    #[argh(option, short = 'I', long = "search-dir")]
    pub search_dirs: Vec<PathBuf>,

    /// root of the component library. Defaults to $MCCODE, then /usr/share/mccode
    #[argh(option, long = "lib-dir")]
    pub lib_dir: Option<PathBuf>,

    /// enable the trace of particles in the generated program
    #[argh(switch, short = 't', long = "trace")]
    pub trace: bool,

    /// generate a program without platform specific code
    #[argh(switch, short = 'p', long = "portable")]
    pub portable: bool,

    /// do not use the main() of the runtime library
    #[argh(switch, long = "no-main")]
    pub no_main: bool,

    /// include the runtime library instead of copying it into the output
    #[argh(switch, long = "no-runtime")]
    pub no_runtime: bool,

    /// make the funnel driver the default one
    #[argh(switch, long = "funnel")]
    pub funnel: bool,

    /// select a backend
    #[argh(option, short = 'b', default = "BackendOpt::default()")]
    pub backend: BackendOpt,

    /// run this pass. Defaults to the `all` alias
    #[argh(option, long = "pass")]
    pub pass: Vec<String>,

    /// disable pass during execution
    #[argh(option, short = 'd', long = "disable-pass")]
    pub disable_pass: Vec<String>,

    /// extra options passed to the passes, as `pass:option`
    #[argh(option, short = 'x', long = "extra-opt")]
    pub extra_opts: Vec<String>,

    /// list all known passes
    #[argh(switch, long = "list-passes")]
    pub list_passes: bool,

    /// write a JSON summary of the built instrument to stderr instead of
    /// generating code
    #[argh(switch, long = "dump-json")]
    pub dump_json: bool,

    /// logging level
    #[argh(option, long = "log", default = "log::LevelFilter::Warn")]
    pub log_level: log::LevelFilter,

    /// same as `--log info`
    #[argh(switch, short = 'v', long = "verbose")]
    pub verbose: bool,

    /// print the version and exit
    #[argh(switch, long = "version")]
    pub version: bool,
}

impl Opts {
    /// Parse the command line and fill in the defaults that depend on the
    /// environment.
    pub fn get_opts() -> McResult<Opts> {
        let args: Vec<String> = std::env::args().collect();
        let (cmd, rest) = args.split_first().map_or(("mccode", &[][..]), |(c, r)| {
            (c.as_str(), r)
        });
        let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
        let mut opts = match Opts::parse_args(cmd, &rest) {
            Ok(opts) => opts,
            Err(early_exit) => {
                match early_exit.status {
                    Ok(()) => println!("{}", early_exit.output),
                    Err(()) => eprintln!(
                        "{}\nRun {cmd} --help for more information.",
                        early_exit.output
                    ),
                }
                std::process::exit(i32::from(early_exit.status.is_err()));
            }
        };
        if opts.verbose && opts.log_level < log::LevelFilter::Info {
            opts.log_level = log::LevelFilter::Info;
        }
        if opts.lib_dir.is_none() {
            opts.lib_dir = Some(
                std::env::var_os("MCCODE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_LIB_DIR)),
            );
        }
        if opts.pass.is_empty() {
            opts.pass = vec!["all".to_string()];
        }
        if opts.file.is_none() && !opts.list_passes && !opts.version {
            return Err(Error::misc(
                "No instrument file given. Use `-' to read from stdin.",
            ));
        }
        Ok(opts)
    }

    /// Parse the arguments following the command name. argh takes a lone
    /// `-` for a flag, so it is set aside and given back as the file.
    pub fn parse_args(cmd: &str, args: &[&str]) -> Result<Opts, argh::EarlyExit> {
        let mut stdin = false;
        let mut kept = Vec::with_capacity(args.len());
        for (pos, arg) in args.iter().enumerate() {
            let is_value = pos > 0 && VALUE_OPTIONS.contains(&args[pos - 1]);
            if *arg == "-" && !is_value {
                stdin = true;
            } else {
                kept.push(*arg);
            }
        }
        let mut opts = Opts::from_args(&[cmd], &kept)?;
        if stdin {
            if opts.file.is_some() {
                return Err(argh::EarlyExit::from(
                    "Give either an instrument file or `-', not both.".to_string(),
                ));
            }
            opts.file = Some(PathBuf::from("-"));
        }
        Ok(opts)
    }

    /// The instrument file, `None` for stdin.
    pub fn input(&self) -> Option<&Path> {
        self.file.as_deref().filter(|f| *f != Path::new("-"))
    }

    /// Name of the input in messages and in the generated program.
    pub fn source_name(&self) -> String {
        match self.input() {
            Some(file) => file.to_string_lossy().to_string(),
            None => "<stdin>".to_string(),
        }
    }

    /// Where the generated program goes.
    pub fn output_file(&self) -> OutputFile {
        match (&self.output, self.input()) {
            (Some(out), _) => out.clone(),
            (None, Some(file)) => OutputFile::for_instrument(file),
            (None, None) => OutputFile::Stdout,
        }
    }

    /// Run the selected backend on `ctx`.
    pub fn run_backend(&self, ctx: &ir::Context) -> McResult<()> {
        let output = self.output_file();
        log::info!("Writing {} to {}", self.backend, output.as_path_string());
        match self.backend {
            BackendOpt::C => CBackend.run(ctx, output),
            BackendOpt::Json => JsonBackend.run(ctx, output),
            BackendOpt::None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Opts {
        Opts::parse_args("mccode", args).unwrap()
    }

    #[test]
    fn output_defaults_to_instrument_name() {
        let opts = parse(&["instr/ILL_H15.instr"]);
        assert_eq!(opts.output_file().to_string(), "ILL_H15.c");
        assert_eq!(opts.backend, BackendOpt::C);
        assert_eq!(opts.source_name(), "instr/ILL_H15.instr");
    }

    #[test]
    fn stdin_goes_to_stdout() {
        let opts = parse(&["-"]);
        assert!(opts.input().is_none());
        assert_eq!(opts.file.as_deref(), Some(Path::new("-")));
        let opts = parse(&["-t", "-", "-b", "json"]);
        assert!(opts.input().is_none());
        assert!(opts.trace);
        assert_eq!(opts.backend, BackendOpt::Json);
        let opts = parse(&["-", "-o", "-"]);
        assert!(opts.input().is_none());
        assert_eq!(opts.output, Some(OutputFile::Stdout));
        assert_eq!(opts.source_name(), "<stdin>");
        assert_eq!(opts.output_file(), OutputFile::Stdout);
    }

    #[test]
    fn pass_options() {
        let opts = parse(&[
            "T.instr",
            "-b",
            "json",
            "-o",
            "<null>",
            "-d",
            "skip-transforms",
            "-x",
            "skip-transforms:report",
        ]);
        assert_eq!(opts.backend, BackendOpt::Json);
        assert_eq!(opts.output_file(), OutputFile::Null);
        assert_eq!(opts.disable_pass, vec!["skip-transforms"]);
        assert_eq!(opts.extra_opts, vec!["skip-transforms:report"]);
        assert!(opts.pass.is_empty());
    }

    #[test]
    fn stdin_and_file_conflict() {
        let err = Opts::parse_args("mccode", &["T.instr", "-"]).unwrap_err();
        assert!(err.status.is_err());
        assert!(err.output.contains("not both"));
    }
}
