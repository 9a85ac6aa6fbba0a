//! Driver for the McCode compiler.
use crate::cmdline::Opts;
use mccode_backend::{Backend, JsonBackend};
use mccode_frontend::{McParser, Workspace};
use mccode_ir as ir;
use mccode_opt::pass_manager::PassManager;
use mccode_utils::{MultiError, OutputFile};

const GRAMMAR_REMINDER: &str = "Please check the usual grammar:
DEFINE INSTRUMENT
DECLARE
INITIALIZE
TRACE
  {SPLIT} COMPONENT name = comp(parameters) {WHEN condition}
  AT (...) [RELATIVE [reference|PREVIOUS] | ABSOLUTE]
  {ROTATED {RELATIVE [reference|PREVIOUS] | ABSOLUTE} }
  {GROUP group_name}
  {EXTEND C_code}
  {JUMP [reference|PREVIOUS|MYSELF|NEXT] [ITERATE number_of_times | WHEN condition]
END
as well as '%{ ... %}' blocks.
";

/// Run the compiler from the command line. Every error is printed before
/// returning.
pub fn run_compiler() -> Result<(), MultiError> {
    // parse the command line arguments into Opts struct
    let opts = Opts::get_opts().inspect_err(|err| eprintln!("{err:?}"))?;

    // enable tracing
    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(opts.log_level)
        .target(env_logger::Target::Stderr)
        .init();

    if opts.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    compile(&opts).inspect_err(|errors| {
        eprintln!("{errors:?}");
        eprintln!(
            "{} Errors encountered during parse of {}.",
            errors.len(),
            opts.source_name()
        );
        if log::log_enabled!(log::Level::Info) {
            eprint!("{GRAMMAR_REMINDER}");
        }
    })
}

fn compile(opts: &Opts) -> Result<(), MultiError> {
    let pm = PassManager::default_passes()?;

    // list all the avaliable pass options when flag --list-passes is enabled
    if opts.list_passes {
        println!("{}", pm.complete_help());
        return Ok(());
    }

    let file = match opts.input() {
        Some(path) => McParser::parse_file(path)?,
        None => McParser::parse(std::io::stdin())?,
    };

    // Construct the search path and build the instrument.
    let ws = Workspace::construct(
        &opts.input().map(|p| p.to_path_buf()),
        &opts.search_dirs,
        opts.lib_dir.clone(),
    );
    let mut ctx = ir::ast_to_ir(&file, ws)?;
    ctx.instrument.source = opts.source_name();

    // Configuration for the backend
    ctx.bc = ir::BackendConf {
        trace: opts.trace,
        portable: opts.portable,
        default_main: !opts.no_main,
        embed_runtime: !opts.no_runtime,
        funnel_default: opts.funnel,
        source_name: opts.source_name(),
    };
    if ctx.bc.funnel_default {
        ctx.instrument.require_funnel();
    }
    // Extra options for the passes
    ctx.extra_opts = opts.extra_opts.clone();

    // Run all passes specified by the command line
    pm.execute_plan(&mut ctx, &opts.pass, &opts.disable_pass)?;

    if opts.dump_json {
        return Ok(JsonBackend.run(&ctx, OutputFile::Stderr)?);
    }

    opts.run_backend(&ctx)?;
    log::info!(
        "Generated C code {} from {}",
        opts.output_file().as_path_string(),
        opts.source_name()
    );
    eprintln!("CFLAGS={}", ctx.instrument.dependency);
    Ok(())
}
