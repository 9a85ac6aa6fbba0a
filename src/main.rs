use std::process::ExitCode;

fn main() -> ExitCode {
    match mccode::driver::run_compiler() {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
