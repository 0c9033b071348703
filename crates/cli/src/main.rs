use std::process::ExitCode;

fn main() -> ExitCode {
    webfit_cli::run()
}
