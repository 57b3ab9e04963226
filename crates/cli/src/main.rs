use std::process::ExitCode;

fn main() -> ExitCode {
    clientele_cli::run()
}
