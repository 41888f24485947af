use std::process::ExitCode;

fn main() -> ExitCode {
    match tripshare_cli::cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
