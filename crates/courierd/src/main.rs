use std::process::ExitCode;

fn main() -> ExitCode {
    match courierd::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("courierd: {error}");
            ExitCode::FAILURE
        }
    }
}
