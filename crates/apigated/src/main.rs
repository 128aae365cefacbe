use std::process::ExitCode;

fn main() -> ExitCode {
    match apigated::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("apigated: {error}");
            ExitCode::FAILURE
        }
    }
}
