use std::process::ExitCode;

fn main() -> ExitCode {
    companyinfo_cli::run()
}
