use std::process::ExitCode;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    crmpilot_cli::run()
}
