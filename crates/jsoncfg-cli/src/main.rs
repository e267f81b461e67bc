use std::process::ExitCode;

fn main() -> ExitCode {
    jsoncfg_cli::run()
}
