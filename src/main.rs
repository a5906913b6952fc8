use std::env;

fn main() {
    teamcalc::logging::init_logging();
    let args: Vec<String> = env::args().collect();
    std::process::exit(teamcalc::cli::run_with_args(&args));
}
