use std::process;

fn main() {
    let cli = tinyjail::cli::parse();
    process::exit(tinyjail::cli::commands::dispatch(cli));
}
