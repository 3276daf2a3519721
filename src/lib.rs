pub mod app;

/// Runs the command line front end with the process arguments.
pub fn run() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();
    app::cli::run(&args)
}
