mod progress;
mod styling;
mod summary;
mod tables;

pub use progress::PhaseProgress;
pub use summary::print_summary;

use styling::{cyan, dim, magenta_bold};

fn banner() -> String {
    format!(
        "\n{} {}\n  {} {}\n",
        magenta_bold("🔍 BuildLens"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Azure DevOps build diagnostics"),
        cyan("(builds · timelines · releases)"),
    )
}

/// Prints the `BuildLens` banner to stderr.
pub fn print_banner() {
    eprintln!("{}", banner());
}
