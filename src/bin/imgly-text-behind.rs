//! IMG.LY Text Behind Image CLI
//!
//! Command-line interface and web server for placing text behind the subject
//! of a photo.

#[cfg(feature = "cli")]
use imgly_text_behind::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
