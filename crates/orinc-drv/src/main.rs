use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    init_logging();

    if let Err(err) = orinc_drv::run(std::env::args()) {
        eprintln!("error: {:#}", anyhow::Error::from(err));
        std::process::exit(1);
    }
}

/// `RUST_LOG` controls verbosity (`RUST_LOG=orinc=debug orinc file.orin`);
/// a plain invocation with nothing set stays at `info` and never touches
/// stdout, matching the driver's documented exit-code-only contract.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}
