//! Tracing subscriber setup for binaries embedding the runtime.

/// Install a stderr subscriber honoring `RUST_LOG`, defaulting to
/// `info`. Call once at process start.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
