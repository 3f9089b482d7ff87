/// Initializes the logger with the `env_logger` crate.
///
/// Safe to call more than once; log output is controlled through the
/// `RUST_LOG` environment variable.
pub fn init_logger() {
    let _ = env_logger::builder().try_init();
}
