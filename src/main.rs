use env_logger::{Builder, Env};
use log::error;

fn init_logger() {
    // Level comes from RUST_LOG, default info.
    // Example: RUST_LOG=debug savecli ...
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = bytedrop::cli::run() {
        error!("{:?}", e);
        std::process::exit(1);
    }
}
