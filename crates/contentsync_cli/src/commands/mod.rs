//! CLI command implementations.

pub mod serve;
pub mod sync;

/// Builds the multi-threaded runtime the async commands run on.
pub(crate) fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}
