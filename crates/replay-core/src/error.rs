use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReplayError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("no usable cycle records ({total_rows} rows read, {skipped_rows} skipped)")]
    NoData {
        total_rows: usize,
        skipped_rows: usize,
    },

    #[error("simulation window is shorter than one second")]
    EmptyWindow,

    #[error("simulation window spans {seconds}s, more than the {max_seconds}s allowed")]
    WindowTooLarge { seconds: u64, max_seconds: u64 },
}
