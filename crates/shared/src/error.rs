use thiserror::Error;

/// Failure a list source may raise from its fetch seam.
///
/// Controllers treat every fetch error opaquely (the `error` flag is the only
/// surface); this type exists so source implementations and tests can signal
/// structured failures instead of bare strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("window offset {offset} (limit {limit}) is out of range for {total} items")]
    OutOfRange {
        offset: usize,
        limit: usize,
        total: usize,
    },
    #[error("list source unavailable: {0}")]
    Unavailable(String),
}
