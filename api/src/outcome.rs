use crate::metrics_defs::EMPTIED_LISTINGS;
use shared::counter;
use upstream::UpstreamError;

/// Result of a listing where "no data" is a valid answer.
///
/// Call sites decide explicitly what a failure means for them, usually via
/// [`Fetched::or_empty`].
#[derive(Debug)]
pub enum Fetched<T> {
    Data(Vec<T>),
    Empty,
    Failed(UpstreamError),
}

impl<T> Fetched<T> {
    pub fn from_result(result: Result<Vec<T>, UpstreamError>) -> Self {
        match result {
            Ok(items) if items.is_empty() => Fetched::Empty,
            Ok(items) => Fetched::Data(items),
            Err(e) => Fetched::Failed(e),
        }
    }

    /// Collapses a failure into an empty list, logging it under `context`.
    pub fn or_empty(self, context: &'static str) -> Vec<T> {
        match self {
            Fetched::Data(items) => items,
            Fetched::Empty => Vec::new(),
            Fetched::Failed(e) => {
                tracing::warn!(context, error = %e, "listing failed, returning no items");
                counter!(EMPTIED_LISTINGS, "listing" => context).increment(1);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes() {
        assert!(matches!(Fetched::<u8>::from_result(Ok(vec![])), Fetched::Empty));
        assert!(matches!(
            Fetched::from_result(Ok(vec![1])),
            Fetched::Data(ref items) if items == &vec![1]
        ));

        let failed = Fetched::<u8>::from_result(Err(UpstreamError::Other("boom".into())));
        assert!(matches!(failed, Fetched::Failed(_)));
        assert!(failed.or_empty("test").is_empty());
    }
}
