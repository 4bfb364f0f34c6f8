use crate::error::CheckError;
use crate::plugin::types::{CheckItem, CheckResult, Metric};

/// Results and metrics of a fully drained check stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumedItems {
    pub results: Vec<CheckResult>,
    pub metrics: Vec<Metric>,
}

/// Drain a check stream and sort its items by kind
///
/// The stream is always consumed to the end, so counters updated late in a
/// check are kept. If any item asked to ignore the results, the last such
/// message is returned as [`CheckError::IgnoreResults`] afterwards. An error
/// inside the stream ends it and is returned as is.
pub fn consume_check_results<I>(stream: I) -> Result<ConsumedItems, CheckError>
where
    I: IntoIterator<Item = Result<CheckItem, CheckError>>,
{
    let mut consumed = ConsumedItems::default();
    let mut ignored = None;

    for item in stream {
        match item? {
            CheckItem::Result(result) => consumed.results.push(result),
            CheckItem::Metric(metric) => consumed.metrics.push(metric),
            CheckItem::Ignore(ignore) => ignored = Some(ignore),
        }
    }

    match ignored {
        Some(ignore) => Err(CheckError::IgnoreResults(ignore.0)),
        None => Ok(consumed),
    }
}
