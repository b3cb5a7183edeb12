//! Batch transformation: rate fan-in resolution and record mapping.

use tracing::{debug, warn};

use pricewatch_shared::{EnrichedRecord, PricewatchError, RawRecord, Result};

use crate::engine::enrich;

/// Resolve the effective exchange rate for a transform run.
///
/// The staged rate read back from the store is authoritative; the transient
/// rate from the fetch stage's in-memory result is the fallback. Non-positive
/// values are treated as absent. With neither available the whole batch fails
/// with `NoRateAvailable` — there is no partial transform without a rate.
pub fn resolve_rate(stored: Option<f64>, transient: Option<f64>) -> Result<f64> {
    let positive = |r: f64| (r > 0.0).then_some(r);

    if let Some(rate) = stored.and_then(positive) {
        debug!(rate, "using staged exchange rate");
        return Ok(rate);
    }
    if let Some(rate) = transient.and_then(positive) {
        warn!(rate, "staging table empty, falling back to transient rate");
        return Ok(rate);
    }
    Err(PricewatchError::NoRateAvailable)
}

/// Map a batch of raw records through the enrichment engine.
///
/// Each record is enriched independently; per-record failures are logged and
/// skipped. A non-empty input that yields zero survivors fails the batch with
/// `EmptyResult`, signaling the caller to treat the run as failed.
pub fn transform_batch(raws: &[RawRecord], rate: f64) -> Result<Vec<EnrichedRecord>> {
    let mut enriched = Vec::with_capacity(raws.len());

    for raw in raws {
        match enrich(raw, rate) {
            Ok(record) => enriched.push(record),
            Err(e) => {
                warn!(error = %e, "skipping record that failed enrichment");
            }
        }
    }

    if enriched.is_empty() && !raws.is_empty() {
        return Err(PricewatchError::EmptyResult { input: raws.len() });
    }

    tracing::info!(
        input = raws.len(),
        output = enriched.len(),
        "transformed batch"
    );

    Ok(enriched)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(title: &str, price: &str) -> RawRecord {
        RawRecord {
            title: title.into(),
            price_gbp: price.into(),
            category: "poetry".into(),
            availability: "In stock (3 available)".into(),
        }
    }

    #[test]
    fn resolve_rate_prefers_stored() {
        assert_eq!(resolve_rate(Some(104.2), Some(105.5)).unwrap(), 104.2);
    }

    #[test]
    fn resolve_rate_falls_back_to_transient() {
        // Staging table empty at transform time: the transient value from the
        // fetch stage must carry the run.
        assert_eq!(resolve_rate(None, Some(105.5)).unwrap(), 105.5);
        assert_eq!(resolve_rate(Some(0.0), Some(105.5)).unwrap(), 105.5);
    }

    #[test]
    fn resolve_rate_fails_without_any_source() {
        let err = resolve_rate(None, None).expect_err("must fail");
        assert!(matches!(err, PricewatchError::NoRateAvailable));

        let err = resolve_rate(Some(-1.0), Some(0.0)).expect_err("must fail");
        assert!(matches!(err, PricewatchError::NoRateAvailable));
    }

    #[test]
    fn batch_skips_failed_records() {
        let raws = vec![raw("Good Book", "£12.50"), raw("Bad Book", "n/a")];

        let enriched = transform_batch(&raws, 105.5).expect("partial success allowed");
        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].title, "Good Book");
    }

    #[test]
    fn batch_fails_when_nothing_survives() {
        let raws = vec![raw("Bad", "n/a"), raw("Worse", "—")];

        let err = transform_batch(&raws, 105.5).expect_err("must fail");
        assert!(matches!(err, PricewatchError::EmptyResult { input: 2 }));
    }

    #[test]
    fn empty_input_yields_empty_batch() {
        let enriched = transform_batch(&[], 105.5).expect("empty in, empty out");
        assert!(enriched.is_empty());
    }
}
