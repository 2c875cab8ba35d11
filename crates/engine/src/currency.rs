//! Currency conversion cache.
//!
//! A single call to the rate provider returns every currency's rate against
//! the provider's base. [`CurrencyConverter`] expands that answer into the
//! full cross-rate matrix so later lookups for any pair are served from
//! memory until the next UTC midnight.

use std::{
    collections::{BTreeMap, HashMap},
    future::Future,
};

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::Mutex;

use crate::{
    EngineError, ResultEngine,
    util::{CENT, round_to},
};

/// Answer of the rate provider: `rates[c]` is the price of one `base` in `c`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RateSnapshot {
    pub base: String,
    #[serde(default)]
    pub date: Option<String>,
    pub rates: HashMap<String, f64>,
}

/// External exchange-rate provider.
pub trait RateProvider {
    /// Latest rates anchored at the provider's base currency.
    fn latest_rates(&self) -> impl Future<Output = ResultEngine<RateSnapshot>> + Send;
}

impl<T: RateProvider + Sync + ?Sized> RateProvider for &T {
    fn latest_rates(&self) -> impl Future<Output = ResultEngine<RateSnapshot>> + Send {
        (**self).latest_rates()
    }
}

/// Target currency code → rate from a ledger's base currency.
///
/// Codes are stored upper-case whatever case they were configured in.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CurrencyConversion(BTreeMap<String, f64>);

impl CurrencyConversion {
    pub fn get(&self, currency: &str) -> Option<f64> {
        self.0.get(&normalize(currency)).copied()
    }

    pub fn insert(&mut self, currency: &str, rate: f64) {
        self.0.insert(normalize(currency), rate);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(currency, rate)| (currency.as_str(), *rate))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert `amount` into every target currency, rounded to cents.
    pub fn convert(&self, amount: f64) -> BTreeMap<String, f64> {
        self.0
            .iter()
            .map(|(currency, rate)| (currency.clone(), round_to(amount * rate, CENT)))
            .collect()
    }
}

impl FromIterator<(String, f64)> for CurrencyConversion {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(currency, rate)| (normalize(&currency), rate))
                .collect(),
        )
    }
}

impl<'de> Deserialize<'de> for CurrencyConversion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(BTreeMap::<String, f64>::deserialize(deserializer)?
            .into_iter()
            .collect())
    }
}

#[derive(Clone, Copy, Debug)]
struct CachedRate {
    rate: f64,
    expires_at: DateTime<Utc>,
}

/// Process-local cache of cross rates, rebuilt every run.
#[derive(Debug)]
pub struct CurrencyConverter<P> {
    provider: P,
    cache: Mutex<HashMap<(String, String), CachedRate>>,
}

impl<P: RateProvider> CurrencyConverter<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Rate that converts one unit of `from` into `to`.
    pub async fn conversion_rate(&self, from: &str, to: &str) -> ResultEngine<f64> {
        self.conversion_rate_at(from, to, Utc::now()).await
    }

    /// Same as [`conversion_rate`](Self::conversion_rate) with an explicit clock.
    pub async fn conversion_rate_at(
        &self,
        from: &str,
        to: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<f64> {
        let pair = (normalize(from), normalize(to));
        if pair.0 == pair.1 {
            return Ok(1.0);
        }

        // Held across the fetch so concurrent misses share one provider call.
        let mut cache = self.cache.lock().await;
        if let Some(rate) = fresh(&cache, &pair, now) {
            tracing::debug!("conversion cache hit for {}->{}", pair.0, pair.1);
            return Ok(rate);
        }

        tracing::debug!("fetching rates for {}->{}", pair.0, pair.1);
        let snapshot = self.provider.latest_rates().await?;
        expand_cross_rates(&mut cache, &snapshot, next_utc_midnight(now));

        fresh(&cache, &pair, now).ok_or(EngineError::ConversionUnavailable {
            from: pair.0,
            to: pair.1,
        })
    }

    /// Resolve every target currency against `base`.
    ///
    /// The lookups run concurrently and the first failure aborts the whole set.
    pub async fn generate_currency_conversions(
        &self,
        base: &str,
        currencies: &[String],
    ) -> ResultEngine<CurrencyConversion> {
        let lookups = currencies.iter().map(|currency| async move {
            let rate = self.conversion_rate(base, currency).await?;
            Ok::<_, EngineError>((normalize(currency), rate))
        });

        Ok(try_join_all(lookups).await?.into_iter().collect())
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

fn fresh(
    cache: &HashMap<(String, String), CachedRate>,
    pair: &(String, String),
    now: DateTime<Utc>,
) -> Option<f64> {
    cache
        .get(pair)
        .filter(|cached| cached.expires_at > now)
        .map(|cached| cached.rate)
}

/// Cache `rate[src] / rate[dest]` for every ordered pair of the snapshot.
fn expand_cross_rates(
    cache: &mut HashMap<(String, String), CachedRate>,
    snapshot: &RateSnapshot,
    expires_at: DateTime<Utc>,
) {
    let mut rates: HashMap<String, f64> = snapshot
        .rates
        .iter()
        .map(|(code, rate)| (normalize(code), *rate))
        .collect();
    rates.entry(normalize(&snapshot.base)).or_insert(1.0);

    for (dest, dest_rate) in &rates {
        if *dest_rate == 0.0 {
            continue;
        }
        for (src, src_rate) in &rates {
            cache.insert(
                (dest.clone(), src.clone()),
                CachedRate {
                    rate: src_rate / dest_rate,
                    expires_at,
                },
            );
        }
    }
}

fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;

    use super::*;

    struct FixedRates {
        calls: AtomicUsize,
    }

    impl FixedRates {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RateProvider for FixedRates {
        async fn latest_rates(&self) -> ResultEngine<RateSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RateSnapshot {
                base: "USD".to_string(),
                date: Some("2024-03-01".to_string()),
                rates: HashMap::from([
                    ("USD".to_string(), 1.0),
                    ("CAD".to_string(), 1.3),
                    ("EUR".to_string(), 0.9),
                ]),
            })
        }
    }

    fn at(hour: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn derives_cross_rates_from_one_fetch() {
        let provider = FixedRates::new();
        let converter = CurrencyConverter::new(&provider);

        let cad_eur = converter.conversion_rate_at("CAD", "EUR", at(9, 1)).await.unwrap();
        assert_eq!(cad_eur, 0.9 / 1.3);

        let usd_cad = converter.conversion_rate_at("usd", "cad", at(10, 1)).await.unwrap();
        assert_eq!(usd_cad, 1.3);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn entries_expire_at_next_utc_midnight() {
        let provider = FixedRates::new();
        let converter = CurrencyConverter::new(&provider);

        converter.conversion_rate_at("USD", "EUR", at(23, 1)).await.unwrap();
        converter.conversion_rate_at("USD", "EUR", at(23, 1)).await.unwrap();
        assert_eq!(provider.calls(), 1);

        converter.conversion_rate_at("USD", "EUR", at(0, 2)).await.unwrap();
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn missing_pair_is_unavailable() {
        let provider = FixedRates::new();
        let converter = CurrencyConverter::new(&provider);

        let err = converter.conversion_rate_at("USD", "JPY", at(9, 1)).await.unwrap_err();
        assert_eq!(
            err,
            EngineError::ConversionUnavailable {
                from: "USD".to_string(),
                to: "JPY".to_string()
            }
        );
    }

    #[tokio::test]
    async fn same_currency_needs_no_fetch() {
        let provider = FixedRates::new();
        let converter = CurrencyConverter::new(&provider);

        assert_eq!(converter.conversion_rate("GBP", "gbp").await.unwrap(), 1.0);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn generates_conversions_for_targets() {
        let provider = FixedRates::new();
        let converter = CurrencyConverter::new(&provider);

        let conversions = converter
            .generate_currency_conversions("CAD", &["USD".to_string(), "CAD".to_string()])
            .await
            .unwrap();

        assert_eq!(conversions.get("USD"), Some(1.0 / 1.3));
        assert_eq!(conversions.get("CAD"), Some(1.0));

        let failed = converter
            .generate_currency_conversions("CAD", &["USD".to_string(), "XYZ".to_string()])
            .await;
        assert!(failed.is_err());
    }

    #[test]
    fn converts_and_rounds_amounts() {
        let conversions: CurrencyConversion =
            [("USD".to_string(), 1.0), ("CAD".to_string(), 1.3333)]
                .into_iter()
                .collect();

        let converted = conversions.convert(-10.0);
        assert_eq!(converted["USD"], -10.0);
        assert_eq!(converted["CAD"], -13.33);
    }
}
