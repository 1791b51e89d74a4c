use chrono::{Datelike, Days, NaiveDate, Weekday};
use quantile_forecast::config::TrainingConfig;
use quantile_forecast::data::{InMemorySeriesProvider, Observation};
use quantile_forecast::engine::{ForecastEngine, PredictRequest};
use quantile_forecast::models::GbmParams;
use quantile_forecast::store::ArtifactStore;
use quantile_forecast::training::TrainingOrchestrator;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::sync::Arc;

const TICKER: &str = "DEMO";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    println!("Quantile Forecast: Offline Train and Serve Example");
    println!("==================================================\n");

    // 1. Synthetic business-day series
    let observations = synthetic_series(300, 7)?;
    println!(
        "Generated {} observations from {} to {}\n",
        observations.len(),
        observations[0].date,
        observations[observations.len() - 1].date
    );

    // 2. Train horizons 5 and 10 into a temporary models directory
    let models_dir = tempfile::tempdir()?;
    let store = Arc::new(ArtifactStore::open(models_dir.path())?);
    let config = TrainingConfig::new(
        vec![5, 10],
        vec![0.1, 0.5, 0.9],
        GbmParams {
            n_estimators: 50,
            min_samples_leaf: 10,
            ..GbmParams::default()
        },
    )?;
    let record = TrainingOrchestrator::new(&store).train(TICKER, &observations, &config)?;
    println!(
        "Trained horizons {:?} on {} rows ({} features)\n",
        record.horizons(),
        record.rows,
        record.feature_cols.len()
    );

    // 3. Serve a horizon that was never trained
    let mut provider = InMemorySeriesProvider::new();
    provider.insert(TICKER, observations)?;
    let engine = ForecastEngine::new(Arc::clone(&store));
    let response = engine.predict(&PredictRequest::new(TICKER, 7).with_recent(50), &provider)?;

    if let Some(note) = &response.note {
        println!("Note: {}\n", note);
    }
    println!("{:<12} {:>10} {:>10} {:>10}", "date", "p10", "p50", "p90");
    for step in &response.predictions {
        let value = |q: f64| step.value(q).unwrap_or(f64::NAN);
        println!(
            "{:<12} {:>10.2} {:>10.2} {:>10.2}",
            step.date.to_string(),
            value(0.1),
            value(0.5),
            value(0.9)
        );
    }

    println!("\nFirst prediction record as served:");
    println!("{}", serde_json::to_string_pretty(&response.predictions[0])?);

    Ok(())
}

/// Random walk with OHLCV fields on consecutive business days
fn synthetic_series(n: usize, seed: u64) -> Result<Vec<Observation>, Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.0)?;
    let mut date = NaiveDate::from_ymd_opt(2022, 1, 3).ok_or("invalid start date")?;
    let mut close = 100.0;

    let mut observations = Vec::with_capacity(n);
    while observations.len() < n {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            close += noise.sample(&mut rng) * 0.3;
            observations.push(Observation::ohlcv(
                date,
                close + noise.sample(&mut rng) * 0.5,
                close + rng.gen::<f64>(),
                close - rng.gen::<f64>(),
                close,
                rng.gen_range(200_000.0..1_000_000.0),
            ));
        }
        date = date.checked_add_days(Days::new(1)).ok_or("date overflow")?;
    }
    Ok(observations)
}
