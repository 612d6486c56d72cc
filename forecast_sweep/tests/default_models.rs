use chrono::{Duration, TimeZone, Utc};
use forecast_sweep::hyperparams::JsonHyperparameterStore;
use forecast_sweep::models::{ModelContext, ModelFactory, ModelParams, ModelRegistry};
use forecast_sweep::{SweepConfig, TimeSeries};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rstest::rstest;

fn random_walk(n: usize, seed: u64) -> TimeSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.05, 1.0).unwrap();
    let start = Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap();
    let timestamps = (0..n).map(|i| start + Duration::minutes(15 * i as i64)).collect();
    let mut level = 250.0;
    let values = (0..n)
        .map(|_| {
            level += noise.sample(&mut rng);
            level
        })
        .collect();
    TimeSeries::univariate("close", timestamps, values).unwrap()
}

fn tuned_store() -> JsonHyperparameterStore {
    let trees = ModelParams::new()
        .with("lags", 6)
        .with("n_estimators", 15)
        .with("max_depth", 4);
    let neural = ModelParams::new().with("input_chunk_length", 12);
    let mut store = JsonHyperparameterStore::new()
        .with("Prophet", "*", "*", ModelParams::new().with("n_changepoints", 5));
    for model in ["RandomForest", "XGB", "LightGBM"] {
        store.insert(model, "*", "*", trees.clone());
    }
    for model in ["NBEATS", "RNN", "LSTM", "GRU", "TCN", "TFT", "NHiTS"] {
        store.insert(model, "*", "*", neural.clone());
    }
    store
}

#[rstest]
#[case(1)]
#[case(7)]
fn test_every_default_model_forecasts_noise(#[case] seed: u64) {
    let registry = ModelRegistry::with_defaults();
    let params = tuned_store();
    let factory = ModelFactory::new(&registry, &params);
    let series = random_walk(160, seed);
    let (train, rest) = (series.head(140), series);

    for model in SweepConfig::default().models {
        let context = ModelContext::new(&model, "BTC", "15m");
        let mut forecaster = factory.construct(&context).unwrap();
        forecaster.fit(&train).unwrap();

        let forecast = forecaster.predict(3).unwrap();
        assert_eq!(forecast.len(), 3, "{}", model);
        assert!(forecast.iter().all(|v| v.is_finite()), "{}: {:?}", model, forecast);

        let conditioned = forecaster.predict_from(&rest, 1);
        if registry.requires_retrain(&model).unwrap() {
            assert!(conditioned.is_err(), "{} should need retraining", model);
        } else {
            let value = conditioned.unwrap()[0];
            assert!(value.is_finite(), "{}", model);
        }
    }
}

#[test]
fn test_tuned_models_need_parameters() {
    let registry = ModelRegistry::with_defaults();
    let params = JsonHyperparameterStore::new();
    let factory = ModelFactory::new(&registry, &params);

    for model in SweepConfig::default().models {
        let context = ModelContext::new(&model, "ETH", "1d");
        let built = factory.construct(&context);
        match model.as_str() {
            "ARIMA" | "TBATS" => assert!(built.is_ok(), "{}", model),
            _ => assert!(built.is_err(), "{}", model),
        }
    }
}
