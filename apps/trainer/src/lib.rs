pub mod dataset;
pub mod error;
pub mod session;
pub mod store;

use std::path::PathBuf;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::session::TrainerState;
use crate::store::DataStore;

pub fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let dataset = std::env::var("VOCAB_DATASET").unwrap_or_else(|_| "english_spanish.csv".into());
    let data_dir: PathBuf = std::env::var("VOCAB_DATA_DIR")
        .unwrap_or_else(|_| ".".into())
        .into();

    tracing::info!(dataset = %dataset, "loading vocabulary");
    let vocab = dataset::load_vocabulary(dataset.as_ref())?;

    let store = DataStore::new(data_dir)?;
    let mut state = TrainerState::load(&store, vocab);

    let mut rng = rand::thread_rng();
    session::run_interactive(&mut state, &store, &mut rng)?;

    Ok(())
}
