// Smoke driver: evaluates every loss head once on a random MNIST-shaped
// batch. Training lives outside this crate.
//
//   cargo run --release -- [config.json]
use std::process::ExitCode;

use angular_margin::{LossType, Model, ModelConfig, ParamStore, Result, Tensor4};
use log::{error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BATCH: usize = 8;
const SIDE: usize = 28;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::INFO)
        .init();

    match run(std::env::args().nth(1)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: Option<String>) -> Result<()> {
    let base = match config_path {
        Some(path) => ModelConfig::load_json(&path)?,
        None => ModelConfig::default(),
    };

    let mut rng = StdRng::seed_from_u64(0);
    let pixels: Vec<f64> = (0..BATCH * SIDE * SIDE).map(|_| rng.gen::<f64>()).collect();
    let images = Tensor4::from_data([BATCH, SIDE, SIDE, 1], pixels)?;
    let labels: Vec<usize> = (0..BATCH).map(|_| rng.gen_range(0..base.num_classes)).collect();

    let mut store = ParamStore::seeded(0);
    for loss_type in LossType::ALL {
        let config = ModelConfig { loss_type, ..base.clone() };
        let model = Model::new(&images, &labels, &config, &mut store)?;
        info!(
            "{loss_type}: loss = {:.6}, regularization = {:.6}, accuracy = {:.3}",
            model.loss(),
            model.regularization_loss(),
            model.accuracy()
        );
    }
    info!("{} parameters in store", store.len());
    Ok(())
}
