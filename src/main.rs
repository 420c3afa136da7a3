use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use fast_rbm_engine::covertype;
use fast_rbm_engine::dataset::synthetic_bars;
use fast_rbm_engine::logging;
use fast_rbm_engine::pipeline::run_comparison;
use fast_rbm_engine::utils::ScalingMethod;
use fast_rbm_engine::{
    BenchConfig, Benchmark, BernoulliRbm, DatasetStatistics, LabelColumn, LabeledData,
    PipelineConfig, RbmConfig, Statistics,
};
use linfa::traits::Fit;
use linfa::ParamGuard;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

#[derive(Parser)]
#[command(name = "fast-rbm-engine")]
#[command(author = "Hummer Team")]
#[command(version = "0.1.0")]
#[command(about = "Bernoulli RBM feature learning, pipeline and classifier benchmark", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit an RBM on a CSV or JSON file
    Fit {
        /// Path to the data file
        #[arg(short, long)]
        data: PathBuf,

        /// Label column: an index, "last" or "none"
        #[arg(long, default_value = "last")]
        label_column: LabelColumn,

        /// Feature scaling: none, max or minmax
        #[arg(long, default_value = "none")]
        scale: ScalingMethod,

        /// TOML file with RBM hyper-parameters
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        n_components: Option<usize>,

        #[arg(long)]
        epsilon: Option<f64>,

        #[arg(long)]
        epochs: Option<usize>,

        /// Number of persistent fantasy particles (mini-batch size)
        #[arg(long)]
        particles: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        /// Write hidden activation probabilities to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run this many Gibbs steps from the data and report the reconstruction error
        #[arg(long, default_value_t = 0)]
        gibbs_steps: usize,
    },

    /// Compare RBM features + logistic regression against raw-feature logistic regression
    Pipeline {
        /// Image data (defaults to synthetic bars); features are divided by their maximum
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Label column: an index, "last" or "none"
        #[arg(long, default_value = "last")]
        label_column: LabelColumn,

        /// TOML file with pipeline settings
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Benchmark classifiers on the forest covertype dataset
    Bench {
        /// Comma-separated list of classifiers
        /// (liblinear,logistic,GaussianNB,CART,RandomForest,RBM)
        #[arg(long, default_value = "liblinear,GaussianNB,CART")]
        classifiers: String,

        /// Number of classifiers trained concurrently
        #[arg(long, default_value_t = 1)]
        n_jobs: usize,

        /// Seed shared by the split and the randomized classifiers
        #[arg(long, default_value_t = 13)]
        random_seed: u64,

        /// Directory holding the archive and cached splits
        #[arg(long, default_value = "bench_covertype_data")]
        data_dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    match cli.command {
        Commands::Fit {
            data,
            label_column,
            scale,
            config,
            n_components,
            epsilon,
            epochs,
            particles,
            seed,
            output,
            gibbs_steps,
        } => {
            let mut rbm = match config {
                Some(path) => RbmConfig::load_from_file(path)?,
                None => RbmConfig::default(),
            };
            rbm.n_components = n_components.unwrap_or(rbm.n_components);
            rbm.epsilon = epsilon.unwrap_or(rbm.epsilon);
            rbm.epochs = epochs.unwrap_or(rbm.epochs);
            rbm.n_particles = particles.unwrap_or(rbm.n_particles);
            rbm.random_state = seed.unwrap_or(rbm.random_state);
            rbm.verbose = true;

            let mut dataset = LabeledData::from_path(&data, label_column)?;
            dataset.records = scale.apply(dataset.records)?;
            println!(
                "Loaded {} samples with {} features from {}",
                dataset.len(),
                dataset.n_features(),
                data.display()
            );

            let params = rbm.to_params::<f64>().check()?;
            let model = params.fit(&dataset.to_dataset())?;
            print_history(&model);

            if gibbs_steps > 0 {
                let mut rng = StdRng::seed_from_u64(rbm.random_state);
                let errors = reconstruction_errors(&model, &dataset.records, gibbs_steps, &mut rng)?;
                if let Some(stats) = Statistics::compute(errors.view()) {
                    println!(
                        "Reconstruction error after {} Gibbs steps: mean {:.4}, min {:.4}, max {:.4}",
                        gibbs_steps, stats.mean, stats.min, stats.max
                    );
                }
            }

            if let Some(path) = output {
                let features = model.try_transform(&dataset.records)?;
                write_features(&path, &features)?;
                println!("Wrote {} feature rows to {}", features.nrows(), path.display());
            }
        }

        Commands::Pipeline {
            data,
            label_column,
            config,
        } => {
            let config = match config {
                Some(path) => PipelineConfig::load_from_file(path)?,
                None => PipelineConfig::default(),
            };
            let dataset = match data {
                Some(path) => {
                    let mut dataset = LabeledData::from_path(&path, label_column)?;
                    dataset.records = ScalingMethod::Max.apply(dataset.records)?;
                    dataset
                }
                None => {
                    info!("No data given, using synthetic 8x8 bars");
                    synthetic_bars(60, 8, 0.05, config.seed)?
                }
            };

            let comparison = run_comparison(&dataset, &config)?;
            println!();
            println!("{}", comparison.pipeline);
            println!("{}", comparison.baseline);
            if let Some(last) = comparison.pseudo_likelihood.last() {
                println!("Final RBM pseudo-likelihood: {:.2}", last);
            }
        }

        Commands::Bench {
            classifiers,
            n_jobs,
            random_seed,
            data_dir,
        } => {
            let bench_config = BenchConfig {
                classifiers: BenchConfig::parse_classifier_list(&classifiers),
                n_jobs,
                random_seed,
                data_dir,
            };
            run_bench(&bench_config)?;
        }
    }

    Ok(())
}

fn print_history(model: &BernoulliRbm<f64>) {
    println!("\n=== Pseudo-likelihood per epoch ===");
    for (epoch, pl) in model.pseudo_likelihood_history().iter().enumerate() {
        println!("Epoch {:>3}: {:.4}", epoch + 1, pl);
    }
}

/// Mean absolute difference per sample between the data and a K-step Gibbs chain started from it
fn reconstruction_errors(
    model: &BernoulliRbm<f64>,
    records: &Array2<f64>,
    steps: usize,
    rng: &mut StdRng,
) -> anyhow::Result<Array1<f64>> {
    let mut chain = records.clone();
    for _ in 0..steps {
        chain = model.gibbs(&chain, rng)?;
    }
    let diff = (&chain - records).mapv_into(f64::abs);
    diff.mean_axis(Axis(1))
        .context("cannot compute reconstruction error without features")
}

fn write_features(path: &Path, features: &Array2<f64>) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("failed to write {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    for row in features.rows() {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

fn run_bench(config: &BenchConfig) -> anyhow::Result<()> {
    let bench = Benchmark::with_defaults(config.random_seed);
    let split = covertype::load(&config.data_dir, config.random_seed)?;

    println!();
    println!("{}", DatasetStatistics::compute(&split.train, &split.test));
    println!("Training Classifiers");
    println!("====================");
    println!();

    let results = bench.run(&config.classifiers, &split.train, &split.test, config.n_jobs)?;

    println!();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    fast_rbm_engine::bench::write_report(&mut out, &results)?;
    Ok(())
}
