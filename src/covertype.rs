//! Forest covertype dataset: download, parsing and a cached train/test split.
//!
//! The task is spruce/fir (class 1) against every other cover type. The
//! split follows the usual protocol of 522,911 training samples, with the
//! first 10 (numerical) columns standardized using training statistics.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use flate2::read::GzDecoder;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::dataset::{LabelColumn, LabeledData};
use crate::utils::standardize_columns;

pub const ARCHIVE_URL: &str =
    "http://archive.ics.uci.edu/ml/machine-learning-databases/covtype/covtype.data.gz";
pub const ARCHIVE_NAME: &str = "covtype.data.gz";

pub const N_FEATURES: usize = 54;
/// Training set size of the standard split
pub const N_TRAIN: usize = 522_911;
/// Leading columns holding numerical measurements
pub const N_NUMERIC: usize = 10;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Shuffled, standardized covertype split.
#[derive(Debug, Clone, PartialEq)]
pub struct CovertypeSplit {
    pub train: LabeledData,
    pub test: LabeledData,
}

fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .build()
    })
}

/// Path of the archive in `dir`, downloading it first when missing.
pub fn ensure_archive(dir: &Path) -> crate::Result<PathBuf> {
    let archive = dir.join(ARCHIVE_NAME);
    if archive.exists() {
        debug!(path = %archive.display(), "Using existing archive");
        return Ok(archive);
    }

    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    info!("Downloading data, please wait (11MB)...");
    download(ARCHIVE_URL, &archive)?;
    Ok(archive)
}

fn download(url: &str, dest: &Path) -> crate::Result<()> {
    let response = match agent().get(url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code, _)) => bail!("failed to download {}: HTTP {}", url, code),
        Err(err) => bail!("failed to download {}: {}", url, err),
    };

    let tmp = dest.with_extension("tmp");
    let mut file =
        File::create(&tmp).with_context(|| format!("failed to write {}", tmp.display()))?;
    let bytes = io::copy(&mut response.into_reader(), &mut file)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    file.flush()
        .with_context(|| format!("failed to flush {}", tmp.display()))?;
    fs::rename(&tmp, dest).with_context(|| format!("failed to move {}", dest.display()))?;

    info!(bytes, path = %dest.display(), "Download complete");
    Ok(())
}

/// Parse a gzip-compressed covertype file.
///
/// Each row holds 54 features followed by the cover type (1 to 7). The
/// label is 1 for cover type 1 and 0 otherwise.
pub fn parse<R: Read>(reader: R) -> crate::Result<LabeledData> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(GzDecoder::new(reader));

    let mut values = Vec::new();
    let mut labels = Vec::new();
    for (row_idx, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read row {}", row_idx + 1))?;
        if record.len() != N_FEATURES + 1 {
            bail!(
                "row {} has {} fields, expected {}",
                row_idx + 1,
                record.len(),
                N_FEATURES + 1
            );
        }

        for field in record.iter().take(N_FEATURES) {
            let value: f64 = field
                .parse()
                .with_context(|| format!("row {}: invalid number '{}'", row_idx + 1, field))?;
            values.push(value);
        }
        let class = &record[N_FEATURES];
        let cover_type: u32 = class
            .parse()
            .with_context(|| format!("row {}: invalid cover type '{}'", row_idx + 1, class))?;
        labels.push(usize::from(cover_type == 1));
    }

    if labels.is_empty() {
        bail!("covertype archive contains no rows");
    }

    let records = Array2::from_shape_vec((labels.len(), N_FEATURES), values)?;
    LabeledData::new(records, Array1::from(labels))
}

/// Number of training rows for a dataset of `n_rows` samples.
///
/// The full dataset uses the standard split; smaller files keep 90% for training.
pub fn train_size(n_rows: usize) -> usize {
    if n_rows > N_TRAIN {
        N_TRAIN
    } else {
        let n_train = ((n_rows as f64) * 0.9).floor() as usize;
        n_train.clamp(1, n_rows.saturating_sub(1).max(1))
    }
}

/// Shuffle with `seed`, split and standardize the numerical columns.
pub fn split(data: &LabeledData, seed: u64) -> crate::Result<CovertypeSplit> {
    if data.len() < 2 {
        bail!("need at least 2 samples to split, got {}", data.len());
    }

    let mut indices: Vec<usize> = (0..data.len()).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let (train_idx, test_idx) = indices.split_at(train_size(data.len()));

    let mut train = data.select(train_idx);
    let mut test = data.select(test_idx);
    let n_numeric = N_NUMERIC.min(data.n_features());
    standardize_columns(&mut train.records, &mut test.records, 0..n_numeric)?;

    Ok(CovertypeSplit { train, test })
}

/// Load the cached split for `seed`, building it from the archive on first use.
pub fn load(dir: &Path, seed: u64) -> crate::Result<CovertypeSplit> {
    let cache_dir = dir.join(format!("cache-{}", seed));
    let train_path = cache_dir.join("train.csv");
    let test_path = cache_dir.join("test.csv");

    if train_path.exists() && test_path.exists() {
        info!(path = %cache_dir.display(), "Loading cached train-test split");
        return Ok(CovertypeSplit {
            train: LabeledData::from_path(&train_path, LabelColumn::Last)?,
            test: LabeledData::from_path(&test_path, LabelColumn::Last)?,
        });
    }

    let archive = ensure_archive(dir)?;
    info!("Loading dataset...");
    let file =
        File::open(&archive).with_context(|| format!("failed to open {}", archive.display()))?;
    let data = parse(file)?;

    info!("Creating train-test split...");
    let split = split(&data, seed)?;

    fs::create_dir_all(&cache_dir)
        .with_context(|| format!("failed to create {}", cache_dir.display()))?;
    write_csv(&train_path, &split.train)?;
    write_csv(&test_path, &split.test)?;
    debug!(path = %cache_dir.display(), "Cached train-test split");

    Ok(split)
}

/// Write features followed by the label, one sample per row.
pub fn write_csv(path: &Path, data: &LabeledData) -> crate::Result<()> {
    let file = File::create(path).with_context(|| format!("failed to write {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));

    let mut row = Vec::with_capacity(data.n_features() + 1);
    for (features, label) in data.records.rows().into_iter().zip(data.targets.iter()) {
        row.clear();
        row.extend(features.iter().map(|v| v.to_string()));
        row.push(label.to_string());
        writer.write_record(&row)?;
    }
    writer
        .flush()
        .map_err(|err| anyhow!("failed to flush {}: {}", path.display(), err))?;
    Ok(())
}
