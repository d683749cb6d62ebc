use std::path::PathBuf;

use clap::Parser;

use common::minio::ClientConfig;

/// Run one MapReduce job in this process, with a pool of workers polling
/// an embedded coordinator.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Glob pattern matching the input files.
    #[arg(short, long)]
    pub input: String,

    /// Name of the workload to run (wc, vertex-degree, log-levels).
    #[arg(short, long)]
    pub workload: String,

    /// Maximum size of an input chunk in bytes.
    #[arg(short, long, default_value = "500")]
    pub chunk_size: usize,

    /// Number of workers.
    #[arg(short = 'n', long, default_value = "4")]
    pub workers: usize,

    /// How long an idle worker waits before polling again.
    #[arg(long, default_value = "50")]
    pub poll_interval_ms: u64,

    /// Directory holding the chunks of the running job.
    #[arg(long, default_value = "/var/tmp/bmr-chunks")]
    pub store_dir: PathBuf,

    /// Keep chunks in S3 instead, under `s3://bucket/prefix`.
    #[arg(long)]
    pub store_url: Option<String>,

    /// Write the result to this file as JSON instead of printing it.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Minio access key / user ID.
    #[arg(long, default_value = "robert")]
    pub access_key_id: String,

    /// Minio secret key / password.
    #[arg(long, default_value = "robertisawesome")]
    pub secret_access_key: String,

    /// Minio region.
    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    #[arg(long, default_value = "http://127.0.0.1:9000")]
    pub minio_url: String,
}

impl Args {
    pub fn minio_config(&self) -> ClientConfig {
        ClientConfig {
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            region: self.region.clone(),
            url: self.minio_url.clone(),
        }
    }
}
