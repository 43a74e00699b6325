//! CLI options.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser};

use crate::actuator::BuzzerStrategy;

pub mod parsers;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Opts {
    /// Sentry DSN
    #[clap(long, env = "SENTRY_DSN")]
    pub sentry_dsn: Option<String>,

    /// Performance monitoring sample rate for Sentry
    #[clap(long, default_value = "0.0", env = "BIODRYING_TRACES_SAMPLE_RATE")]
    pub traces_sample_rate: f32,

    #[clap(subcommand)]
    pub subcommand: Subcommand,
}

#[derive(clap::Subcommand)]
pub enum Subcommand {
    Train(TrainOpts),
    Serve(ServeOpts),
}

#[derive(Args, Clone)]
pub struct ArtifactOpts {
    /// Fitted classifier artifact
    #[clap(long, default_value = "knn_model.pickle")]
    pub model: PathBuf,

    /// Fitted scaler artifact
    #[clap(long, default_value = "scaler.pickle")]
    pub scaler: PathBuf,
}

/// Fits the classifier on a labelled dataset and stores the artifacts
#[derive(Args)]
pub struct TrainOpts {
    #[clap(flatten)]
    pub artifacts: ArtifactOpts,

    /// Labelled CSV with `temperature`, `humidity`, `ph` and `classification` columns
    #[clap(long, default_value = "Dataset20.csv")]
    pub dataset: PathBuf,

    /// Fraction of the samples held out for evaluation
    #[clap(long, default_value = "0.3", value_parser = parsers::fraction)]
    pub test_size: f64,

    /// Random seed for the train/test split
    #[clap(long, default_value = "101")]
    pub seed: u64,

    /// Largest neighbour count to try, the search starts from 1
    #[clap(long, default_value = "20", value_parser = parsers::non_zero_usize)]
    pub max_neighbors: usize,

    /// Number of cross-validation folds
    #[clap(long, default_value = "5", value_parser = parsers::n_folds)]
    pub folds: usize,
}

/// Runs the inference server
#[derive(Args)]
pub struct ServeOpts {
    #[clap(flatten)]
    pub artifacts: ArtifactOpts,

    /// Bind host
    #[clap(long, default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Bind port
    #[clap(short, long, default_value = "5000")]
    pub port: u16,

    #[clap(flatten)]
    pub thingspeak: ThingSpeakOpts,

    /// How the buzzer flag is derived
    #[clap(long, value_enum, default_value_t = BuzzerStrategy::FollowVerdict)]
    pub buzzer_strategy: BuzzerStrategy,

    /// Do not advertise the server over mDNS
    #[clap(long)]
    pub no_mdns: bool,
}

#[derive(Args, Clone)]
pub struct ThingSpeakOpts {
    /// ThingSpeak API base URL
    #[clap(long = "thingspeak-url", default_value = "https://api.thingspeak.com")]
    pub base_url: String,

    /// ThingSpeak channel write API key
    #[clap(
        long = "thingspeak-api-key",
        env = "THINGSPEAK_WRITE_API_KEY",
        default_value = "1Y04VEMCGE7G4GYE",
        hide_env_values = true
    )]
    pub api_key: String,

    /// ThingSpeak channel ID
    #[clap(long = "thingspeak-channel-id", env = "THINGSPEAK_CHANNEL_ID", default_value = "2977596")]
    pub channel_id: String,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        Opts::command().debug_assert();
    }

    #[test]
    fn train_defaults_ok() -> crate::prelude::Result {
        let opts = Opts::try_parse_from(["biodrying", "train"])?;
        match opts.subcommand {
            Subcommand::Train(opts) => {
                assert_eq!(opts.dataset, PathBuf::from("Dataset20.csv"));
                assert_eq!(opts.seed, 101);
                assert_eq!(opts.max_neighbors, 20);
                assert_eq!(opts.folds, 5);
                assert!((opts.test_size - 0.3).abs() < f64::EPSILON);
            }
            Subcommand::Serve(_) => unreachable!(),
        }
        Ok(())
    }

    #[test]
    fn serve_defaults_ok() -> crate::prelude::Result {
        let opts = Opts::try_parse_from(["biodrying", "serve", "--no-mdns"])?;
        match opts.subcommand {
            Subcommand::Serve(opts) => {
                assert_eq!(opts.port, 5000);
                assert_eq!(opts.host.to_string(), "0.0.0.0");
                assert_eq!(opts.buzzer_strategy, BuzzerStrategy::FollowVerdict);
                assert!(opts.no_mdns);
            }
            Subcommand::Train(_) => unreachable!(),
        }
        Ok(())
    }

    #[test]
    fn invalid_test_size_rejected() {
        assert!(Opts::try_parse_from(["biodrying", "train", "--test-size", "1.5"]).is_err());
    }
}
