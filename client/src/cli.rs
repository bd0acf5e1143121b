use clap::{Args, Parser, Subcommand};
use deepguard::{ConfigError, DetectError};
use std::path::PathBuf;
use std::process::ExitCode;

pub const EXIT_FAILED: u8 = 1;
pub const EXIT_INVALID: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "deepguard", version, about = "Check images and videos for deepfakes")]
pub struct Cli {
    /// YAML config file; DEEPGUARD_* variables override its values
    #[arg(long, short, global = true, env = "DEEPGUARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Detection service base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Accept the terms of use for this run
    #[arg(long, global = true)]
    pub accept_terms: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a file and wait for its verdict
    Detect {
        file: PathBuf,

        /// Retry this many times if detection fails
        #[arg(long, default_value_t = 0)]
        retries: u32,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Fetch the result of an earlier upload
    Result {
        task_id: String,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Print the raw report as JSON
    #[arg(long)]
    pub json: bool,

    /// Write the original and annotated images into this directory
    #[arg(long, value_name = "DIR")]
    pub save_images: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Rejected(#[from] DetectError),
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid file name: {0}")]
    FileName(PathBuf),
    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Result contains an undecodable image: {0}")]
    Image(#[from] base64::DecodeError),
}

impl CliError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Config(_) | CliError::Rejected(_) | CliError::FileName(_) => {
                ExitCode::from(EXIT_INVALID)
            }
            CliError::Io { .. } | CliError::Json(_) | CliError::Image(_) => {
                ExitCode::from(EXIT_FAILED)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_detect_with_options() {
        let cli = Cli::try_parse_from([
            "deepguard",
            "detect",
            "face.jpg",
            "--retries",
            "2",
            "--json",
            "--accept-terms",
        ])
        .unwrap();

        assert!(cli.accept_terms);
        match cli.command {
            Command::Detect { file, retries, output } => {
                assert_eq!(file, PathBuf::from("face.jpg"));
                assert_eq!(retries, 2);
                assert!(output.json);
                assert!(output.save_images.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn invalid_input_maps_to_exit_two() {
        let err = CliError::Rejected(DetectError::ConsentRequired);
        assert_eq!(err.exit_code(), ExitCode::from(EXIT_INVALID));
    }
}
