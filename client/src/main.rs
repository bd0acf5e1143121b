mod cli;

use clap::Parser;
use cli::{Cli, CliError, Command, EXIT_FAILED, OutputArgs};
use deepguard::view::{file_size_label, percent, verdict_headline};
use deepguard::{
    ClientConfig, DetectionController, DetectionTransport, DetectError, Failure, HttpTransport,
    Status, TokioDelay, TransportError, View, WorkflowSnapshot,
};
use shared::{AnalysisRequest, DetectionReport, MediaFormat, TaskHandle, TaskId};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = load_config(&cli)?;
    log::debug!("Using {} ({})", config.base_url, config.api.as_ref());

    match cli.command {
        Command::Detect {
            file,
            retries,
            output,
        } => detect(&config, &file, retries, &output).await,
        Command::Result { task_id, output } => fetch(&config, task_id, &output).await,
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    let mut config = config.with_env_overrides()?;

    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if cli.accept_terms {
        config.terms_accepted = true;
    }
    config.validate()?;
    Ok(config)
}

async fn detect(
    config: &ClientConfig,
    file: &Path,
    retries: u32,
    output: &OutputArgs,
) -> Result<ExitCode, CliError> {
    let request = read_request(file)?;
    log::info!(
        "Selected {} ({}, {})",
        request.file_name(),
        request.media_type(),
        file_size_label(request.size())
    );

    let transport = HttpTransport::new(config)?;
    let controller = DetectionController::new(transport, TokioDelay, config);
    controller.subscribe(print_progress);

    let mut snapshot = controller.start(request).await?;
    let mut remaining = retries;
    while snapshot.status() == Status::Failed && remaining > 0 {
        remaining -= 1;
        if let Some(failure) = snapshot.error() {
            eprintln!("{} Retrying ({} left)...", failure.message, remaining);
        }
        snapshot = controller.retry().await?;
    }

    render(&snapshot, output)
}

async fn fetch(config: &ClientConfig, task_id: String, output: &OutputArgs) -> Result<ExitCode, CliError> {
    let transport = HttpTransport::new(config)?;
    let handle = TaskHandle {
        task_id: TaskId::from(task_id),
        status: "unknown".to_string(),
        message: None,
    };

    match transport.fetch_result(&handle).await {
        Ok(report) => render_report(&report, output),
        Err(TransportError::NotReady { task_id }) => {
            eprintln!("Task {} is still processing. Try again shortly.", task_id);
            Ok(ExitCode::from(EXIT_FAILED))
        }
        Err(error) => {
            let failure = Failure::from_transport(&error, config.locale);
            render_failure(&failure, output)
        }
    }
}

/// Validates the file before reading it, so oversize files are never loaded.
fn read_request(path: &Path) -> Result<AnalysisRequest, CliError> {
    let io_error = |source: std::io::Error| CliError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| CliError::FileName(path.to_path_buf()))?;
    let metadata = fs::metadata(path).map_err(io_error)?;
    AnalysisRequest::check_size(metadata.len()).map_err(DetectError::from)?;

    let media_type = MediaFormat::from_file_name(file_name)
        .map(|format| format.mime_type())
        .unwrap_or("application/octet-stream");
    let bytes = fs::read(path).map_err(io_error)?;

    Ok(AnalysisRequest::new(file_name, media_type, bytes).map_err(DetectError::from)?)
}

fn print_progress(snapshot: &WorkflowSnapshot) {
    match snapshot.view() {
        View::Uploading { task: None, .. } => {
            if let Some(request) = &snapshot.request {
                eprintln!("Uploading {}...", request.file_name());
            }
        }
        View::Uploading {
            task: Some(task),
            attempt,
        } => {
            eprintln!("Waiting for task {} (check {})...", task.task_id, attempt);
        }
        View::Empty | View::Result(_) | View::Error(_) => {}
    }
}

fn render(snapshot: &WorkflowSnapshot, output: &OutputArgs) -> Result<ExitCode, CliError> {
    match snapshot.view() {
        View::Result(report) => render_report(report, output),
        View::Error(failure) => render_failure(failure, output),
        View::Empty | View::Uploading { .. } => {
            eprintln!("Detection did not finish.");
            Ok(ExitCode::from(EXIT_FAILED))
        }
    }
}

fn render_report(report: &DetectionReport, output: &OutputArgs) -> Result<ExitCode, CliError> {
    if output.json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_report(report);
    }

    if let Some(dir) = &output.save_images {
        for path in save_images(report, dir)? {
            eprintln!("Saved {}", path.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn render_failure(failure: &Failure, output: &OutputArgs) -> Result<ExitCode, CliError> {
    if output.json {
        println!("{}", serde_json::to_string_pretty(failure)?);
    }
    eprintln!("Error: {}", failure.message);
    log::debug!("Failure cause ({}): {}", failure.kind.as_ref(), failure.cause);
    Ok(ExitCode::from(EXIT_FAILED))
}

fn print_report(report: &DetectionReport) {
    let result = &report.detection_result;

    if let Some(filename) = &report.filename {
        match report.file_size {
            Some(size) => println!("File:        {} ({})", filename, file_size_label(size)),
            None => println!("File:        {}", filename),
        }
    }
    if let Some(task_id) = &report.task_id {
        println!("Task:        {}", task_id);
    }
    println!("Verdict:     {}", verdict_headline(result));
    println!("Fake:        {}", percent(result.fake_probability));
    println!("Real:        {}", percent(result.real_probability));

    if let Some(analysis) = &report.analysis {
        println!(
            "Ensemble:    {} ({} of {} models voted fake, {})",
            analysis.ensemble_method,
            analysis.fake_votes,
            analysis.models_used,
            percent(analysis.fake_vote_share())
        );
        for (model, vote) in &analysis.model_results {
            println!(
                "  {:<24} fake {}  confidence {}",
                model,
                percent(vote.fake_probability),
                percent(vote.confidence)
            );
        }
    }
    if let Some(model) = &report.model_info {
        match &model.kind {
            Some(kind) => println!("Model:       {} ({})", model.name, kind),
            None => println!("Model:       {}", model.name),
        }
    }
    if let Some(timestamp) = &report.timestamp {
        println!("Analyzed at: {}", timestamp);
    }
    if !result.probabilities_consistent() {
        log::warn!("Fake and real probabilities do not add up to 1");
    }
}

fn save_images(report: &DetectionReport, dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    fs::create_dir_all(dir).map_err(|source| CliError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let stem = report
        .filename
        .as_deref()
        .and_then(|name| Path::new(name).file_stem())
        .and_then(|stem| stem.to_str())
        .unwrap_or("result");
    let result = &report.detection_result;

    let mut saved = Vec::new();
    for (suffix, image) in [
        ("original", result.original_image()?),
        ("annotated", result.annotated_image()?),
    ] {
        if let Some(bytes) = image {
            let path = dir.join(format!("{}_{}.png", stem, suffix));
            fs::write(&path, bytes).map_err(|source| CliError::Io {
                path: path.clone(),
                source,
            })?;
            saved.push(path);
        }
    }

    if saved.is_empty() {
        log::warn!("The result contains no images to save");
    }
    Ok(saved)
}
