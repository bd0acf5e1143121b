use super::super::{Model, Msg};
use super::preview_area::render_selected_preview;
use super::utils::image_src;
use deepguard::Failure;
use deepguard::view::{file_size_label, percent, verdict_headline};
use shared::{DetectionReport, TaskHandle};
use yew::prelude::*;

pub fn render_loading(model: &Model, task: Option<&TaskHandle>, attempt: u32) -> Html {
    let status = match task {
        None => "Uploading...".to_string(),
        Some(task) if attempt > 1 => format!("Task {} is {} (check {})", task.task_id, task.status, attempt),
        Some(task) => format!("Task {} is {}", task.task_id, task.status),
    };

    html! {
        <div class="analyzing-container">
            <h2>{"Analyzing..."}</h2>
            <i class="fa-solid fa-magnifying-glass fa-bounce fa-4x"></i>
            <p class="analyzing-status">{ status }</p>
            { render_selected_preview(model) }
        </div>
    }
}

pub fn render_results(model: &Model, report: &DetectionReport, ctx: &Context<Model>) -> Html {
    let result = &report.detection_result;
    let confidence = result.confidence * 100.0;
    let analyzed_filename = report
        .filename
        .clone()
        .or_else(|| model.selection.request().map(|r| r.file_name().to_string()))
        .unwrap_or_else(|| "Analyzed file".to_string());

    html! {
        <div class={classes!("results-container", if result.is_fake { "ai-detected" } else { "not-ai" })}>
            <div class="result-header">
                <h2 title={format!("Analysis results for: {}", analyzed_filename)}>
                    {
                        if result.is_fake {
                            html! { <><i class="fa-solid fa-robot"></i>{" Likely Deepfake"}</> }
                        } else {
                            html! { <><i class="fa-solid fa-camera"></i>{" Likely Authentic"}</> }
                        }
                    }
                    <span class="analyzed-filename-display">{format!("({})", analyzed_filename)}</span>
                </h2>
                <div class="confidence-meter">
                    <div class="meter-label">{"Confidence:"}</div>
                    <div class="meter">
                        <div class="meter-fill" style={format!("width: {}%", confidence)}></div>
                    </div>
                    <div class="meter-value">{ percent(result.confidence) }</div>
                </div>
            </div>
            <div class="detailed-results">
                <h3>{"Detailed Analysis"}</h3>
                <div class="result-bars">
                    { render_bar("Deepfake", result.fake_probability) }
                    { render_bar("Authentic", result.real_probability) }
                </div>
            </div>
            <div class="button-container">
                <button class="analyze-btn" onclick={ctx.link().callback(|_| Msg::ToggleDetail)}>
                    <i class="fa-solid fa-file-lines"></i>{" Show report"}
                </button>
            </div>
        </div>
    }
}

fn render_bar(label: &str, probability: f32) -> Html {
    html! {
        <div class="result-item">
            <div class="result-label">{ label }</div>
            <div class="result-bar-container">
                <div class="result-bar" style={format!("width: {}%", probability * 100.0)}></div>
            </div>
            <div class="result-value">{ percent(probability) }</div>
        </div>
    }
}

/// Full report: metadata, original and annotated images, ensemble votes.
pub fn render_report(report: &DetectionReport, ctx: &Context<Model>) -> Html {
    let result = &report.detection_result;

    html! {
        <div class="report-container">
            <h2>{ verdict_headline(result) }</h2>
            <table class="report-table">
                { render_row("File", report.filename.clone()) }
                { render_row("Size", report.file_size.map(file_size_label)) }
                { render_row("Task", report.task_id.as_ref().map(|id| id.to_string())) }
                { render_row("Analyzed at", report.timestamp.clone()) }
                { render_row("Verdict", Some(result.verdict.clone())) }
                { render_row("Deepfake probability", Some(percent(result.fake_probability))) }
                { render_row("Authentic probability", Some(percent(result.real_probability))) }
                {
                    render_row("Model", report.model_info.as_ref().map(|model| match &model.kind {
                        Some(kind) => format!("{} ({})", model.name, kind),
                        None => model.name.clone(),
                    }))
                }
            </table>

            <div class="report-images">
                { render_image("Original", result.orig_img.as_deref()) }
                { render_image("Analysis", result.result_img.as_deref()) }
            </div>

            {
                if let Some(analysis) = &report.analysis {
                    html! {
                        <div class="ensemble-breakdown">
                            <h3>
                                { format!(
                                    "Ensemble ({}): {} of {} models voted deepfake",
                                    analysis.ensemble_method, analysis.fake_votes, analysis.models_used
                                ) }
                            </h3>
                            <div class="result-bars">
                                { for analysis.model_results.iter().map(|(name, vote)| render_bar(name, vote.fake_probability)) }
                            </div>
                        </div>
                    }
                } else {
                    html! {}
                }
            }

            <div class="button-container">
                <button class="analyze-btn" onclick={ctx.link().callback(|_| Msg::ToggleDetail)}>
                    <i class="fa-solid fa-arrow-left"></i>{" Back"}
                </button>
            </div>
        </div>
    }
}

fn render_row(label: &str, value: Option<String>) -> Html {
    match value {
        Some(value) => html! {
            <tr><th>{ label }</th><td>{ value }</td></tr>
        },
        None => html! {},
    }
}

fn render_image(caption: &str, encoded: Option<&str>) -> Html {
    match encoded {
        Some(encoded) => html! {
            <figure>
                <img src={image_src(encoded)} alt={caption.to_string()} />
                <figcaption>{ caption }</figcaption>
            </figure>
        },
        None => html! {},
    }
}

pub fn render_failure(failure: &Failure, ctx: &Context<Model>) -> Html {
    html! {
        <div class="error-message">
            <i class="fa-solid fa-circle-exclamation"></i>
            <p>{ &failure.message }</p>
            <button class="analyze-btn" onclick={ctx.link().callback(|_| Msg::Retry)}>
                <i class="fa-solid fa-rotate-right"></i>{" Retry"}
            </button>
        </div>
    }
}
