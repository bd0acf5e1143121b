use super::super::{Model, Msg};
use super::utils::debounce;
use deepguard::view::file_size_label;
use shared::MediaKind;
use yew::prelude::*;

pub fn render_preview_area(model: &Model, ctx: &Context<Model>) -> Html {
    let Some(request) = model.selection.request() else {
        return html! {};
    };

    let link = ctx.link().clone();

    html! {
        <div id="preview-container">
            { render_selected_preview(model) }
            <p class="preview-caption">
                { format!("{} ({})", request.file_name(), file_size_label(request.size())) }
            </p>
            <div class="button-container">
                <button
                    id="clear-btn"
                    class="analyze-btn"
                    style="background-color: var(--clear-color);"
                    onclick={debounce(300, {
                        let link = link.clone();
                        move || link.send_message(Msg::ClearSelection)
                    })}
                >
                    <i class="fa-solid fa-trash"></i>{" Clear"}
                </button>
                <button
                    class="analyze-btn"
                    onclick={debounce(300, {
                        let link = link.clone();
                        move || link.send_message(Msg::Analyze)
                    })}
                    disabled={model.snapshot.is_loading()}
                >
                    { render_analyze_button_content(request.file_name()) }
                </button>
            </div>
        </div>
    }
}

pub fn render_selected_preview(model: &Model) -> Html {
    let (Some(request), Some(url)) = (model.selection.request(), model.selection.preview()) else {
        return html! {
            <div class="unavailable-preview">
                <p>{"Preview unavailable"}</p>
            </div>
        };
    };

    match request.media_kind() {
        MediaKind::Image => html! {
            <img id="actual-image-preview" src={url.to_string()} alt={request.file_name().to_string()} />
        },
        MediaKind::Video => html! {
            <video id="actual-video-preview" src={url.to_string()} controls=true muted=true />
        },
    }
}

fn render_analyze_button_content(filename: &str) -> Html {
    let display_name = if filename.chars().count() > 20 {
        format!("{}...", filename.chars().take(17).collect::<String>())
    } else {
        filename.to_string()
    };

    html! { <><i class="fa-solid fa-magnifying-glass"></i>{ format!(" Analyze \"{}\"", display_name) }</> }
}
