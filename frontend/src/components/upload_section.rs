use super::super::Model;
use super::super::Msg;
use super::utils::{debounce, first_file};
use shared::MAX_UPLOAD_BYTES;
use wasm_bindgen::JsCast;
use web_sys::{DragEvent, HtmlInputElement};
use yew::prelude::*;

pub fn render_upload_section(model: &Model, ctx: &Context<Model>) -> Html {
    html! {
        <div class="upload-section">
            { render_file_input_area(model, ctx) }
        </div>
    }
}

fn render_file_input_area(model: &Model, ctx: &Context<Model>) -> Html {
    let link = ctx.link();
    let handle_change = link.callback(|e: Event| {
        let input: HtmlInputElement = e.target_unchecked_into();
        let file = input.files().as_ref().and_then(first_file);

        input.set_value("");

        match file {
            Some(file) => Msg::FileChosen(file),
            None => Msg::SetNotice(Some("No file selected.".into())),
        }
    });

    let handle_drag_over = link.callback(|e: DragEvent| {
        e.prevent_default();
        Msg::SetDragging(true)
    });

    let handle_drag_leave = link.callback(|e: DragEvent| {
        e.prevent_default();
        Msg::SetDragging(false)
    });

    let handle_drop = link.callback(Msg::HandleDrop);
    let trigger_file_input = Callback::from(|_| {
        let input = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.get_element_by_id("file-input"));
        if let Some(input) = input {
            if let Ok(html_input) = input.dyn_into::<web_sys::HtmlElement>() {
                html_input.click();
            }
        }
    });

    let busy = model.is_busy();

    html! {
        <>
            <input
                type="file"
                id="file-input"
                accept="image/*,video/*"
                style="display: none;"
                onchange={handle_change}
            />

            <button
                id="upload-button"
                class="analyze-btn"
                disabled={busy}
                onclick={debounce(300, {
                    let trigger_file_input = trigger_file_input.clone();
                    move || trigger_file_input.emit(())
                })}
            >
                {
                    if model.reading_file {
                        html! { <><i class="fa-solid fa-spinner fa-spin"></i>{" Reading file..."}</> }
                    } else {
                        html! { <><i class="fa-solid fa-upload"></i>{" Select Image or Video"}</> }
                    }
                }
            </button>

            <div
                id="drop-zone"
                class={classes!("upload-area", model.is_dragging.then_some("drag-over"))}
                ondragover={handle_drag_over}
                ondragleave={handle_drag_leave}
                ondrop={handle_drop}
                onclick={debounce(300, {
                    let trigger_file_input = trigger_file_input.clone();
                    move || trigger_file_input.emit(())
                })}
            >
                <div class="upload-placeholder">
                    <i class="fa-solid fa-cloud-arrow-up"></i>
                    <p>{"Drag & drop a file here, paste, or click"}</p>
                    <p class="file-types">
                        { format!(
                            "Images (JPG, PNG, WEBP, GIF) or videos (MP4, WEBM, MOV), up to {} MB",
                            MAX_UPLOAD_BYTES / 1_048_576
                        ) }
                    </p>
                </div>
            </div>
        </>
    }
}
