use yew::prelude::*;

/// Renders the application header
pub fn render_header() -> Html {
    html! {
        <header class="app-header">
            <h1><i class="fa-solid fa-user-secret"></i> {" DeepFake Detector"}</h1>
            <p class="subtitle">{"Detect deepfakes in images and videos with AI"}</p>
        </header>
    }
}
