use super::super::{Model, Msg};
use yew::prelude::*;

pub fn render_consent(ctx: &Context<Model>) -> Html {
    html! {
        <div class="consent-container">
            <h2>{"Before you start"}</h2>
            <p class="consent-description">
                {"Files you select are uploaded to the detection service and analyzed with computer \
                  vision and deep learning models that look for subtle signs of manipulation."}
            </p>
            <p class="consent-description">
                {"Only upload media you are allowed to share. Results are probabilistic and should \
                  not be treated as proof."}
            </p>
            <button
                id="accept-terms"
                class="analyze-btn"
                onclick={ctx.link().callback(|_| Msg::AcceptTerms)}
            >
                {"Agree and get started"}
            </button>
        </div>
    }
}
