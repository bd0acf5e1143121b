mod api;
mod components;

use api::{GlooDelay, GlooTransport};
use components::{consent, handlers, header, preview_area, results, upload_section, utils};
use deepguard::{ClientConfig, DetectionController, PreviewSlot, View, WorkflowSnapshot};
use deepguard::view::selection_locked;
use gloo_events::EventListener;
use gloo_file::{File as GlooFile, ObjectUrl};
use gloo_storage::{LocalStorage, Storage};
use std::rc::Rc;
use wasm_bindgen::JsCast;
use web_sys::{ClipboardEvent, DragEvent};
use yew::prelude::*;

pub const TERMS_STORAGE_KEY: &str = "deepguard.terms_accepted";

pub type Controller = DetectionController<GlooTransport, GlooDelay>;

pub enum Msg {
    // File selection
    FileChosen(GlooFile),
    FileLoaded(GlooFile, Vec<u8>),
    ClearSelection,

    // Workflow
    Analyze,
    Retry,
    Snapshot(WorkflowSnapshot),

    // UI state
    AcceptTerms,
    ToggleDetail,
    SetNotice(Option<String>),
    SetDragging(bool),

    // Input events
    HandleDrop(DragEvent),
    HandlePaste(ClipboardEvent),
}

pub struct Model {
    pub controller: Rc<Controller>,
    pub snapshot: WorkflowSnapshot,
    pub selection: PreviewSlot<ObjectUrl>,
    pub terms_accepted: bool,
    pub show_detail: bool,
    pub reading_file: bool,
    pub notice: Option<String>,
    pub is_dragging: bool,
    paste_listener: Option<EventListener>,
}

impl Model {
    /// No new file may replace the selection while this is true.
    pub fn is_busy(&self) -> bool {
        selection_locked(&self.snapshot, self.reading_file)
    }
}

fn load_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    if let Some(base_url) = option_env!("DEEPGUARD_BASE_URL") {
        config.base_url = base_url.to_string();
    }
    config.terms_accepted = LocalStorage::get::<bool>(TERMS_STORAGE_KEY).unwrap_or(false);

    match config.validate() {
        Ok(()) => config,
        Err(e) => {
            log::error!("{}; falling back to {}", e, deepguard::config::DEFAULT_BASE_URL);
            ClientConfig {
                terms_accepted: config.terms_accepted,
                ..ClientConfig::default()
            }
        }
    }
}

impl Component for Model {
    type Message = Msg;
    type Properties = ();

    fn create(ctx: &Context<Self>) -> Self {
        let config = load_config();
        log::info!("Detection service at {}", config.base_url);

        let controller = Rc::new(DetectionController::new(
            GlooTransport::new(&config),
            GlooDelay,
            &config,
        ));
        let link = ctx.link().clone();
        controller.subscribe(move |snapshot| link.send_message(Msg::Snapshot(snapshot.clone())));

        let link = ctx.link().clone();
        let paste_listener = web_sys::window().map(|window| {
            EventListener::new(&window, "paste", move |event| {
                if let Some(clipboard_event) = event.dyn_ref::<ClipboardEvent>() {
                    link.send_message(Msg::HandlePaste(clipboard_event.clone()));
                }
            })
        });

        Self {
            snapshot: controller.snapshot(),
            controller,
            selection: PreviewSlot::new(),
            terms_accepted: config.terms_accepted,
            show_detail: false,
            reading_file: false,
            notice: None,
            is_dragging: false,
            paste_listener,
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            Msg::FileChosen(file) => handlers::handle_file_chosen(self, ctx, file),
            Msg::FileLoaded(file, bytes) => handlers::handle_file_loaded(self, ctx, file, bytes),
            Msg::ClearSelection => handlers::handle_clear_selection(self),

            Msg::Analyze => handlers::handle_analyze(self, ctx),
            Msg::Retry => handlers::handle_retry(self, ctx),
            Msg::Snapshot(snapshot) => handlers::handle_snapshot(self, snapshot),

            Msg::AcceptTerms => handlers::handle_accept_terms(self),
            Msg::ToggleDetail => {
                self.show_detail = !self.show_detail;
                true
            }
            Msg::SetNotice(notice) => {
                self.notice = notice;
                self.reading_file = false;
                true
            }
            Msg::SetDragging(is_dragging) => {
                self.is_dragging = is_dragging;
                true
            }

            Msg::HandleDrop(event) => handlers::handle_drop(self, ctx, event),
            Msg::HandlePaste(event) => handlers::handle_paste(self, ctx, event),
        }
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        let content = if !self.terms_accepted {
            consent::render_consent(ctx)
        } else {
            match self.snapshot.view() {
                View::Empty => html! {
                    <>
                        { upload_section::render_upload_section(self, ctx) }
                        { preview_area::render_preview_area(self, ctx) }
                    </>
                },
                View::Uploading { task, attempt } => results::render_loading(self, task, attempt),
                View::Result(report) if self.show_detail => results::render_report(report, ctx),
                View::Result(report) => html! {
                    <>
                        { results::render_results(self, report, ctx) }
                        { upload_section::render_upload_section(self, ctx) }
                    </>
                },
                View::Error(failure) => html! {
                    <>
                        { results::render_failure(failure, ctx) }
                        { upload_section::render_upload_section(self, ctx) }
                    </>
                },
            }
        };

        html! {
            <div class="container">
                { header::render_header() }

                <main class="main-content">
                    { utils::render_notice(self) }
                    { content }
                </main>

                <footer class="app-footer">
                    <p>{"DeepGuard | Fullstack Rust WASM"}</p>
                </footer>
            </div>
        }
    }

    fn destroy(&mut self, _ctx: &Context<Self>) {
        if self.controller.cancel() {
            log::info!("Cancelled in-flight detection on teardown");
        }
        self.paste_listener = None;
        self.selection.clear();
    }
}

fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("App starting...");
    yew::Renderer::<Model>::new().render();
}
