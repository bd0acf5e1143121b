use super::super::{Model, Msg, TERMS_STORAGE_KEY};
use deepguard::WorkflowSnapshot;
use gloo_file::{File as GlooFile, ObjectUrl};
use gloo_storage::{LocalStorage, Storage};
use shared::AnalysisRequest;
use std::rc::Rc;
use wasm_bindgen_futures::spawn_local;
use web_sys::{ClipboardEvent, DragEvent, FileList};
use yew::prelude::*;

/// Checks size and type before anything is read, so oversize files never
/// reach memory.
pub fn handle_file_chosen(model: &mut Model, ctx: &Context<Model>, file: GlooFile) -> bool {
    if model.is_busy() {
        log::warn!("Ignored {}: the current file is still being analyzed", file.name());
        return false;
    }

    let checked = AnalysisRequest::check_size(file.size())
        .and_then(|_| AnalysisRequest::check_media_type(&file.raw_mime_type()));
    if let Err(e) = checked {
        log::warn!("Rejected {}: {}", file.name(), e);
        model.notice = Some(e.to_string());
        return true;
    }

    model.notice = None;
    model.reading_file = true;

    let link = ctx.link().clone();
    spawn_local(async move {
        match gloo_file::futures::read_as_bytes(&file).await {
            Ok(bytes) => link.send_message(Msg::FileLoaded(file, bytes)),
            Err(e) => {
                log::error!("Failed to read {}: {}", file.name(), e);
                link.send_message(Msg::SetNotice(Some(format!(
                    "Could not read {}.",
                    file.name()
                ))));
            }
        }
    });

    true
}

pub fn handle_file_loaded(
    model: &mut Model,
    ctx: &Context<Model>,
    file: GlooFile,
    bytes: Vec<u8>,
) -> bool {
    model.reading_file = false;
    if model.snapshot.is_loading() {
        log::warn!("Ignored {}: the current file is still being analyzed", file.name());
        return true;
    }

    match AnalysisRequest::new(file.name(), &file.raw_mime_type(), bytes) {
        Ok(request) => {
            log::info!(
                "Selected {} ({}, {} bytes)",
                request.file_name(),
                request.media_type(),
                request.size()
            );
            model.selection.select(request, ObjectUrl::from(file));
            model.show_detail = false;
            ctx.link().send_message(Msg::Analyze);
        }
        Err(e) => model.notice = Some(e.to_string()),
    }
    true
}

pub fn handle_clear_selection(model: &mut Model) -> bool {
    model.selection.clear();
    model.notice = None;
    model.show_detail = false;
    true
}

pub fn handle_analyze(model: &mut Model, ctx: &Context<Model>) -> bool {
    let Some(request) = model.selection.request().cloned() else {
        model.notice = Some("No file selected for analysis.".into());
        return true;
    };

    let controller = Rc::clone(&model.controller);
    let link = ctx.link().clone();
    spawn_local(async move {
        if let Err(e) = controller.start(request).await {
            log::warn!("Detection not started: {}", e);
            link.send_message(Msg::SetNotice(Some(e.to_string())));
        }
    });

    model.notice = None;
    model.show_detail = false;
    true
}

pub fn handle_retry(model: &mut Model, ctx: &Context<Model>) -> bool {
    let controller = Rc::clone(&model.controller);
    let link = ctx.link().clone();
    spawn_local(async move {
        if let Err(e) = controller.retry().await {
            log::warn!("Retry not started: {}", e);
            link.send_message(Msg::SetNotice(Some(e.to_string())));
        }
    });

    model.notice = None;
    false
}

pub fn handle_snapshot(model: &mut Model, snapshot: WorkflowSnapshot) -> bool {
    if snapshot.generation < model.snapshot.generation {
        return false;
    }
    model.snapshot = snapshot;
    true
}

pub fn handle_accept_terms(model: &mut Model) -> bool {
    if let Err(e) = LocalStorage::set(TERMS_STORAGE_KEY, true) {
        log::error!("Failed to persist consent: {}", e);
    }
    model.controller.set_terms_accepted(true);
    model.terms_accepted = true;
    true
}

pub fn handle_drop(model: &mut Model, ctx: &Context<Model>, event: DragEvent) -> bool {
    event.prevent_default();
    model.is_dragging = false;

    if let Some(file_list) = event.data_transfer().and_then(|data| data.files()) {
        process_file_list(ctx, file_list);
    }

    true
}

pub fn handle_paste(model: &mut Model, ctx: &Context<Model>, event: ClipboardEvent) -> bool {
    if !model.terms_accepted || model.is_busy() {
        return false;
    }
    if let Some(file_list) = event.clipboard_data().and_then(|data| data.files()) {
        if file_list.length() > 0 {
            event.prevent_default();
            process_file_list(ctx, file_list);
            return true;
        }
    }
    false
}

/// Only the first file is analyzed; the rest are ignored.
pub fn process_file_list(ctx: &Context<Model>, file_list: FileList) {
    if file_list.length() > 1 {
        log::warn!("{} files supplied, analyzing the first", file_list.length());
    }
    if let Some(file) = file_list.item(0) {
        ctx.link().send_message(Msg::FileChosen(GlooFile::from(file)));
    }
}
