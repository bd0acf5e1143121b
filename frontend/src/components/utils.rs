use super::super::Model;
use gloo_file::File as GlooFile;
use gloo_timers::callback::Timeout;
use std::cell::RefCell;
use std::rc::Rc;
use web_sys::FileList;
use yew::prelude::*;

// Debounce function to limit button events
pub fn debounce<F>(duration: i32, callback: F) -> Callback<MouseEvent>
where
    F: Fn() + Clone + 'static,
{
    let timeout = Rc::new(RefCell::new(None::<Timeout>));
    let timeout_clone = Rc::clone(&timeout);

    Callback::from(move |_| {
        let mut timeout_ref = timeout_clone.borrow_mut();

        if let Some(old_timeout) = timeout_ref.take() {
            old_timeout.cancel();
        }

        let inner_callback = callback.clone();
        let new_timeout = Timeout::new(duration as u32, move || {
            inner_callback();
        });

        *timeout_ref = Some(new_timeout);
    })
}

pub fn first_file(file_list: &FileList) -> Option<GlooFile> {
    file_list.item(0).map(GlooFile::from)
}

/// Local problems (rejected file, request already running) shown above the
/// current view. Service failures have their own error view.
pub fn render_notice(model: &Model) -> Html {
    if let Some(notice) = &model.notice {
        html! {
            <div class="error-message">
                <i class="fa-solid fa-circle-exclamation"></i>
                <p>{ notice }</p>
            </div>
        }
    } else {
        html! {}
    }
}

/// Data URL for a base64 image field, which may already be a data URL.
pub fn image_src(encoded: &str) -> String {
    if encoded.starts_with("data:") {
        encoded.to_string()
    } else {
        format!("data:image/png;base64,{}", encoded)
    }
}
