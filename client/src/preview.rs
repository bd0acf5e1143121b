use shared::AnalysisRequest;

/// The currently selected file and the handle backing its on-screen preview.
///
/// `P` is whatever the adapter uses to show the file (an object URL in the
/// browser). Selecting a new file or clearing the slot drops the previous
/// handle, which is where adapters release the underlying resource.
#[derive(Debug)]
pub struct PreviewSlot<P> {
    current: Option<(AnalysisRequest, P)>,
}

impl<P> Default for PreviewSlot<P> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<P> PreviewSlot<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, request: AnalysisRequest, preview: P) {
        if let Some((previous, _)) = self.current.replace((request, preview)) {
            log::debug!("Released preview for {}", previous.file_name());
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn request(&self) -> Option<&AnalysisRequest> {
        self.current.as_ref().map(|(request, _)| request)
    }

    pub fn preview(&self) -> Option<&P> {
        self.current.as_ref().map(|(_, preview)| preview)
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}
