/// Progress of one model, by display name.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadingEntry {
    pub name: String,
    pub progress: f32,
    pub in_scene: bool,
}

/// What the loading screen shows: models still streaming and models that failed.
#[derive(Default, Debug)]
pub struct LoadingBoard {
    entries: Vec<LoadingEntry>,
    errors: Vec<String>,
    initialization_failed: bool,
}

impl LoadingBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LoadingEntry] {
        &self.entries
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn initialization_failed(&self) -> bool {
        self.initialization_failed
    }

    pub fn is_loading(&self) -> bool {
        self.entries.iter().any(|entry| !entry.in_scene)
    }

    /// Mean progress over every listed model, in `[0, 100]`.
    pub fn overall(&self) -> f32 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.entries.iter().map(|entry| entry.progress).sum::<f32>() / self.entries.len() as f32
    }

    /// Streaming progress tops out at 99 until the model is actually in the scene.
    pub fn progress(&mut self, name: &str, progress: f32) {
        let progress = progress.clamp(0.0, 99.0);
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) if entry.in_scene => {}
            Some(entry) => entry.progress = progress,
            None => self.entries.push(LoadingEntry {
                name: name.to_owned(),
                progress,
                in_scene: false,
            }),
        }
    }

    pub fn in_scene(&mut self, name: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.name == name) {
            entry.in_scene = true;
            entry.progress = 100.0;
        }
    }

    /// A failed model leaves the loading list for the error list.
    pub fn failed(&mut self, name: &str) {
        self.entries.retain(|entry| entry.name != name);
        self.errors.push(name.to_owned());
    }

    pub fn fail_initialization(&mut self) {
        self.initialization_failed = true;
    }

    /// One line summary for the window title.
    pub fn status_line(&self) -> Option<String> {
        if self.initialization_failed {
            return Some("scene configuration unavailable".to_owned());
        }
        let mut parts = Vec::new();
        if self.is_loading() {
            parts.push(format!("loading {:.0}%", self.overall()));
        }
        if !self.errors.is_empty() {
            parts.push(format!("failed: {}", self.errors.join(", ")));
        }
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_capped_until_in_scene() {
        let mut board = LoadingBoard::new();
        board.progress("Book", 100.0);
        assert_eq!(board.entries()[0].progress, 99.0);
        assert!(board.is_loading());

        board.in_scene("Book");
        assert_eq!(board.entries()[0].progress, 100.0);
        assert!(!board.is_loading());

        board.progress("Book", 50.0);
        assert_eq!(board.entries()[0].progress, 100.0);
    }

    #[test]
    fn loading_until_every_model_is_in_scene() {
        let mut board = LoadingBoard::new();
        board.progress("Book", 10.0);
        board.progress("Bonsai", 40.0);
        board.in_scene("Book");
        assert!(board.is_loading());
        assert_eq!(board.status_line().as_deref(), Some("loading 70%"));

        board.in_scene("Bonsai");
        assert!(board.status_line().is_none());
    }

    #[test]
    fn failures_move_to_error_list() {
        let mut board = LoadingBoard::new();
        board.progress("Planks", 30.0);
        board.failed("Planks");
        board.failed("Dualshock");

        assert!(!board.is_loading());
        assert_eq!(board.errors(), ["Planks", "Dualshock"]);
        assert_eq!(board.status_line().as_deref(), Some("failed: Planks, Dualshock"));
    }
}
