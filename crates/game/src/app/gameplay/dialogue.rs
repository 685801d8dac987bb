/// The dialogue collaborator. Opening takes movement away from the player;
/// closing hands it back.
trait DialogueFlow {
    fn show(&mut self, speaker: &str, text: &str, gate: &mut MovementGate);
    fn is_open(&self) -> bool;
    /// Moves to the next page, closing after the last one.
    fn advance(&mut self, gate: &mut MovementGate);
    fn panel(&self) -> Option<TextPanel>;
}

#[derive(Debug, Clone, Copy)]
struct DialogueHooks {
    on_open: fn(&mut MovementGate),
    on_close: fn(&mut MovementGate),
}

impl Default for DialogueHooks {
    fn default() -> Self {
        Self {
            on_open: MovementGate::disable,
            on_close: MovementGate::enable,
        }
    }
}

/// Bottom-of-screen dialogue. Blank lines in the authored text split it into
/// pages.
#[derive(Debug, Default)]
struct DialogueBox {
    hooks: DialogueHooks,
    speaker: String,
    pages: Vec<String>,
    page: usize,
    open: bool,
}

impl DialogueBox {
    fn split_pages(text: &str) -> Vec<String> {
        let pages: Vec<String> = text
            .split("\n\n")
            .map(|page| page.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|page| !page.is_empty())
            .collect();
        if pages.is_empty() {
            vec![DEFAULT_DIALOGUE.to_string()]
        } else {
            pages
        }
    }

    fn close(&mut self, gate: &mut MovementGate) {
        self.open = false;
        self.pages.clear();
        self.page = 0;
        (self.hooks.on_close)(gate);
        debug!(speaker = %self.speaker, "dialogue_closed");
    }
}

impl DialogueFlow for DialogueBox {
    fn show(&mut self, speaker: &str, text: &str, gate: &mut MovementGate) {
        self.speaker = speaker.to_string();
        self.pages = Self::split_pages(text);
        self.page = 0;
        self.open = true;
        (self.hooks.on_open)(gate);
        debug!(speaker, pages = self.pages.len(), "dialogue_opened");
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn advance(&mut self, gate: &mut MovementGate) {
        if !self.open {
            return;
        }
        if self.page + 1 < self.pages.len() {
            self.page += 1;
        } else {
            self.close(gate);
        }
    }

    fn panel(&self) -> Option<TextPanel> {
        if !self.open {
            return None;
        }
        let body = self.pages.get(self.page)?;
        let title = if self.pages.len() > 1 {
            format!("{} ({}/{})", self.speaker, self.page + 1, self.pages.len())
        } else {
            self.speaker.clone()
        };
        Some(TextPanel::new(title, body.clone()))
    }
}
