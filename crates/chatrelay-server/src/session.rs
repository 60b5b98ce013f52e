use parking_lot::RwLock;

/// Source/target language codes for translation requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Mutable state of one client session, owned by its connection handler.
///
/// Selections made on one connection never leak into another: every handler
/// starts from a snapshot of [`SharedDefaults`] and mutates only its own copy.
#[derive(Clone, Debug)]
pub struct SessionState {
    pub model: String,
    pub languages: LanguagePair,
}

impl SessionState {
    /// Apply a language-selection message. Unset fields are left unchanged.
    pub fn apply_languages(&mut self, source: Option<&str>, target: Option<&str>) {
        if let Some(source) = source {
            let source = source.trim();
            if !source.is_empty() {
                self.languages.source = source.to_string();
            }
        }
        if let Some(target) = target {
            let target = target.trim();
            if !target.is_empty() {
                self.languages.target = target.to_string();
            }
        }
    }
}

/// System-wide session defaults, shared read-mostly across acceptors.
///
/// Handlers snapshot this once at accept time; there is no write path from
/// a connection back into the defaults.
pub struct SharedDefaults {
    inner: RwLock<SessionState>,
}

impl SharedDefaults {
    pub fn new(model: impl Into<String>, languages: LanguagePair) -> Self {
        Self {
            inner: RwLock::new(SessionState {
                model: model.into(),
                languages,
            }),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.read().clone()
    }
}
