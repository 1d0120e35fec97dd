use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::preferences::{AppSnapshot, Breadcrumb, DeviceClass, Language, ResolvedTheme, Theme};
use crate::lock;
use crate::storage::{Storage, keys};
use crate::ui::{Notice, Notifier, Presentation};

pub const APP_TITLE: &str = "Todo List Plus";
const DEFAULT_LOADING_TEXT: &str = "Loading...";

struct PreferenceState {
    theme: Theme,
    language: Language,
    sidebar_collapsed: bool,
    loading: bool,
    loading_text: String,
    /// `None` until the first viewport width is seen.
    device: Option<DeviceClass>,
    system_prefers_dark: bool,
    online: bool,
    page_title: String,
    breadcrumbs: Vec<Breadcrumb>,
}

impl PreferenceState {
    fn new(theme: Theme, language: Language) -> Self {
        Self {
            theme,
            language,
            sidebar_collapsed: false,
            loading: false,
            loading_text: DEFAULT_LOADING_TEXT.to_string(),
            device: None,
            system_prefers_dark: false,
            online: true,
            page_title: APP_TITLE.to_string(),
            breadcrumbs: Vec::new(),
        }
    }
}

/// Theme, language, layout and environment signals. Every persisted preference is
/// written through to the local storage tier; write failures are logged only.
pub struct PreferenceStore {
    state: Mutex<PreferenceState>,
    storage: Storage,
    presentation: Arc<dyn Presentation>,
    notifier: Arc<dyn Notifier>,
    default_theme: Theme,
    default_language: Language,
}

impl PreferenceStore {
    pub fn new(storage: Storage, presentation: Arc<dyn Presentation>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_defaults(storage, presentation, notifier, Theme::default(), Language::default())
    }

    /// Store whose initial and reset values are `theme` and `language`.
    pub fn with_defaults(
        storage: Storage,
        presentation: Arc<dyn Presentation>,
        notifier: Arc<dyn Notifier>,
        theme: Theme,
        language: Language,
    ) -> Self {
        Self {
            state: Mutex::new(PreferenceState::new(theme, language)),
            storage,
            presentation,
            notifier,
            default_theme: theme,
            default_language: language,
        }
    }

    fn state(&self) -> MutexGuard<'_, PreferenceState> {
        lock(&self.state)
    }

    /// Restore persisted preferences, classify the viewport and apply the result.
    pub fn init(&self, viewport_width: u32) {
        if let Some(theme) = self.read(keys::THEME).and_then(|raw| parse_or_warn(&raw, Theme::parse)) {
            self.state().theme = theme;
        }
        if let Some(language) = self.read(keys::LANGUAGE).and_then(|raw| parse_or_warn(&raw, Language::parse)) {
            self.state().language = language;
        }
        if let Some(collapsed) = self.read(keys::SIDEBAR_COLLAPSED).and_then(|raw| {
            parse_or_warn(&raw, |s| serde_json::from_str::<bool>(s).ok())
        }) {
            self.state().sidebar_collapsed = collapsed;
        }

        self.detect_device_type(viewport_width);
        self.apply_theme();
        let language = self.state().language;
        self.presentation.apply_language(language);
    }

    pub fn theme(&self) -> Theme {
        self.state().theme
    }

    pub fn language(&self) -> Language {
        self.state().language
    }

    pub fn sidebar_collapsed(&self) -> bool {
        self.state().sidebar_collapsed
    }

    /// The theme in effect, with `auto` resolved against the OS preference.
    pub fn current_theme(&self) -> ResolvedTheme {
        let state = self.state();
        state.theme.resolve(state.system_prefers_dark)
    }

    pub fn set_theme(&self, theme: Theme) {
        self.state().theme = theme;
        self.write(keys::THEME, theme.as_str());
        self.apply_theme();
    }

    pub fn toggle_theme(&self) {
        let next = self.theme().next();
        self.set_theme(next);
    }

    pub fn set_language(&self, language: Language) {
        self.state().language = language;
        self.write(keys::LANGUAGE, language.as_tag());
        self.presentation.apply_language(language);
    }

    pub fn toggle_sidebar(&self) {
        let collapsed = !self.sidebar_collapsed();
        self.set_sidebar_collapsed(collapsed);
    }

    pub fn set_sidebar_collapsed(&self, collapsed: bool) {
        self.state().sidebar_collapsed = collapsed;
        self.write(keys::SIDEBAR_COLLAPSED, if collapsed { "true" } else { "false" });
    }

    /// Reclassify the viewport. Entering the mobile class collapses the sidebar;
    /// resizes that stay mobile leave a manually expanded sidebar alone.
    pub fn detect_device_type(&self, width: u32) {
        let device = DeviceClass::from_width(width);
        let previous = self.state().device.replace(device);
        if previous != Some(device) {
            log::debug!("Viewport {}px classified as {:?}", width, device);
        }
        if device == DeviceClass::Mobile && previous != Some(DeviceClass::Mobile) {
            self.set_sidebar_collapsed(true);
        }
    }

    pub fn device_class(&self) -> DeviceClass {
        self.state().device.unwrap_or(DeviceClass::Desktop)
    }

    pub fn is_mobile(&self) -> bool {
        self.device_class() == DeviceClass::Mobile
    }

    /// OS color-scheme signal. Only matters while the theme is `auto`.
    pub fn set_system_prefers_dark(&self, dark: bool) {
        let changed = {
            let mut state = self.state();
            let before = state.theme.resolve(state.system_prefers_dark);
            state.system_prefers_dark = dark;
            before != state.theme.resolve(dark)
        };
        if changed {
            self.apply_theme();
        }
    }

    pub fn set_online(&self, online: bool) {
        let was_online = std::mem::replace(&mut self.state().online, online);
        match (was_online, online) {
            (false, true) => self.notifier.notify(Notice::success("Network connection restored")),
            (true, false) => self.notifier.notify(Notice::warning("Network connection lost")),
            _ => {}
        }
    }

    pub fn is_online(&self) -> bool {
        self.state().online
    }

    pub fn show_loading(&self, text: Option<&str>) {
        let mut state = self.state();
        state.loading = true;
        if let Some(text) = text {
            state.loading_text = text.to_string();
        }
    }

    pub fn hide_loading(&self) {
        let mut state = self.state();
        state.loading = false;
        state.loading_text = DEFAULT_LOADING_TEXT.to_string();
    }

    pub fn loading(&self) -> bool {
        self.state().loading
    }

    pub fn loading_text(&self) -> String {
        self.state().loading_text.clone()
    }

    pub fn set_page_title(&self, title: &str) {
        self.state().page_title = title.to_string();
        self.presentation.set_title(&format!("{} - {}", title, APP_TITLE));
    }

    pub fn page_title(&self) -> String {
        self.state().page_title.clone()
    }

    pub fn set_breadcrumbs(&self, crumbs: Vec<Breadcrumb>) {
        self.state().breadcrumbs = crumbs;
    }

    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.state().breadcrumbs.clone()
    }

    pub fn snapshot(&self) -> AppSnapshot {
        let state = self.state();
        AppSnapshot {
            theme: state.theme,
            language: state.language,
            sidebar_collapsed: state.sidebar_collapsed,
            loading: state.loading,
        }
    }

    /// Back to defaults, forgetting every persisted preference.
    pub fn reset(&self) {
        {
            let mut state = self.state();
            state.theme = self.default_theme;
            state.language = self.default_language;
            state.sidebar_collapsed = false;
            state.loading = false;
            state.loading_text = DEFAULT_LOADING_TEXT.to_string();
            state.breadcrumbs.clear();
            state.page_title = APP_TITLE.to_string();
        }
        for key in [keys::THEME, keys::LANGUAGE, keys::SIDEBAR_COLLAPSED] {
            if let Err(e) = self.storage.local.remove(key) {
                log::error!("Failed to remove {}: {}", key, e);
            }
        }
        self.apply_theme();
    }

    fn apply_theme(&self) {
        let theme = self.current_theme();
        self.presentation.apply_theme(theme);
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.local.get(key) {
            Ok(value) => value,
            Err(e) => {
                log::error!("Failed to read {}: {}", key, e);
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.local.set(key, value, None) {
            log::error!("Failed to save {}: {}", key, e);
        }
    }
}

fn parse_or_warn<T>(raw: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
    let parsed = parse(raw);
    if parsed.is_none() {
        log::warn!("Ignoring stored preference {:?}", raw);
    }
    parsed
}
