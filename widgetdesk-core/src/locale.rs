// widgetdesk-core/src/locale.rs
//! Explicit locale context for host and widget UI strings.

use crate::event::{Event, EventBus, LocaleChanged, TOPIC_LOCALE_CHANGED};
use tracing::{info, warn};

type Catalog = &'static [(&'static str, &'static str)];

const EN: Catalog = &[
    ("settings.title", "Settings"),
    ("settings.widgets", "Widgets"),
    ("settings.language", "Language"),
    ("settings.rescan", "Rescan widgets"),
    ("settings.quit", "Quit"),
    ("settings.hint", "[Up/Down] Move  [Enter/Space] Select  [F2/Esc] Close"),
    ("settings.widget_settings", "Widget settings"),
    ("settings.no_options", "No editable settings"),
    ("settings.edit_hint", "[Enter] Edit  [Esc] Back"),
    ("settings.invalid", "Invalid value"),
    ("overlay.empty", "No active widgets. Press F2 to open settings."),
    ("overlay.hint", "[F2] Settings  [Tab] Focus  [Ctrl+Q] Quit"),
    ("widget.failed", "Widget failed to activate"),
    ("clock.title", "Clock"),
    ("todo.title", "To-do"),
    ("todo.empty", "Nothing to do"),
    ("todo.input", "New item"),
    ("notes.title", "Notes"),
    ("notes.empty", "Start typing..."),
    ("calculator.title", "Calculator"),
    ("calculator.error", "Error"),
    ("sysmon.title", "System"),
    ("pomodoro.title", "Pomodoro"),
    ("pomodoro.work", "Work"),
    ("pomodoro.break", "Break"),
    ("pomodoro.paused", "Paused"),
    ("pomodoro.sessions", "Sessions"),
    ("calendar.title", "Calendar"),
    ("calendar.weekdays", "Mo Tu We Th Fr Sa Su"),
    (
        "calendar.months",
        "January,February,March,April,May,June,July,August,September,October,November,December",
    ),
];

const NL: Catalog = &[
    ("settings.title", "Instellingen"),
    ("settings.widgets", "Widgets"),
    ("settings.language", "Taal"),
    ("settings.rescan", "Widgets opnieuw zoeken"),
    ("settings.quit", "Afsluiten"),
    ("settings.hint", "[Op/Neer] Verplaats  [Enter/Spatie] Kies  [F2/Esc] Sluit"),
    ("settings.widget_settings", "Widgetinstellingen"),
    ("settings.no_options", "Geen instelbare opties"),
    ("settings.edit_hint", "[Enter] Wijzig  [Esc] Terug"),
    ("settings.invalid", "Ongeldige waarde"),
    ("overlay.empty", "Geen actieve widgets. Druk op F2 voor instellingen."),
    ("overlay.hint", "[F2] Instellingen  [Tab] Focus  [Ctrl+Q] Afsluiten"),
    ("widget.failed", "Widget kon niet worden geactiveerd"),
    ("clock.title", "Klok"),
    ("todo.title", "Takenlijst"),
    ("todo.empty", "Niets te doen"),
    ("todo.input", "Nieuwe taak"),
    ("notes.title", "Notities"),
    ("notes.empty", "Begin met typen..."),
    ("calculator.title", "Rekenmachine"),
    ("calculator.error", "Fout"),
    ("sysmon.title", "Systeem"),
    ("pomodoro.title", "Pomodoro"),
    ("pomodoro.work", "Werken"),
    ("pomodoro.break", "Pauze"),
    ("pomodoro.paused", "Gepauzeerd"),
    ("pomodoro.sessions", "Sessies"),
    ("calendar.title", "Kalender"),
    ("calendar.weekdays", "Ma Di Wo Do Vr Za Zo"),
    (
        "calendar.months",
        "januari,februari,maart,april,mei,juni,juli,augustus,september,oktober,november,december",
    ),
];

/// Languages with a built-in catalog, as (code, display name)
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[("en", "English"), ("nl", "Nederlands")];

/// A language code bound to its message catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locale {
    language: &'static str,
    catalog: Catalog,
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            language: "en",
            catalog: EN,
        }
    }
}

impl Locale {
    /// Unknown languages fall back to English
    pub fn new(language: &str) -> Self {
        match language {
            "nl" => Self {
                language: "nl",
                catalog: NL,
            },
            "en" => Self::default(),
            other => {
                warn!(language = other, "no catalog for language, using English");
                Self::default()
            }
        }
    }

    pub fn language(&self) -> &'static str {
        self.language
    }

    /// Translate `key`; falls back to English, then to the key itself
    pub fn tr<'a>(&self, key: &'a str) -> &'a str {
        lookup(self.catalog, key)
            .or_else(|| lookup(EN, key))
            .unwrap_or(key)
    }
}

fn lookup(catalog: Catalog, key: &str) -> Option<&'static str> {
    catalog.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Owner of the current locale; announces changes on the event bus
pub struct LocaleContext {
    current: Locale,
    bus: EventBus,
}

impl LocaleContext {
    pub fn new(language: &str, bus: EventBus) -> Self {
        Self {
            current: Locale::new(language),
            bus,
        }
    }

    pub fn current(&self) -> Locale {
        self.current
    }

    /// Switch language and notify observers; returns false if nothing changed
    pub fn set_language(&mut self, language: &str) -> bool {
        let next = Locale::new(language);
        if next == self.current {
            return false;
        }

        self.current = next;
        info!(language = next.language(), "language changed");
        self.bus.publish(Event::new(
            TOPIC_LOCALE_CHANGED,
            LocaleChanged {
                language: next.language().to_string(),
            },
        ));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_and_fallbacks() {
        let nl = Locale::new("nl");
        assert_eq!(nl.tr("settings.quit"), "Afsluiten");
        assert_eq!(nl.tr("no.such.key"), "no.such.key");

        let unknown = Locale::new("xx");
        assert_eq!(unknown.language(), "en");
        assert_eq!(unknown.tr("settings.quit"), "Quit");
    }

    #[test]
    fn test_catalogs_cover_same_keys() {
        for (key, _) in EN {
            assert!(lookup(NL, key).is_some(), "missing nl entry for {key}");
        }
    }

    #[test]
    fn test_set_language_notifies_observers() {
        let bus = EventBus::new();
        let (_sub, rx) = bus.subscribe(TOPIC_LOCALE_CHANGED);
        let mut ctx = LocaleContext::new("en", bus);

        assert!(!ctx.set_language("en"));
        assert!(rx.try_recv().is_err());

        assert!(ctx.set_language("nl"));
        let event = rx.try_recv().unwrap();
        let payload = event.payload.downcast::<LocaleChanged>().unwrap();
        assert_eq!(payload.language, "nl");
        assert_eq!(ctx.current().language(), "nl");
    }
}
