//! Install-banner eligibility.

use crate::prefs::KeyValueStore;

/// Key of the persisted "banner dismissed" flag.
pub const INSTALL_DISMISSED_KEY: &str = "pwa_install_dismissed";

/// Environment checks the banner decision depends on.
pub trait Capabilities {
    /// Already running as an installed app.
    fn is_standalone(&self) -> bool;
    fn is_ios(&self) -> bool;
    fn is_safari(&self) -> bool;
}

/// Capabilities derived from a user-agent string.
#[derive(Debug, Clone)]
pub struct UserAgentCapabilities {
    user_agent: String,
    standalone: bool,
}

impl UserAgentCapabilities {
    /// Capabilities sniffed from `user_agent`.
    #[must_use]
    pub fn new(user_agent: impl Into<String>, standalone: bool) -> Self {
        Self {
            user_agent: user_agent.into(),
            standalone,
        }
    }
}

impl Capabilities for UserAgentCapabilities {
    fn is_standalone(&self) -> bool {
        self.standalone
    }

    fn is_ios(&self) -> bool {
        ["iPad", "iPhone", "iPod"]
            .iter()
            .any(|device| self.user_agent.contains(device))
    }

    /// "safari" with no "chrome" or "android" anywhere before it.
    fn is_safari(&self) -> bool {
        let ua = self.user_agent.to_ascii_lowercase();
        ua.find("safari").is_some_and(|at| {
            let before = &ua[..at];
            !before.contains("chrome") && !before.contains("android")
        })
    }
}

/// What the install banner should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerMode {
    /// Manual "Add to Home Screen" steps for iOS Safari.
    IosInstructions,
    /// A button that triggers the deferred browser install prompt.
    NativePrompt,
}

/// Tracks whether the install banner should be shown.
#[derive(Debug)]
pub struct InstallPrompt<C> {
    capabilities: C,
    dismissed: bool,
    prompt_available: bool,
}

impl<C: Capabilities> InstallPrompt<C> {
    /// Reads the dismissal flag from `store`.
    pub fn new(capabilities: C, store: &dyn KeyValueStore) -> Self {
        let dismissed = store.get(INSTALL_DISMISSED_KEY).as_deref() == Some("true");
        Self {
            capabilities,
            dismissed,
            prompt_available: false,
        }
    }

    /// The browser deferred an install prompt for later use.
    pub const fn prompt_available(&mut self) {
        self.prompt_available = true;
    }

    /// Whether the banner was dismissed, now or in an earlier session.
    #[must_use]
    pub const fn is_dismissed(&self) -> bool {
        self.dismissed
    }

    /// Which banner to show, if any.
    #[must_use]
    pub fn banner(&self) -> Option<BannerMode> {
        if self.capabilities.is_standalone() || self.dismissed {
            return None;
        }
        if self.capabilities.is_ios() && self.capabilities.is_safari() {
            Some(BannerMode::IosInstructions)
        } else if self.prompt_available {
            Some(BannerMode::NativePrompt)
        } else {
            None
        }
    }

    /// The user closed the banner.
    pub fn dismiss(&mut self, store: &mut dyn KeyValueStore) {
        log::info!("Install banner dismissed by user");
        self.remember(store);
    }

    /// The app was installed.
    pub fn installed(&mut self, store: &mut dyn KeyValueStore) {
        log::info!("App installed");
        self.prompt_available = false;
        self.remember(store);
    }

    fn remember(&mut self, store: &mut dyn KeyValueStore) {
        self.dismissed = true;
        if let Err(e) = store.set(INSTALL_DISMISSED_KEY, "true") {
            log::warn!("Failed to save install dismissal: {e}");
        }
    }
}
