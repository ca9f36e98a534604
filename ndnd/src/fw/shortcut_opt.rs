use log::debug;
use ndn_core::{Interest, Name};

use crate::fw::forwarder::Forwarder;

/// Shortcut-opt plug-in
///
/// When enabled, every CS miss whose Interest name falls under the trigger
/// prefix broadcasts a synthesized shortcut Interest (carrying the original's
/// application parameters) to the local faces reachable through FIB entries
/// under that prefix. Local services watching the shortcut name can then
/// issue their upstream Interests early. The plug-in does nothing unless it
/// appears in the configuration.
#[derive(Debug, Clone)]
pub struct ShortcutOpt {
    trigger_prefix: Name,
    shortcut_name: Name,
}

impl ShortcutOpt {
    pub const DEFAULT_TRIGGER_PREFIX: &'static str = "/interCACHE";
    pub const DEFAULT_SHORTCUT_NAME: &'static str = "/interCACHE/shortcutOPT";

    pub fn new(trigger_prefix: Name, shortcut_name: Name) -> Self {
        Self { trigger_prefix, shortcut_name }
    }

    pub fn trigger_prefix(&self) -> &Name {
        &self.trigger_prefix
    }

    /// CS-miss hook: synthesize and broadcast the shortcut Interest
    pub fn after_content_store_miss(&self, fw: &mut Forwarder, interest: &Interest) {
        if !self.trigger_prefix.is_prefix_of(&interest.name) {
            return;
        }

        let mut shortcut = Interest::new(self.shortcut_name.clone());
        if let Some(params) = &interest.application_parameters {
            shortcut = shortcut.with_application_parameters(params.clone());
        }
        shortcut.nonce = Some(rand::random());

        for face in fw.local_fib_next_hop_faces(&self.trigger_prefix) {
            debug!("shortcut-opt interest={} out={}", shortcut.name, face);
            fw.send_interest_direct(face, &shortcut);
        }
    }
}

impl Default for ShortcutOpt {
    fn default() -> Self {
        Self::new(
            Name::from_str(Self::DEFAULT_TRIGGER_PREFIX),
            Name::from_str(Self::DEFAULT_SHORTCUT_NAME),
        )
    }
}
