// huellas-core/src/services/entitlements.rs
//! Premium entitlement state.
//!
//! Constructed once by the embedding app and handed to every component that
//! gates on it. Clones share the same flag, so a purchase observed by the
//! store layer is immediately visible to the list controller.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct Entitlements {
    premium: Arc<AtomicBool>,
}

impl Entitlements {
    pub fn free() -> Self {
        Self::default()
    }

    pub fn premium() -> Self {
        let e = Self::default();
        e.set_premium(true);
        e
    }

    pub fn is_premium(&self) -> bool {
        self.premium.load(Ordering::SeqCst)
    }

    pub fn set_premium(&self, premium: bool) {
        let was = self.premium.swap(premium, Ordering::SeqCst);
        if was != premium {
            tracing::info!(premium, "entitlement changed");
        }
    }
}
