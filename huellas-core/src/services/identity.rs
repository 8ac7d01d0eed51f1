// huellas-core/src/services/identity.rs
//! Who is signed in. The synchronizer goes quiet when nobody is.

use std::sync::RwLock;

pub trait IdentityProvider: Send + Sync {
    fn current_uid(&self) -> Option<String>;
}

/// Identity set explicitly by the embedding app (or the admin CLI's `--uid`).
#[derive(Debug, Default)]
pub struct StaticIdentity {
    uid: RwLock<Option<String>>,
}

impl StaticIdentity {
    pub fn signed_in(uid: &str) -> Self {
        Self {
            uid: RwLock::new(Some(uid.to_string())),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, uid: &str) {
        if let Ok(mut g) = self.uid.write() {
            *g = Some(uid.to_string());
        }
    }

    pub fn sign_out(&self) {
        if let Ok(mut g) = self.uid.write() {
            *g = None;
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_uid(&self) -> Option<String> {
        self.uid.read().ok().and_then(|g| g.clone())
    }
}
