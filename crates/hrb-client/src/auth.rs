//! Session identity state.

/// The identity a [`Session`](crate::Session) acts as.
///
/// Freshly constructed sessions are anonymous. A successful `login` records
/// the user name together with the session token issued by the server (the
/// value of its `id` cookie); `logout` clears both. The token is only ever
/// presented by the Session owning this context, never shared, and a
/// token the server has since invalidated simply earns `Forbidden` on the
/// next call.
#[derive(Clone, Debug, Default)]
pub struct AuthContext {
    user: Option<String>,
    token: Option<String>,
}

impl AuthContext {
    /// The authenticated user name, or `None` when anonymous.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Whether a session token is currently held.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub(crate) fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub(crate) fn set(&mut self, user: String, token: String) {
        self.user = Some(user);
        self.token = Some(token);
    }

    pub(crate) fn clear(&mut self) {
        self.user = None;
        self.token = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle() {
        let mut auth = AuthContext::default();
        assert_eq!(auth.user(), None);
        assert!(!auth.is_authenticated());

        auth.set("sumsum".into(), "deadbeef".into());
        assert_eq!(auth.user(), Some("sumsum"));
        assert_eq!(auth.token(), Some("deadbeef"));
        assert!(auth.is_authenticated());

        auth.clear();
        assert_eq!(auth.user(), None);
        assert!(!auth.is_authenticated());
    }
}
