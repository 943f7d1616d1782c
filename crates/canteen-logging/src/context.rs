//! Origin context injection
//!
//! Thread-local storage naming the actor (coordinator, admin, or background
//! job) on whose behalf writes are issued. Queued operations pick the origin
//! up when the caller does not supply one, and spans created inside the scope
//! carry it into the logs.

use std::cell::RefCell;
use std::fmt;

use uuid::Uuid;

/// Origin context data stored in thread-local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginContextData {
    /// The actor's identifier (e.g. a coordinator's user id)
    pub origin_id: String,
    /// What kind of actor this is
    pub role: OriginRole,
    /// Unique id for this session
    pub session_id: Uuid,
}

/// Kind of actor issuing writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginRole {
    /// Confirms weekly attendance
    Coordinator,
    /// Manages menus, coordinators, and backups
    Admin,
    /// Background jobs and tooling
    System,
}

impl fmt::Display for OriginRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginRole::Coordinator => write!(f, "coordinator"),
            OriginRole::Admin => write!(f, "admin"),
            OriginRole::System => write!(f, "system"),
        }
    }
}

thread_local! {
    static ORIGIN_CONTEXT: RefCell<Option<OriginContextData>> = const { RefCell::new(None) };
}

/// RAII guard for origin context
///
/// Sets the origin for the current thread on creation and restores the
/// previous one (if any) on drop. The context is thread-local, so on a
/// multi-threaded runtime it must be read before the first `.await` that
/// could move the task.
///
/// # Example
///
/// ```ignore
/// use canteen_logging::OriginContextGuard;
///
/// let _guard = OriginContextGuard::coordinator("coord-17");
/// tracing::info!("Confirming attendance");
/// ```
pub struct OriginContextGuard {
    previous: Option<OriginContextData>,
}

impl OriginContextGuard {
    /// Set an origin with the given role
    pub fn new(origin_id: impl Into<String>, role: OriginRole) -> Self {
        Self::with_session_id(origin_id, role, Uuid::new_v4())
    }

    /// Set a coordinator origin
    pub fn coordinator(origin_id: impl Into<String>) -> Self {
        Self::new(origin_id, OriginRole::Coordinator)
    }

    /// Set an admin origin
    pub fn admin(origin_id: impl Into<String>) -> Self {
        Self::new(origin_id, OriginRole::Admin)
    }

    /// Set an origin with a specific session id
    ///
    /// Useful to keep one session id across a reload.
    pub fn with_session_id(origin_id: impl Into<String>, role: OriginRole, session_id: Uuid) -> Self {
        let new_ctx = OriginContextData {
            origin_id: origin_id.into(),
            role,
            session_id,
        };
        let previous = ORIGIN_CONTEXT.with(|ctx| ctx.borrow_mut().replace(new_ctx));
        Self { previous }
    }

    /// Get the current origin context (if any)
    pub fn current() -> Option<OriginContextData> {
        ORIGIN_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Get the current origin id (if set)
    pub fn current_origin_id() -> Option<String> {
        ORIGIN_CONTEXT.with(|ctx| ctx.borrow().as_ref().map(|c| c.origin_id.clone()))
    }
}

impl Drop for OriginContextGuard {
    fn drop(&mut self) {
        ORIGIN_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Convenience macro to run a block inside a coordinator origin scope
///
/// # Example
///
/// ```ignore
/// with_origin_context!("coord-17", {
///     tracing::info!("Confirming attendance");
/// });
/// ```
#[macro_export]
macro_rules! with_origin_context {
    ($origin:expr, $body:block) => {{
        let _guard = $crate::context::OriginContextGuard::coordinator($origin);
        $body
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_context_guard() {
        assert!(OriginContextGuard::current().is_none());

        {
            let _guard = OriginContextGuard::coordinator("coord-1");
            let ctx = OriginContextGuard::current().unwrap();
            assert_eq!(ctx.origin_id, "coord-1");
            assert_eq!(ctx.role, OriginRole::Coordinator);
        }

        assert!(OriginContextGuard::current().is_none());
    }

    #[test]
    fn test_nested_contexts() {
        {
            let _coordinator = OriginContextGuard::coordinator("coord-1");
            assert_eq!(
                OriginContextGuard::current_origin_id(),
                Some("coord-1".to_string())
            );

            {
                let _admin = OriginContextGuard::admin("admin-1");
                assert_eq!(
                    OriginContextGuard::current_origin_id(),
                    Some("admin-1".to_string())
                );
            }

            // Restored after the inner guard drops
            assert_eq!(
                OriginContextGuard::current_origin_id(),
                Some("coord-1".to_string())
            );
        }

        assert!(OriginContextGuard::current_origin_id().is_none());
    }

    #[test]
    fn test_with_session_id() {
        let session_id = Uuid::new_v4();
        let _guard = OriginContextGuard::with_session_id("job", OriginRole::System, session_id);

        let ctx = OriginContextGuard::current().unwrap();
        assert_eq!(ctx.session_id, session_id);
        assert_eq!(ctx.role.to_string(), "system");
    }

    #[test]
    fn test_macro_scope() {
        let seen = with_origin_context!("coord-9", { OriginContextGuard::current_origin_id() });
        assert_eq!(seen, Some("coord-9".to_string()));
        assert!(OriginContextGuard::current().is_none());
    }
}
