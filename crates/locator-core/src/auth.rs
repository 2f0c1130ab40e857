use crate::source::AuthorizationStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    RequestPermission,
    /// Stop the source and park the duty cycle in Idle.
    Suspend,
    StartTracking,
}

/// Maps an authorization status to what the manager does about it.
pub fn react(status: AuthorizationStatus) -> AuthAction {
    match status {
        AuthorizationStatus::NotDetermined => AuthAction::RequestPermission,
        AuthorizationStatus::Denied | AuthorizationStatus::Restricted => AuthAction::Suspend,
        AuthorizationStatus::AuthorizedWhenInUse | AuthorizationStatus::AuthorizedAlways => {
            AuthAction::StartTracking
        }
    }
}
