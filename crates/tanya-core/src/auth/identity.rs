//! Identity domain model.

use serde::{Deserialize, Serialize};

/// An authenticated user, as last reported by the identity provider.
///
/// Immutable snapshot per auth event; absent entirely when the user is a
/// guest. Guests may chat, but history is disabled for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque provider-assigned user id.
    pub id: String,
    /// Optional display name chosen at registration or via profile update.
    pub display_name: Option<String>,
    /// Email address, when the provider knows one.
    pub email: Option<String>,
    /// Avatar URL, when the provider supplies one.
    pub avatar_url: Option<String>,
}

impl Identity {
    /// Name to show in the profile header: display name, then the local part
    /// of the email address, then a generic fallback.
    pub fn display_label(&self) -> String {
        if let Some(name) = &self.display_name
            && !name.is_empty()
        {
            return name.clone();
        }
        if let Some(email) = &self.email
            && let Some(local) = email.split('@').next()
            && !local.is_empty()
        {
            return local.to_string();
        }
        "User".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            id: "uid-1".to_string(),
            display_name: None,
            email: None,
            avatar_url: None,
        }
    }

    #[test]
    fn test_display_label_fallback_chain() {
        let mut user = identity();
        assert_eq!(user.display_label(), "User");

        user.email = Some("budi@contoh.id".to_string());
        assert_eq!(user.display_label(), "budi");

        user.display_name = Some("Budi Santoso".to_string());
        assert_eq!(user.display_label(), "Budi Santoso");
    }
}
