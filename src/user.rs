use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub uid: Option<String>,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl User {
    /// Display name when set, address otherwise.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

/// What `/auth/login` and `/auth/register` hand back.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
}

#[derive(Serialize, Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_round_trips_wire_names() {
        let raw = r#"{
            "uid": "u-1",
            "email": "chef@example.com",
            "displayName": "Chef",
            "photoURL": "https://example.com/chef.png",
            "createdAt": "2025-04-01T10:00:00"
        }"#;
        let user: User = serde_json::from_str(raw).unwrap();
        assert_eq!(user.name(), "Chef");
        assert_eq!(user.photo_url.as_deref(), Some("https://example.com/chef.png"));

        let out = serde_json::to_value(&user).unwrap();
        assert_eq!(out["displayName"], "Chef");
        assert_eq!(out["photoURL"], "https://example.com/chef.png");
    }

    #[test]
    fn missing_profile_fields_default() {
        let user: User = serde_json::from_str(r#"{"email":"a@b.c"}"#).unwrap();
        assert_eq!(user.name(), "a@b.c");
        assert!(user.uid.is_none());
    }
}
