use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl UserProfile {
    /// "First Last", or the email when no name is on file.
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PermissionsResponse {
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_response() {
        let json = r#"{"id":3,"username":"ada@example.com","email":"ada@example.com","first_name":"Ada","last_name":"Lovelace","is_staff":false}"#;
        let user: UserProfile = serde_json::from_str(json).expect("Failed to parse user JSON");
        assert_eq!(user.id, Some(3));
        assert_eq!(user.display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user: UserProfile =
            serde_json::from_str(r#"{"email":"x@example.com"}"#).expect("Failed to parse user JSON");
        assert_eq!(user.display_name(), "x@example.com");
    }
}
