use serde::{Deserialize, Serialize};

/// User profile as returned by the backend and cached under `user_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retailer_id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// `POST /api/auth/login` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/register` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// The signed-in identity plus its bearer token.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub subject_id: String,
    pub display_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub token: String,
    profile: UserProfile,
}

impl Session {
    pub fn new(profile: UserProfile, token: impl Into<String>) -> Self {
        let subject_id = profile
            .retailer_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| profile.id.clone());

        Self {
            subject_id,
            display_name: profile.name.clone(),
            email: profile.email.clone(),
            phone: profile.phone.clone(),
            avatar_url: profile.avatar.clone(),
            token: token.into(),
            profile,
        }
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }
}
