//! User profile schemas and the profile-store collaborator.
//!
//! Two schemas exist side by side:
//!
//! - [`PolicyProfile`]: the profile form kept by the backend, keyed by user id.
//! - [`AccountProfile`]: the details captured at sign-up and held by the local
//!   [`IdentityStore`](crate::identity::IdentityStore).
//!
//! Either one can be attached to an outgoing chat request as a
//! [`RequestProfile`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// User id used for profile lookups when nobody is signed in.
pub const DEFAULT_PROFILE_USER: &str = "default";

/// Profile stored by the backend.
///
/// Every field is free text on the wire; missing fields are rendered as
/// "Not specified" by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Employment status (`employed`, `student`, `retired`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employment: Option<String>,
    /// Annual income.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income: Option<String>,
    /// Education level (`high-school`, `bachelor`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_size: Option<String>,
}

impl PolicyProfile {
    /// True when no field carries a non-blank value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [
            &self.age,
            &self.location,
            &self.employment,
            &self.income,
            &self.education,
            &self.family_size,
        ]
        .iter()
        .all(|field| field.as_deref().is_none_or(|v| v.trim().is_empty()))
    }
}

/// Profile captured at sign-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub email: String,
    pub age: u8,
    pub gender: String,
    pub occupation: String,
    pub financial_status: String,
    pub primary_needs: String,
}

/// Profile attached to a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestProfile {
    Account(AccountProfile),
    Policy(PolicyProfile),
}

/// Upsert body for the backend profile endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate<'a> {
    pub user_id: &'a str,
    #[serde(flatten)]
    pub profile: &'a PolicyProfile,
}

/// Keyed profile lookup and upsert.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the profile for `user_id`. `None` when the backend has nothing.
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<PolicyProfile>>;

    /// Create or replace the profile for `user_id`.
    async fn save_profile(&self, user_id: &str, profile: &PolicyProfile) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_object_is_empty_profile() {
        let profile: PolicyProfile = serde_json::from_value(json!({})).unwrap();
        assert!(profile.is_empty());

        let blank = PolicyProfile {
            location: Some("   ".to_string()),
            ..PolicyProfile::default()
        };
        assert!(blank.is_empty());
    }

    #[test]
    fn test_update_flattens_with_user_id() {
        let profile = PolicyProfile {
            age: Some("34".to_string()),
            family_size: Some("4".to_string()),
            ..PolicyProfile::default()
        };
        let body = serde_json::to_value(ProfileUpdate {
            user_id: "u-1",
            profile: &profile,
        })
        .unwrap();

        assert_eq!(
            body,
            json!({ "userId": "u-1", "age": "34", "familySize": "4" })
        );
    }

    #[test]
    fn test_request_profile_untagged() {
        let account = RequestProfile::Account(AccountProfile {
            email: "a@b.c".to_string(),
            age: 30,
            gender: "female".to_string(),
            occupation: "farmer".to_string(),
            financial_status: "low".to_string(),
            primary_needs: "health".to_string(),
        });
        let value = serde_json::to_value(&account).unwrap();
        assert_eq!(value["financialStatus"], "low");
        assert!(value.get("Account").is_none());
    }
}
