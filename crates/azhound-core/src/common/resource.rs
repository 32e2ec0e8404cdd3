//! Collected resource types.
//!
//! A [`Resource`] ties a payload type to its [`Kind`], to the Graph collection
//! it is listed from, and to the query a collector issues when the caller does
//! not supply one. Unknown properties returned by the server are preserved in
//! `extra` and written back out unchanged.

use crate::{Kind, ListQuery};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// A directory object that can be enumerated and wrapped in an envelope.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Discriminant placed on every envelope carrying this resource.
    const KIND: Kind;

    /// Collection path segment below the API version, e.g. `groups`.
    const COLLECTION: &'static str;

    /// Singular human-readable label used in log records.
    const LABEL: &'static str;

    /// The object identifier.
    fn id(&self) -> &str;

    /// The query a collector uses when the caller does not override it.
    fn default_query() -> ListQuery {
        ListQuery::default()
    }
}

/// An Entra ID group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_assignable_to_role: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membership_rule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_premises_security_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_premises_sync_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource for Group {
    const KIND: Kind = Kind::Group;
    const COLLECTION: &'static str = "groups";
    const LABEL: &'static str = "group";

    fn id(&self) -> &str {
        &self.id
    }

    /// Only security-enabled groups grant access, so collectors skip the rest.
    fn default_query() -> ListQuery {
        ListQuery::new().filter("securityEnabled eq true")
    }
}

/// An Entra ID user.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_premises_security_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_premises_sync_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_principal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource for User {
    const KIND: Kind = Kind::User;
    const COLLECTION: &'static str = "users";
    const LABEL: &'static str = "user";

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn group_keeps_unknown_properties() {
        let raw = json!({
            "id": "g-1",
            "displayName": "Tier0 Admins",
            "securityEnabled": true,
            "groupTypes": [],
            "@odata.type": "#microsoft.graph.group",
            "proxyAddresses": ["SMTP:t0@contoso.com"]
        });

        let group: Group = serde_json::from_value(raw).unwrap();
        assert_eq!(group.id(), "g-1");
        assert_eq!(group.security_enabled, Some(true));
        assert_eq!(
            group.extra.get("@odata.type"),
            Some(&json!("#microsoft.graph.group"))
        );

        let out = serde_json::to_value(&group).unwrap();
        assert_eq!(out["proxyAddresses"], json!(["SMTP:t0@contoso.com"]));
        assert_eq!(out["displayName"], json!("Tier0 Admins"));
        assert!(out.get("description").is_none());
    }

    #[test]
    fn group_without_id_is_rejected() {
        let err = serde_json::from_value::<Group>(json!({ "displayName": "orphan" }))
            .unwrap_err()
            .to_string();
        assert!(err.contains("missing field `id`"), "{err}");
    }

    #[test]
    fn default_queries() {
        assert_eq!(
            Group::default_query().filter.as_deref(),
            Some("securityEnabled eq true")
        );
        assert_eq!(User::default_query(), ListQuery::default());
        assert_eq!(User::KIND, Kind::User);
        assert_eq!(Group::COLLECTION, "groups");
    }
}
