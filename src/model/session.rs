//! Explicit session context.
//!
//! Tenant, branch and user identifiers travel as a value passed to whoever
//! needs them, instead of being looked up from shared browser storage.

use serde::{Deserialize, Serialize};

use super::Metadata;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionContext {
    pub tenant_id: Option<String>,
    pub branch_id: Option<String>,
    /// Laboratory branch name printed on the letterhead.
    pub branch_name: Option<String>,
    pub user_id: Option<String>,
    /// The signing user's display name.
    pub user_name: Option<String>,
}

impl SessionContext {
    /// Letterhead placeholder substitutions carried by this session.
    pub fn placeholders(&self) -> Vec<(&'static str, String)> {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        vec![
            ("{branch}", text(&self.branch_name)),
            ("{user}", text(&self.user_name)),
            ("{tenantId}", text(&self.tenant_id)),
            ("{branchId}", text(&self.branch_id)),
            ("{userId}", text(&self.user_id)),
        ]
    }

    /// Fill the fields `metadata` leaves unset. Names win over identifiers;
    /// the identifiers themselves go into the keywords.
    pub fn fill_metadata(&self, metadata: &mut Metadata) {
        if metadata.author.is_none() {
            metadata.author = self.user_name.clone().or_else(|| self.user_id.clone());
        }
        if metadata.subject.is_none() {
            metadata.subject = self.branch_name.clone().or_else(|| self.branch_id.clone());
        }
        if metadata.keywords.is_none() {
            let ids: Vec<String> = [
                ("tenant", &self.tenant_id),
                ("branch", &self.branch_id),
                ("user", &self.user_id),
            ]
            .into_iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| format!("{k}:{v}")))
            .collect();
            if !ids.is_empty() {
                metadata.keywords = Some(ids.join(" "));
            }
        }
    }
}
