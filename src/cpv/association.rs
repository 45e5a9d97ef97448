use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Selection;
use crate::gateway::{Filter, Gateway, GatewayResult, Select};
use crate::types::{
    CPV_CODES_TABLE, CpvAssociation, CpvCode, PROFILE_CPV_CODES_TABLE, PROFILES_TABLE,
};

#[derive(Deserialize)]
struct ProfileId {
    id: i64,
}

#[derive(Deserialize)]
struct AssociatedCode {
    cpv_code: String,
}

/// Profile row id for `email`. Every association is keyed by it.
pub async fn resolve_profile_id(gateway: &Gateway, email: &str) -> GatewayResult<i64> {
    let row: ProfileId = gateway
        .fetch_one(&Select::from(PROFILES_TABLE).columns("id").eq("email", email))
        .await?;
    Ok(row.id)
}

/// Codes associated with the profile, oldest first.
pub async fn selected_codes(gateway: &Gateway, profile_id: i64) -> GatewayResult<Vec<String>> {
    let rows: Vec<AssociatedCode> = gateway
        .fetch(
            &Select::from(PROFILE_CPV_CODES_TABLE)
                .columns("cpv_code")
                .eq("user_profile_id", profile_id),
        )
        .await?;
    Ok(rows.into_iter().map(|r| r.cpv_code).collect())
}

/// Associated codes joined with their catalog descriptions. Codes missing
/// from the catalog are left out.
pub async fn list_profile_codes(gateway: &Gateway, profile_id: i64) -> GatewayResult<Vec<CpvCode>> {
    let codes = selected_codes(gateway, profile_id).await?;
    if codes.is_empty() {
        return Ok(Vec::new());
    }

    let catalog: Vec<CpvCode> = gateway
        .fetch(
            &Select::from(CPV_CODES_TABLE)
                .columns("CODE, EN")
                .in_list("CODE", codes.iter().map(String::as_str)),
        )
        .await?;
    let mut by_code: HashMap<String, CpvCode> =
        catalog.into_iter().map(|c| (c.code.clone(), c)).collect();

    Ok(codes.iter().filter_map(|c| by_code.remove(c)).collect())
}

/// Writes needed to turn one code set into another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CodeDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl CodeDiff {
    #[must_use]
    pub fn between(current: &[String], desired: &[String]) -> Self {
        let mut added: Vec<String> = Vec::new();
        for code in desired {
            if !current.contains(code) && !added.contains(code) {
                added.push(code.clone());
            }
        }
        let removed = current
            .iter()
            .filter(|c| !desired.contains(c))
            .cloned()
            .collect();
        Self { added, removed }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

async fn apply(gateway: &Gateway, profile_id: i64, diff: &CodeDiff) -> GatewayResult<()> {
    if !diff.removed.is_empty() {
        gateway
            .delete(
                PROFILE_CPV_CODES_TABLE,
                &[
                    Filter::eq("user_profile_id", profile_id),
                    Filter::in_list("cpv_code", diff.removed.iter().map(String::as_str)),
                ],
            )
            .await?;
    }

    if !diff.added.is_empty() {
        let rows: Vec<CpvAssociation> = diff
            .added
            .iter()
            .map(|code| CpvAssociation {
                user_profile_id: profile_id,
                cpv_code: code.clone(),
            })
            .collect();
        gateway.insert(PROFILE_CPV_CODES_TABLE, &rows).await?;
    }

    if !diff.is_empty() {
        tracing::debug!(
            profile_id,
            added = diff.added.len(),
            removed = diff.removed.len(),
            "CPV associations updated"
        );
    }
    Ok(())
}

/// Makes the stored associations equal `desired`, touching only the rows
/// that differ.
pub async fn reconcile(
    gateway: &Gateway,
    profile_id: i64,
    desired: &Selection,
) -> GatewayResult<CodeDiff> {
    let current = selected_codes(gateway, profile_id).await?;
    let diff = CodeDiff::between(&current, desired.as_slice());
    apply(gateway, profile_id, &diff).await?;
    Ok(diff)
}

/// Adding a code that is already associated is a no-op.
pub async fn add_code(gateway: &Gateway, profile_id: i64, code: &str) -> GatewayResult<CodeDiff> {
    let current = selected_codes(gateway, profile_id).await?;
    let mut desired: Selection = current.iter().collect();
    desired.add(code);

    let diff = CodeDiff::between(&current, desired.as_slice());
    apply(gateway, profile_id, &diff).await?;
    Ok(diff)
}

pub async fn remove_code(gateway: &Gateway, profile_id: i64, code: &str) -> GatewayResult<CodeDiff> {
    let current = selected_codes(gateway, profile_id).await?;
    let mut desired: Selection = current.iter().collect();
    desired.remove(code);

    let diff = CodeDiff::between(&current, desired.as_slice());
    apply(gateway, profile_id, &diff).await?;
    Ok(diff)
}
