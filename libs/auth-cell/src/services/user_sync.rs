use anyhow::{Result, anyhow};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::{filter, SupabaseClient};

use crate::models::{AuthEvent, DeletedUser, ProviderUser, SyncOutcome, SyncedUser};

const USERS: &str = "users";
const PATIENTS: &str = "patients";

/// Mirrors auth-provider accounts into the store's `users` table.
pub struct UserSyncService {
    supabase: SupabaseClient,
    service_key: String,
}

impl UserSyncService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            service_key: config.supabase_service_role_key.clone(),
        }
    }

    pub async fn handle_event(&self, event: AuthEvent) -> Result<SyncOutcome> {
        debug!("Handling auth event {}", event.event_type);

        match event.event_type.as_str() {
            "user.created" | "user.updated" => {
                let user: ProviderUser = serde_json::from_value(event.data)
                    .map_err(|e| anyhow!("Invalid user payload: {}", e))?;
                self.upsert_user(&user).await
            }
            "user.deleted" => {
                let deleted: DeletedUser = serde_json::from_value(event.data)
                    .map_err(|e| anyhow!("Invalid user.deleted payload: {}", e))?;
                let id = deleted.id.ok_or_else(|| anyhow!("user.deleted without user id"))?;
                self.supabase
                    .delete(USERS, &filter("auth_user_id", "eq", &id), &self.service_key)
                    .await?;
                info!("Removed user {}", id);
                Ok(SyncOutcome::Deleted)
            }
            other => {
                debug!("Ignoring auth event {}", other);
                Ok(SyncOutcome::Ignored)
            }
        }
    }

    async fn upsert_user(&self, user: &ProviderUser) -> Result<SyncOutcome> {
        let by_auth_id = filter("auth_user_id", "eq", &user.id);
        let existing: Option<SyncedUser> = self.supabase
            .select_one(USERS, &by_auth_id, &self.service_key)
            .await?;

        let now = Utc::now().to_rfc3339();
        let mut row = json!({
            "auth_user_id": user.id,
            "email": user.primary_email(),
            "first_name": user.first_name,
            "last_name": user.last_name,
            "image_url": user.image_url,
            "role": user.role(),
            "updated_at": now
        });

        if existing.is_some() {
            let _: Option<SyncedUser> = self.supabase
                .update(USERS, &by_auth_id, row, &self.service_key)
                .await?;
            info!("Updated user {}", user.id);
            return Ok(SyncOutcome::Updated);
        }

        row["created_at"] = json!(now);
        let created: SyncedUser = self.supabase.insert(USERS, row, &self.service_key).await?;
        info!("Created user {} as {}", created.auth_user_id, created.role);

        if created.role == "patient" {
            self.ensure_patient_profile(user).await?;
        }

        Ok(SyncOutcome::Created)
    }

    async fn ensure_patient_profile(&self, user: &ProviderUser) -> Result<()> {
        let by_user = filter("user_id", "eq", &user.id);
        let existing: Option<Value> = self.supabase
            .select_one(PATIENTS, &by_user, &self.service_key)
            .await?;
        if existing.is_some() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let _: Value = self.supabase.insert(PATIENTS, json!({
            "user_id": user.id,
            "first_name": user.first_name.clone().unwrap_or_default(),
            "last_name": user.last_name.clone().unwrap_or_default(),
            "email": user.primary_email().unwrap_or_default(),
            "created_at": now,
            "updated_at": now
        }), &self.service_key).await?;

        info!("Created patient profile for user {}", user.id);
        Ok(())
    }
}
