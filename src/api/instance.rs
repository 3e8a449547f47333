use std::collections::HashSet;

use crate::config::ServiceConfig;
use crate::error::{OmasError, OmasResult};
use crate::logic::OmasServices;
use crate::store::MetadataRepository;

/// One named server instance: its handlers plus the request gate in front of them.
pub struct ServerInstance<R> {
    server_name: String,
    authorized_users: Option<HashSet<String>>,
    services: OmasServices<R>,
}

impl<R: MetadataRepository + 'static> ServerInstance<R> {
    pub fn new(config: &ServiceConfig, services: OmasServices<R>) -> Self {
        Self {
            server_name: config.server_name.clone(),
            authorized_users: config
                .authorized_users
                .as_ref()
                .map(|users| users.iter().cloned().collect()),
            services,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Check the server name and the calling user, then hand out the services.
    pub fn services_for(&self, server_name: &str, user_id: &str) -> OmasResult<&OmasServices<R>> {
        if server_name != self.server_name {
            return Err(OmasError::not_found("server", format!("name '{}'", server_name)));
        }
        if user_id.trim().is_empty() {
            return Err(OmasError::invalid_parameter("userId", "a user id is required"));
        }
        if let Some(allowed) = &self.authorized_users {
            if !allowed.contains(user_id) {
                log::warn!("Rejected request from unauthorized user {}", user_id);
                return Err(OmasError::UserNotAuthorized(user_id.to_string()));
            }
        }
        Ok(&self.services)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRepository;
    use std::sync::Arc;

    fn instance(users: Option<Vec<&str>>) -> ServerInstance<InMemoryRepository> {
        let config = ServiceConfig {
            server_name: "cocoMDS1".to_string(),
            authorized_users: users.map(|u| u.into_iter().map(String::from).collect()),
            local_metadata_collection: None,
        };
        ServerInstance::new(
            &config,
            OmasServices::new(Arc::new(InMemoryRepository::default()), None),
        )
    }

    #[test]
    fn unknown_server_names_are_not_found() {
        let instance = instance(None);
        assert!(instance.services_for("cocoMDS1", "erinoverview").is_ok());
        assert!(matches!(
            instance.services_for("other", "erinoverview"),
            Err(OmasError::NotFound { .. })
        ));
    }

    #[test]
    fn allow_list_is_enforced() {
        let instance = instance(Some(vec!["erinoverview"]));
        assert!(instance.services_for("cocoMDS1", "erinoverview").is_ok());
        assert_eq!(
            instance.services_for("cocoMDS1", "mallory").err(),
            Some(OmasError::UserNotAuthorized("mallory".to_string()))
        );
    }
}
