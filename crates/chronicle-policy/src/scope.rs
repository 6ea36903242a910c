//! Resource → scope classification.
//!
//! A resource owned by a configured application module is `app` scope;
//! everything else is `system`. The lookup is exact and case-sensitive.
//! Classification only labels the record and has no effect on the chain.

use std::collections::HashMap;

use tracing::warn;

use chronicle_contracts::details::Scope;

use crate::config::AppModule;

#[derive(Debug, Clone, Default)]
pub struct ScopeClassifier {
    owner_by_resource: HashMap<String, String>,
}

impl ScopeClassifier {
    pub fn new(apps: &[AppModule]) -> Self {
        let mut owner_by_resource = HashMap::new();

        for app in apps {
            let names = std::iter::once(&app.app_id).chain(app.resources.iter());
            for resource in names {
                if let Some(previous) =
                    owner_by_resource.insert(resource.clone(), app.app_id.clone())
                {
                    if previous != app.app_id {
                        // Last declaration wins.
                        warn!(
                            resource = %resource,
                            previous_app = %previous,
                            app_id = %app.app_id,
                            "resource claimed by more than one app"
                        );
                    }
                }
            }
        }

        Self { owner_by_resource }
    }

    pub fn classify(&self, resource: &str) -> Scope {
        match self.owner_by_resource.get(resource) {
            Some(app_id) => Scope::App {
                app_id: app_id.clone(),
            },
            None => Scope::System,
        }
    }
}
