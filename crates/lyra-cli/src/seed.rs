//! Builds the in-memory directory and catalog described by the config.

use anyhow::{Context, Result};
use lyra_store::{MemoryCatalog, MemoryDirectory, SpaceMember, SpaceRole, UserId};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::AppConfig;

pub struct Seeded {
    pub directory: Arc<MemoryDirectory>,
    pub catalog: Arc<MemoryCatalog>,
}

pub fn seed(config: &AppConfig) -> Result<Seeded> {
    let mut directory = MemoryDirectory::new();
    if let Some(secret) = &config.auth.token_secret {
        directory = directory.with_token_secret(secret.clone());
    }
    for user in &config.users {
        directory
            .add_user(UserId(user.id), &user.username, &user.password, user.admin)
            .with_context(|| format!("Failed to add user '{}'", user.username))?;
        debug!(user = %user.username, admin = user.admin, "Added user");
    }

    let catalog = MemoryCatalog::new();
    for space in &config.spaces {
        let owner = lookup(config, &space.owner)?;
        let members = space
            .editors
            .iter()
            .map(|name| (name, SpaceRole::Editor))
            .chain(space.viewers.iter().map(|name| (name, SpaceRole::Viewer)))
            .map(|(name, role)| Ok(SpaceMember { user: lookup(config, name)?, role }))
            .collect::<Result<Vec<_>>>()?;
        let created = catalog
            .create_space(&space.name, space.kind, owner, members)
            .with_context(|| format!("Failed to create space '{}'", space.name))?;
        info!(space = %created.id, name = %created.name, kind = %created.kind, "Seeded space");
    }

    Ok(Seeded {
        directory: Arc::new(directory),
        catalog: Arc::new(catalog),
    })
}

fn lookup(config: &AppConfig, username: &str) -> Result<UserId> {
    config
        .user_id(username)
        .map(UserId)
        .with_context(|| format!("Unknown user '{username}'"))
}
