use std::error::Error;

use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::options::{
    ClientOptions,
    FindOneOptions,
    ResolverConfig,
    UpdateModifications,
    UpdateOptions,
};
use mongodb::results::UpdateResult;
use mongodb::{Client, Collection};
use poise::serenity_prelude::GuildId;
use serde::de::DeserializeOwned;

use super::model::MonitorSettings;
use crate::monitor::settings::{GuildSettings, SettingsPatch, SettingsStore};

const SETTINGS_COLLECTION: &str = "appmonitor";

#[derive(Clone)]
pub struct Database {
    client: Client,
    database: String,
}

impl Database {
    pub async fn new(
        connection: &str,
        database: &str,
    ) -> Result<Database, Box<dyn Error + Send + Sync>> {
        let options =
            ClientOptions::parse_with_resolver_config(connection, ResolverConfig::cloudflare())
                .await?;
        let client = Client::with_options(options)?;

        Ok(Database {
            client,
            database: database.to_string(),
        })
    }

    fn open<T>(&self, collection: &str) -> Collection<T> {
        self.client.database(&self.database).collection(collection)
    }

    pub async fn update<T>(
        &self,
        collection: &str,
        query: Document,
        update_modifications: UpdateModifications,
        options: Option<UpdateOptions>,
    ) -> Result<UpdateResult, Box<dyn Error + Send + Sync>> {
        let result = self
            .open::<T>(collection)
            .update_one(query, update_modifications, options)
            .await?;

        Ok(result)
    }

    pub async fn find_one<T: DeserializeOwned + Send + Sync + Unpin>(
        &self,
        collection: &str,
        filter: Document,
        options: Option<FindOneOptions>,
    ) -> Result<Option<T>, Box<dyn Error + Send + Sync>> {
        let doc = self.open::<T>(collection).find_one(filter, options).await?;

        Ok(doc)
    }
}

fn settings_query(guild: GuildId) -> Document {
    doc! { "guild_id": guild.to_string() }
}

#[async_trait]
impl SettingsStore for Database {
    async fn get(&self, guild: GuildId) -> Result<GuildSettings, crate::Error> {
        let stored = self
            .find_one::<MonitorSettings>(SETTINGS_COLLECTION, settings_query(guild), None)
            .await?;

        Ok(stored.map(GuildSettings::from).unwrap_or_default())
    }

    async fn update(
        &self,
        guild: GuildId,
        patch: SettingsPatch,
    ) -> Result<GuildSettings, crate::Error> {
        if !patch.is_empty() {
            let changes = Document::from(&patch);

            Database::update::<MonitorSettings>(
                self,
                SETTINGS_COLLECTION,
                settings_query(guild),
                UpdateModifications::Document(doc! { "$set": changes }),
                Some(UpdateOptions::builder().upsert(true).build()),
            )
            .await?;
        }

        self.get(guild).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_selects_exactly_one_guild() {
        assert_eq!(settings_query(GuildId::new(42)), doc! { "guild_id": "42" });
        assert_ne!(settings_query(GuildId::new(42)), Document::new());
    }
}
