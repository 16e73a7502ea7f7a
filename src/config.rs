use std::collections::BTreeSet;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};


pub(crate) static CONFIG: OnceLock<Config> = OnceLock::new();


#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)] pub grouping: GroupingConfig,
}

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct DbConfig {
    pub username: String,
    pub password: String,
    pub hostname: String,
    pub db_name: String,
    #[serde(default = "DbConfig::default_port")] pub port: u16,
}
impl DbConfig {
    fn default_port() -> u16 { 5432 }
}

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct GroupingConfig {
    #[serde(default = "GroupingConfig::default_schemas")] pub schemas: BTreeSet<String>,
    #[serde(default = "GroupingConfig::default_case_insensitive")] pub case_insensitive: bool,
    #[serde(default = "GroupingConfig::default_capacity_hint")] pub capacity_hint: usize,
    #[serde(default)] pub table_filter: Option<String>,
    #[serde(default)] pub format: OutputFormat,
}
impl GroupingConfig {
    fn default_schemas() -> BTreeSet<String> {
        let mut schemas = BTreeSet::new();
        schemas.insert("public".to_owned());
        schemas
    }
    fn default_case_insensitive() -> bool { true }
    fn default_capacity_hint() -> usize { 64 }
}
impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            schemas: Self::default_schemas(),
            case_insensitive: Self::default_case_insensitive(),
            capacity_hint: Self::default_capacity_hint(),
            table_filter: None,
            format: OutputFormat::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Cbor,
}
