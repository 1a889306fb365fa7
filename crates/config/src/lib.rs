//! Layered configuration.
//!
//! Values are merged, last one wins, from:
//! 1. built-in defaults,
//! 2. a configuration file (the platform config directory, or an explicit
//!    path; TOML unless the extension says JSON or YAML),
//! 3. `MEMEX_` environment variables, with `__` separating nested keys
//!    (`MEMEX_CRAWL__CONCURRENCY=8`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use memex_extract::{DEFAULT_BASE_URL, DEFAULT_META_DENYLIST, DEFAULT_PRIMARY_CATEGORY, ExtractOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const ENV_PREFIX: &str = "MEMEX_";
const CONFIG_FILE_NAME: &str = "config.toml";
const DATABASE_FILE_NAME: &str = "memex.sqlite";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "memex", "memex")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Relative links on entry pages resolve against this.
    pub base_url: String,
    /// First page of the entry index. May be relative to `base_url`.
    pub start_url: String,
    /// Only entries of this category get their body outlined.
    pub primary_category: String,
    /// Meta tag names that are never collected.
    pub meta_denylist: Vec<String>,
}
impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            start_url: "/memes/all?sort=oldest".to_string(),
            primary_category: DEFAULT_PRIMARY_CATEGORY.to_string(),
            meta_denylist: DEFAULT_META_DENYLIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Entry pages extracted at the same time.
    pub concurrency: usize,
    /// Stop scheduling new entries after this many.
    pub max_entries: Option<usize>,
    /// Extract the series page an entry is part of.
    pub follow_parents: bool,
}
impl Default for CrawlConfig {
    fn default() -> Self {
        Self { concurrency: 4, max_entries: None, follow_parents: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
}
impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
impl Default for HttpConfig {
    fn default() -> Self {
        Self { user_agent: concat!("memex/", env!("CARGO_PKG_VERSION")).to_string(), timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// Read from the database, but never write to it.
    pub dry_run: bool,
}
impl Default for StoreConfig {
    fn default() -> Self {
        let path = project_dirs()
            .map(|dirs| dirs.data_dir().join(DATABASE_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(DATABASE_FILE_NAME));
        Self { path, dry_run: false }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub crawl: CrawlConfig,
    pub http: HttpConfig,
    pub store: StoreConfig,
}

impl Config {
    /// Location of the configuration file read when no path is given.
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Builds the layered configuration without extracting it.
    ///
    /// A missing file at the default location is simply skipped.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) {
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("json") => figment.merge(Json::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Loads and validates the configuration.
    ///
    /// # Errors
    ///
    /// Fails if an explicitly given file does not exist, if any source can't
    /// be parsed, or if the merged values don't validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path
            && !path.is_file()
        {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        Self::from_figment(Self::figment(path))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        debug!(?config, "configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.extract_options()?;
        self.start_url()?;
        if self.site.primary_category.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid { field: "site.primary_category", reason: "must not be empty".into() });
        }
        if self.crawl.concurrency == 0 {
            exn::bail!(ErrorKind::Invalid { field: "crawl.concurrency", reason: "must be at least 1".into() });
        }
        if self.http.user_agent.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid { field: "http.user_agent", reason: "must not be empty".into() });
        }
        if self.http.timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid { field: "http.timeout_secs", reason: "must be at least 1".into() });
        }
        Ok(())
    }

    /// Extraction settings for the configured site.
    pub fn extract_options(&self) -> Result<ExtractOptions> {
        let options = ExtractOptions::new(&self.site.base_url).or_raise(|| ErrorKind::Invalid {
            field: "site.base_url",
            reason: format!("not an absolute URL: {}", self.site.base_url),
        })?;
        Ok(options
            .with_primary_category(self.site.primary_category.trim())
            .with_meta_denylist(self.site.meta_denylist.iter().cloned()))
    }

    /// The index start URL, made absolute against the site base.
    pub fn start_url(&self) -> Result<String> {
        let options = self.extract_options()?;
        options.resolve(&self.site.start_url).map(String::from).ok_or_raise(|| ErrorKind::Invalid {
            field: "site.start_url",
            reason: format!("cannot be resolved: {}", self.site.start_url),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.start_url().unwrap(), "https://knowyourmeme.com/memes/all?sort=oldest");
        assert_eq!(config.extract_options().unwrap(), ExtractOptions::default());
    }

    #[test]
    fn test_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "memex.toml",
                r#"
                [site]
                base_url = "https://wiki.example"
                start_url = "/index"

                [crawl]
                concurrency = 2
                max_entries = 100
                "#,
            )?;
            jail.set_env("MEMEX_CRAWL__CONCURRENCY", "8");
            jail.set_env("MEMEX_HTTP__USER_AGENT", "test-agent");
            let config = Config::load(Some(Path::new("memex.toml"))).unwrap();
            assert_eq!(config.site.base_url, "https://wiki.example");
            assert_eq!(config.start_url().unwrap(), "https://wiki.example/index");
            assert_eq!(config.crawl.concurrency, 8);
            assert_eq!(config.crawl.max_entries, Some(100));
            assert_eq!(config.http.user_agent, "test-agent");
            assert_eq!(config.http.timeout(), Duration::from_secs(30));
            Ok(())
        });
    }

    #[test]
    fn test_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"site": {{"primary_category": "Person"}}, "store": {{"dry_run": true}}}}"#).unwrap();
        let config = Config::from_figment(Config::figment(Some(file.path()))).unwrap();
        assert_eq!(config.site.primary_category, "Person");
        assert!(config.store.dry_run);
        assert_eq!(config.extract_options().unwrap().primary_category, "Person");
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[rstest]
    #[case("site.base_url", Config { site: SiteConfig { base_url: "not a url".into(), ..Default::default() }, ..Default::default() })]
    #[case("crawl.concurrency", Config { crawl: CrawlConfig { concurrency: 0, ..Default::default() }, ..Default::default() })]
    #[case("http.user_agent", Config { http: HttpConfig { user_agent: " ".into(), ..Default::default() }, ..Default::default() })]
    #[case("http.timeout_secs", Config { http: HttpConfig { timeout_secs: 0, ..Default::default() }, ..Default::default() })]
    #[case("site.primary_category", Config { site: SiteConfig { primary_category: "".into(), ..Default::default() }, ..Default::default() })]
    fn test_validation(#[case] field: &str, #[case] config: Config) {
        let err = config.validate().unwrap_err();
        match &*err {
            ErrorKind::Invalid { field: invalid, .. } => assert_eq!(*invalid, field),
            other => panic!("unexpected error: {other}"),
        }
    }
}
