use std::{collections::HashMap, str::FromStr, sync::LazyLock};

use anyhow::{Error, bail};
use serde::{Deserialize, Serialize};
use tracing::error;

type Table = HashMap<String, String>;

static EN: LazyLock<Table> = LazyLock::new(|| load("en", include_str!("../locales/en.json")));
static ZH: LazyLock<Table> = LazyLock::new(|| load("zh", include_str!("../locales/zh.json")));
static ES: LazyLock<Table> = LazyLock::new(|| load("es", include_str!("../locales/es.json")));

fn load(code: &str, raw: &str) -> Table {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        error!(%code, error = ?e, "locale table is not valid JSON");
        Table::new()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Zh,
    Es,
}

impl Locale {
    pub const ALL: [Locale; 3] = [Locale::En, Locale::Zh, Locale::Es];

    /// Unknown codes fall back to English.
    pub fn parse(code: &str) -> Self {
        code.parse().unwrap_or_default()
    }

    pub fn code(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Zh => "zh",
            Locale::Es => "es",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Locale::En => "English",
            Locale::Zh => "中文",
            Locale::Es => "Español",
        }
    }

    fn table(&self) -> &'static Table {
        match self {
            Locale::En => &EN,
            Locale::Zh => &ZH,
            Locale::Es => &ES,
        }
    }

    /// Translation for `key`, then the English text, then the key itself.
    pub fn t<'a>(&self, key: &'a str) -> &'a str {
        self.table()
            .get(key)
            .or_else(|| EN.get(key))
            .map(String::as_str)
            .unwrap_or(key)
    }
}

impl FromStr for Locale {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_lowercase();
        // accept regional tags such as zh-CN or es_MX
        match code.split(['-', '_']).next().unwrap_or_default() {
            "en" => Ok(Locale::En),
            "zh" => Ok(Locale::Zh),
            "es" => Ok(Locale::Es),
            _ => bail!("unsupported language: {s}"),
        }
    }
}

/// `(code, display name)` for every bundled language.
pub fn available_languages() -> Vec<(&'static str, &'static str)> {
    Locale::ALL.iter().map(|l| (l.code(), l.name())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_share_the_same_keys() {
        assert!(!EN.is_empty());
        for locale in Locale::ALL {
            let table = locale.table();
            assert_eq!(table.len(), EN.len(), "{}", locale.code());
            assert!(EN.keys().all(|k| table.contains_key(k)), "{}", locale.code());
        }
    }

    #[test]
    fn translates_known_keys() {
        assert_eq!(Locale::En.t("sharpe_ratio"), "Sharpe Ratio");
        assert_eq!(Locale::Es.t("loading"), "Cargando...");
        assert_ne!(Locale::Zh.t("page_title"), Locale::En.t("page_title"));
    }

    #[test]
    fn unknown_key_falls_back_to_itself() {
        assert_eq!(Locale::Zh.t("no_such_key"), "no_such_key");
    }

    #[test]
    fn parse_accepts_regions_and_defaults_to_english() {
        assert_eq!(Locale::parse("zh-CN"), Locale::Zh);
        assert_eq!(Locale::parse("ES"), Locale::Es);
        assert_eq!(Locale::parse("fr"), Locale::En);
        assert!("fr".parse::<Locale>().is_err());
    }

    #[test]
    fn lists_available_languages() {
        let langs = available_languages();
        assert_eq!(langs.len(), 3);
        assert!(langs.contains(&("zh", "中文")));
    }
}
