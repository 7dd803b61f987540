use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::config::RegistryConfig;
use crate::core::{CurrencyCode, CurrencyEntry, RegistryProvider};

/// Registry backed by the currency definitions in the config file.
#[derive(Debug, Clone)]
pub struct StaticRegistry {
    base: CurrencyCode,
    currencies: BTreeMap<CurrencyCode, CurrencyEntry>,
}

impl StaticRegistry {
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        if !config.currencies.contains_key(&config.base) {
            bail!(
                "Base currency {} is not defined in the registry",
                config.base
            );
        }

        let currencies = config
            .currencies
            .iter()
            .map(|(code, def)| {
                let entry = CurrencyEntry {
                    code: code.clone(),
                    rate: if *code == config.base { 1.0 } else { def.rate },
                    symbol: def.symbol.clone(),
                    position: def.position.clone(),
                    name: def.name.clone(),
                    description: def.description.clone(),
                    decimals: def.decimals,
                };
                (code.clone(), entry)
            })
            .collect();

        Ok(Self {
            base: config.base.clone(),
            currencies,
        })
    }

    /// Builds a registry from bare `(code, rate)` pairs, without the checks
    /// `from_config` applies.
    #[cfg(test)]
    pub(crate) fn from_rates(
        base: &str,
        rates: &[(&str, f64)],
    ) -> Result<Self, crate::core::RateError> {
        let currencies = rates
            .iter()
            .map(|(code, rate)| {
                let code = CurrencyCode::parse(code)?;
                let entry = CurrencyEntry {
                    code: code.clone(),
                    rate: *rate,
                    symbol: String::new(),
                    position: "left".to_string(),
                    name: code.to_string(),
                    description: None,
                    decimals: None,
                };
                Ok((code, entry))
            })
            .collect::<Result<_, crate::core::RateError>>()?;

        Ok(Self {
            base: CurrencyCode::parse(base)?,
            currencies,
        })
    }
}

#[async_trait]
impl RegistryProvider for StaticRegistry {
    async fn currencies(&self) -> BTreeMap<CurrencyCode, CurrencyEntry> {
        self.currencies.clone()
    }

    async fn lookup(&self, code: &CurrencyCode) -> Option<CurrencyEntry> {
        self.currencies.get(code).cloned()
    }

    fn base(&self) -> CurrencyCode {
        self.base.clone()
    }
}
