//! Carbon-emission comparison shown after an item is posted.

use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notice::Notice;
use crate::store::DocumentStore;

pub const SUSTAINABLE_MESSAGE: &str = "Great! Your choices are more sustainable.";
pub const TIP_MESSAGE: &str = "Use these tips to reduce your carbon footprint: \
     delete unused files from your phone so servers consume less energy.";

/// How items without a computed emission enter the mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingEmissions {
    /// Counted as 0 kg CO2e.
    #[default]
    #[serde(rename = "zero")]
    AsZero,
    /// Left out of both the sum and the count.
    Exclude,
}

impl FromStr for MissingEmissions {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zero" => Ok(Self::AsZero),
            "exclude" => Ok(Self::Exclude),
            other => anyhow::bail!("SCORE_MISSING_EMISSIONS must be zero or exclude, got {}", other),
        }
    }
}

/// Arithmetic mean; an empty set has mean 0.
pub fn mean(values: &[Option<f64>], policy: MissingEmissions) -> f64 {
    let (sum, count) = values.iter().fold((0.0, 0usize), |(sum, count), v| match (v, policy) {
        (Some(v), _) => (sum + v, count + 1),
        (None, MissingEmissions::AsZero) => (sum, count + 1),
        (None, MissingEmissions::Exclude) => (sum, count),
    });
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Sustainable,
    Tip,
}

impl Verdict {
    pub fn message(&self) -> &'static str {
        match self {
            Verdict::Sustainable => SUSTAINABLE_MESSAGE,
            Verdict::Tip => TIP_MESSAGE,
        }
    }

    pub fn notice(&self) -> Notice {
        match self {
            Verdict::Sustainable => Notice::success(self.message()),
            Verdict::Tip => Notice::warning(self.message()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Comparison {
    pub user_mean: f64,
    pub global_mean: f64,
    pub verdict: Verdict,
}

pub fn compare(user: &[Option<f64>], global: &[Option<f64>], policy: MissingEmissions) -> Comparison {
    let user_mean = mean(user, policy);
    let global_mean = mean(global, policy);
    let verdict = if user_mean < global_mean {
        Verdict::Sustainable
    } else {
        Verdict::Tip
    };
    Comparison {
        user_mean,
        global_mean,
        verdict,
    }
}

/// One-shot comparison of `owner`'s items against every item.
pub async fn compare_owner(
    store: &dyn DocumentStore,
    owner: Uuid,
    policy: MissingEmissions,
) -> anyhow::Result<Comparison> {
    let user = store
        .emissions(Some(owner))
        .await
        .context("load user emissions")?;
    let global = store.emissions(None).await.context("load global emissions")?;
    Ok(compare(&user, &global, policy))
}

/// Sum of `owner`'s emissions, missing values counted as 0.
pub async fn total_emissions(store: &dyn DocumentStore, owner: Uuid) -> anyhow::Result<f64> {
    let values = store.emissions(Some(owner)).await?;
    Ok(values.into_iter().flatten().sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn lower_user_mean_is_sustainable() {
        let cmp = compare(&some(&[2.0, 4.0]), &some(&[2.0, 4.0, 6.0]), MissingEmissions::AsZero);
        assert_eq!(cmp.user_mean, 3.0);
        assert_eq!(cmp.global_mean, 4.0);
        assert_eq!(cmp.verdict, Verdict::Sustainable);
    }

    #[test]
    fn higher_user_mean_gets_tip() {
        let cmp = compare(&some(&[8.0]), &some(&[2.0, 4.0]), MissingEmissions::AsZero);
        assert_eq!(cmp.global_mean, 3.0);
        assert_eq!(cmp.verdict, Verdict::Tip);
    }

    #[test]
    fn equal_means_get_tip() {
        let cmp = compare(&some(&[3.0]), &some(&[3.0]), MissingEmissions::AsZero);
        assert_eq!(cmp.verdict, Verdict::Tip);
    }

    #[test]
    fn missing_values_follow_policy() {
        let values = vec![Some(6.0), None];
        assert_eq!(mean(&values, MissingEmissions::AsZero), 3.0);
        assert_eq!(mean(&values, MissingEmissions::Exclude), 6.0);
        assert_eq!(mean(&[], MissingEmissions::AsZero), 0.0);
        assert_eq!(mean(&[None], MissingEmissions::Exclude), 0.0);
    }

    #[test]
    fn policy_parses_from_env_value() {
        assert_eq!("zero".parse::<MissingEmissions>().unwrap(), MissingEmissions::AsZero);
        assert_eq!(" Exclude ".parse::<MissingEmissions>().unwrap(), MissingEmissions::Exclude);
        assert!("skip".parse::<MissingEmissions>().is_err());
    }
}
