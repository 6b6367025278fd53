//! Shared helper functions for CLI commands

use miette::{miette, IntoDiagnostic, Result};
use rust_decimal::Decimal;

use crate::core::costing::round_qty;
use crate::core::entity::Entity;
use crate::core::project::Project;
use crate::core::shortid::ShortIdIndex;
use crate::core::store::{ProjectStore, Store};
use crate::core::Config;

/// Everything a command needs from the current project
pub struct Workspace {
    pub store: ProjectStore,
    pub config: Config,
    pub short_ids: ShortIdIndex,
}

impl Workspace {
    /// Discover the project from the current directory
    pub fn open() -> Result<Self> {
        let project = Project::discover().map_err(|e| miette!("{}", e))?;
        let short_ids = ShortIdIndex::load(&project);
        Ok(Self {
            store: ProjectStore::new(project),
            config: Config::load(),
            short_ids,
        })
    }

    pub fn project(&self) -> &Project {
        self.store.project()
    }

    /// Persist the short ID index; failure only costs the aliases
    pub fn save_short_ids(&self) {
        if let Err(e) = self.short_ids.save(self.project()) {
            tracing::warn!(error = %e, "could not save short id index");
        }
    }

    /// Resolve a user reference to a full entity ID of type `E`
    ///
    /// Accepts `PREFIX@N`, `@N`, a full ID, or a unique case-insensitive
    /// prefix of one.
    pub fn resolve<E: Entity>(&self, reference: &str) -> Result<String> {
        let resolved = self
            .short_ids
            .resolve(reference)
            .ok_or_else(|| miette!("Unknown short ID: {}", reference))?;

        if self.project().entity_path::<E>(&resolved).exists() {
            return Ok(resolved);
        }

        let needle = resolved.to_ascii_uppercase();
        let matches: Vec<String> = self
            .project()
            .iter_entity_files::<E>()
            .iter()
            .filter_map(|path| entity_id_from_path(path))
            .filter(|id| id.starts_with(&needle))
            .collect();

        match matches.as_slice() {
            [single] => Ok(single.clone()),
            [] => Err(miette!("No {} matches '{}'", E::PREFIX, reference)),
            many => Err(miette!(
                "'{}' is ambiguous ({} {} entities match)",
                reference,
                many.len(),
                E::PREFIX
            )),
        }
    }

    pub fn money(&self, amount: Decimal) -> String {
        format_money(
            amount,
            self.config.currency_prefix(),
            self.config.display_precision(),
        )
    }

    pub fn qty(&self, value: f64) -> String {
        format_qty(value, self.config.display_precision())
    }
}

fn entity_id_from_path(path: &std::path::Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    name.strip_suffix(crate::core::project::ENTITY_SUFFIX)
        .map(str::to_string)
}

/// Ask for confirmation unless `assume_yes`
pub fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    dialoguer::Confirm::with_theme(&dialoguer::theme::ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .into_diagnostic()
}

/// Truncate a string to `max_len` characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format money as "Rp. 1,234.50"
pub fn format_money(amount: Decimal, prefix: &str, precision: u32) -> String {
    let rounded = amount.round_dp(precision);
    let text = format!("{:.*}", precision as usize, rounded.abs());
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(frac) => format!("{} {}{}.{}", prefix, sign, grouped, frac),
        None => format!("{} {}{}", prefix, sign, grouped),
    }
}

/// Format a quantity rounded for display, without trailing zeros
pub fn format_qty(value: f64, precision: u32) -> String {
    let rounded = round_qty(value, precision);
    let text = format!("{:.*}", precision as usize, rounded);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

/// Parse "MAT@1:0.5" into a reference and a quantity (default 1)
pub fn parse_item_spec(spec: &str) -> Result<(String, f64)> {
    match spec.rsplit_once(':') {
        Some((reference, qty)) => {
            let qty: f64 = qty
                .trim()
                .parse()
                .map_err(|_| miette!("Invalid quantity in '{}'", spec))?;
            Ok((reference.trim().to_string(), qty))
        }
        None => Ok((spec.trim().to_string(), 1.0)),
    }
}

/// Look up a material's display name, falling back to its ID
pub fn material_name<S: Store + ?Sized>(store: &S, material_id: &str) -> String {
    store
        .fetch_material(material_id)
        .map(|m| m.name)
        .unwrap_or_else(|_| material_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("nugget ayam", 8), "nugge...");
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(Decimal::from(2000), "Rp.", 2), "Rp. 2,000.00");
        assert_eq!(format_money(Decimal::new(123456789, 2), "Rp.", 2), "Rp. 1,234,567.89");
        assert_eq!(format_money(Decimal::from(-10000), "Rp.", 0), "Rp. -10,000");
        assert_eq!(format_money(Decimal::new(5, 1), "$", 2), "$ 0.50");
    }

    #[test]
    fn test_format_qty() {
        assert_eq!(format_qty(2.0, 2), "2");
        assert_eq!(format_qty(1.0 / 3.0, 2), "0.33");
        assert_eq!(format_qty(7.5, 2), "7.5");
    }

    #[test]
    fn test_parse_item_spec() {
        assert_eq!(parse_item_spec("MAT@1:0.5").unwrap(), ("MAT@1".to_string(), 0.5));
        assert_eq!(parse_item_spec("MAT@2").unwrap(), ("MAT@2".to_string(), 1.0));
        assert!(parse_item_spec("MAT@2:abc").is_err());
    }
}
