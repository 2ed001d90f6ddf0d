use serde::Serialize;
use treeforge_core::api::{ChangeCategory, RecognitionPolicy, TreeforgeConfig};

use super::cli::ClassifyArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct Classification {
    pub categories: Vec<ChangeCategory>,
    /// Cache groups an incremental pass with these changes would purge.
    pub invalidated_groups: Vec<String>,
}

pub fn classify(args: &ClassifyArgs, cfg: &TreeforgeConfig) -> Classification {
    let categories = cfg.cache.categorize(&args.files);
    let mut invalidated_groups: Vec<_> = cfg
        .cache
        .policy()
        .affected_groups(&categories)
        .into_iter()
        .collect();
    invalidated_groups.sort();
    Classification {
        categories: categories.into_iter().collect(),
        invalidated_groups,
    }
}

pub fn run(args: ClassifyArgs, cfg: &TreeforgeConfig) -> Result<i32, CliError> {
    let report = classify(&args, cfg);
    let json = serde_json::to_string_pretty(&report).map_err(anyhow::Error::from)?;
    println!("{json}");
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeforge_core::api::from_toml_str;

    #[test]
    fn reports_categories_and_groups() {
        let cfg = from_toml_str(
            r#"
[[cache.groups]]
name = "compiled"
invalidated_by = ["scripts", "templates"]

[[cache.groups]]
name = "styles"
invalidated_by = ["styles"]
"#,
        )
        .unwrap();
        let args = ClassifyArgs {
            files: vec!["app/templates/index.hbs".into(), "README.md".into()],
        };

        let report = classify(&args, &cfg);
        assert_eq!(report.categories, vec![ChangeCategory::new("templates")]);
        assert_eq!(report.invalidated_groups, vec!["compiled".to_string()]);
    }
}
