//! Population and branches step.
//!
//! The form carries the experiment-level population fields plus one row
//! per branch. Which extra fields apply depends on the experiment type:
//! add-on experiments name their add-on, pref experiments declare the
//! pref and give every branch a value.

use std::collections::{BTreeMap, HashSet};

use experimenter_core::error::{ExperimenterError, ExperimenterResult, FormErrors, NON_FIELD_ERRORS};
use experimenter_core::models::experiment::{
    ExperimentType, FirefoxChannel, NORMANDY_SLUG_MAX_LEN, Platform, PrefBranch, PrefType,
    UpdateExperiment, firefox_versions,
};
use experimenter_core::models::variant::CreateVariant;
use experimenter_core::slug::slugify;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::fields;
use super::overview::NAME_NEEDS_CHARACTERS;

pub const POPULATION_OUT_OF_RANGE: &str = "The population size must be between 0 and 100 percent.";
pub const RATIOS_MUST_SUM: &str = "The size of all branches must add up to 100";
pub const NAMES_MUST_BE_UNIQUE: &str = "All branches must have a unique name";
pub const VALUES_MUST_BE_UNIQUE: &str = "All branches must have a unique pref value";
pub const ADDON_ID_IN_USE: &str = "This active experiment name is already in use.";

/// One submitted branch row.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VariantInput {
    /// Existing branch being edited; absent for new rows.
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub ratio: Option<i64>,
    pub is_control: bool,
    pub value: Option<String>,
    /// Remove this branch.
    pub delete: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VariantsForm {
    pub population_percent: Option<f64>,
    pub firefox_version: Option<String>,
    pub firefox_channel: Option<String>,
    pub client_matching: Option<String>,
    pub locales: Vec<String>,
    pub countries: Vec<String>,
    pub platform: Option<String>,

    pub addon_experiment_id: Option<String>,
    pub addon_release_url: Option<String>,

    pub pref_key: Option<String>,
    pub pref_type: Option<String>,
    pub pref_branch: Option<String>,

    pub variants: Vec<VariantInput>,
}

/// Choices and lookups the form validates against.
#[derive(Debug, Clone, Default)]
pub struct VariantsContext {
    pub locales: Vec<String>,
    pub countries: Vec<String>,
    /// Another experiment already uses the submitted add-on id.
    pub addon_id_taken: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanVariant {
    pub id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub ratio: u32,
    pub is_control: bool,
    pub value: Option<String>,
}

impl CleanVariant {
    pub fn to_create(&self, experiment_id: Uuid) -> CreateVariant {
        CreateVariant {
            experiment_id,
            name: self.name.clone(),
            slug: self.slug.clone(),
            is_control: self.is_control,
            description: self.description.clone(),
            ratio: self.ratio,
            value: self.value.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CleanVariants {
    pub update: UpdateExperiment,
    /// Surviving branches in submission order.
    pub variants: Vec<CleanVariant>,
    /// Existing branches to remove.
    pub deleted: Vec<Uuid>,
}

/// Per-row state while the formset is validated.
struct Row {
    index: usize,
    input: VariantInput,
    name: Option<String>,
    slug: String,
    description: Option<String>,
    ratio: Option<u32>,
    value: Option<String>,
    errors: FormErrors,
}

impl Row {
    fn clean(index: usize, input: VariantInput, needs_value: bool) -> Self {
        let mut errors = FormErrors::new();
        let name = fields::required_text(&mut errors, "name", input.name.clone());
        let slug = name.as_deref().map(slugify).unwrap_or_default();
        if name.is_some() && slug.is_empty() {
            errors.add("name", NAME_NEEDS_CHARACTERS);
        }
        let description =
            fields::required_text(&mut errors, "description", input.description.clone());
        let ratio = match input.ratio {
            None => {
                errors.add("ratio", fields::REQUIRED);
                None
            }
            some => fields::integer(&mut errors, "ratio", some, 1, 100),
        };
        let value = if needs_value {
            fields::required_text(&mut errors, "value", input.value.clone())
        } else {
            None
        };

        Self {
            index,
            input,
            name,
            slug,
            description,
            ratio,
            value,
            errors,
        }
    }

    fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

fn value_matches(pref_type: PrefType, value: &str) -> bool {
    match serde_json::from_str::<Value>(value) {
        Ok(Value::Bool(_)) => pref_type == PrefType::Boolean,
        Ok(Value::Number(n)) => pref_type == PrefType::Integer && (n.is_i64() || n.is_u64()),
        _ => false,
    }
}

impl VariantsForm {
    pub fn clean(
        self,
        experiment_type: ExperimentType,
        context: &VariantsContext,
    ) -> ExperimenterResult<CleanVariants> {
        let mut errors = FormErrors::new();
        let mut update = UpdateExperiment::default();

        match self.population_percent {
            None => errors.add("population_percent", fields::REQUIRED),
            Some(p) if !(p > 0.0 && p <= 100.0) => {
                errors.add("population_percent", POPULATION_OUT_OF_RANGE)
            }
            Some(p) => update.population_percent = Some(p),
        }

        if let Some(version) = fields::text(self.firefox_version) {
            if firefox_versions().contains(&version) {
                update.firefox_version = Some(Some(version));
            } else {
                errors.add("firefox_version", fields::invalid_choice(&version));
            }
        } else {
            errors.add("firefox_version", fields::REQUIRED);
        }

        if let Some(channel) =
            fields::choice::<FirefoxChannel>(&mut errors, "firefox_channel", self.firefox_channel, true)
        {
            update.firefox_channel = Some(Some(channel));
        }

        update.client_matching =
            fields::required_text(&mut errors, "client_matching", self.client_matching);
        update.locales = Some(fields::all_or_subset(
            &mut errors,
            "locales",
            self.locales,
            &context.locales,
        ));
        update.countries = Some(fields::all_or_subset(
            &mut errors,
            "countries",
            self.countries,
            &context.countries,
        ));
        update.platform = Some(
            fields::choice::<Platform>(&mut errors, "platform", self.platform, false)
                .unwrap_or_default(),
        );

        let mut pref_type = None;
        match experiment_type {
            ExperimentType::Addon => {
                let addon_id = fields::text(self.addon_experiment_id);
                if let Some(id) = &addon_id {
                    let len = id.chars().count();
                    if len > NORMANDY_SLUG_MAX_LEN {
                        errors.add(
                            "addon_experiment_id",
                            fields::max_length(NORMANDY_SLUG_MAX_LEN, len),
                        );
                    } else if context.addon_id_taken {
                        errors.add("addon_experiment_id", ADDON_ID_IN_USE);
                    }
                }
                update.addon_experiment_id = Some(addon_id);
                update.addon_release_url = Some(fields::url(
                    &mut errors,
                    "addon_release_url",
                    self.addon_release_url,
                    false,
                ));
            }
            ExperimentType::Pref => {
                let key = fields::required_text(&mut errors, "pref_key", self.pref_key);
                pref_type = fields::choice::<PrefType>(&mut errors, "pref_type", self.pref_type, true);
                let branch =
                    fields::choice::<PrefBranch>(&mut errors, "pref_branch", self.pref_branch, true);
                update.pref_key = Some(key);
                update.pref_type = Some(pref_type);
                update.pref_branch = Some(branch);
            }
        }

        let needs_value = experiment_type == ExperimentType::Pref;
        let mut deleted = Vec::new();
        let mut rows = Vec::new();
        for (index, input) in self.variants.into_iter().enumerate() {
            if input.delete {
                deleted.extend(input.id);
            } else {
                rows.push(Row::clean(index, input, needs_value));
            }
        }

        validate_formset(&mut rows, &mut errors);
        if needs_value {
            validate_pref_values(&mut rows, pref_type);
        }

        let mut variants = Vec::with_capacity(rows.len());
        for row in rows {
            if !row.is_valid() {
                errors.merge_prefixed(&format!("variants-{}-", row.index), row.errors);
                continue;
            }
            if let (Some(name), Some(description), Some(ratio)) = (row.name, row.description, row.ratio) {
                variants.push(CleanVariant {
                    id: row.input.id,
                    name,
                    slug: row.slug,
                    description,
                    ratio,
                    is_control: row.input.is_control,
                    value: row.value,
                });
            }
        }

        if !errors.is_empty() {
            return Err(ExperimenterError::InvalidForm(errors));
        }
        Ok(CleanVariants {
            update,
            variants,
            deleted,
        })
    }
}

/// Ratios across surviving rows must total 100. Names must differ, both
/// as typed and once slugified.
fn validate_formset(rows: &mut [Row], errors: &mut FormErrors) {
    if rows.is_empty() {
        errors.add(NON_FIELD_ERRORS, RATIOS_MUST_SUM);
        return;
    }

    let total: u32 = rows.iter().map(|r| r.ratio.unwrap_or(0)).sum();
    if total != 100 {
        for row in rows.iter_mut() {
            row.errors.set("ratio", RATIOS_MUST_SUM);
        }
    }

    if rows.iter().all(Row::is_valid) {
        let names: HashSet<&str> = rows.iter().filter_map(|r| r.name.as_deref()).collect();
        let slugs: HashSet<&str> = rows.iter().map(|r| r.slug.as_str()).collect();
        if names.len() != rows.len() || slugs.len() != rows.len() {
            for row in rows.iter_mut() {
                row.errors.set("name", NAMES_MUST_BE_UNIQUE);
            }
        }
    }
}

/// Pref values must be distinct and match the declared pref type.
fn validate_pref_values(rows: &mut [Row], pref_type: Option<PrefType>) {
    let mut by_value: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        if row.is_valid()
            && let Some(value) = &row.value
        {
            by_value.entry(value.clone()).or_default().push(i);
        }
    }
    for indices in by_value.values().filter(|v| v.len() > 1) {
        for &i in indices {
            rows[i].errors.add("value", VALUES_MUST_BE_UNIQUE);
        }
    }

    let Some(pref_type) = pref_type else {
        return;
    };
    for row in rows.iter_mut().filter(|r| r.is_valid()) {
        let Some(value) = row.value.as_deref() else {
            continue;
        };
        match pref_type {
            PrefType::Boolean | PrefType::Integer if !value_matches(pref_type, value) => {
                row.errors
                    .add("value", format!("Unexpected value type (should be {pref_type})"));
            }
            PrefType::JsonString if !fields::is_valid_json(value) => {
                row.errors.add("value", fields::INVALID_JSON);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, ratio: i64, value: &str) -> VariantInput {
        VariantInput {
            name: Some(name.into()),
            description: Some(format!("{name} branch")),
            ratio: Some(ratio),
            value: Some(value.into()),
            ..VariantInput::default()
        }
    }

    fn pref_form(variants: Vec<VariantInput>) -> VariantsForm {
        VariantsForm {
            population_percent: Some(10.0),
            firefox_version: Some("57.0".into()),
            firefox_channel: Some("Nightly".into()),
            client_matching: Some("Everyone".into()),
            locales: vec!["__all__".into()],
            pref_key: Some("browser.test.pref".into()),
            pref_type: Some("boolean".into()),
            pref_branch: Some("default".into()),
            variants,
            ..VariantsForm::default()
        }
    }

    fn context() -> VariantsContext {
        VariantsContext {
            locales: vec!["en-US".into()],
            countries: vec!["US".into()],
            addon_id_taken: false,
        }
    }

    fn errors(result: ExperimenterResult<CleanVariants>) -> FormErrors {
        match result {
            Err(ExperimenterError::InvalidForm(errors)) => errors,
            other => panic!("expected form errors, got {other:?}"),
        }
    }

    #[test]
    fn valid_pref_branches() {
        let mut control = row("Control", 50, "false");
        control.is_control = true;
        let form = pref_form(vec![control, row("Treatment", 50, "true")]);

        let clean = form.clean(ExperimentType::Pref, &context()).unwrap();
        assert_eq!(clean.variants.len(), 2);
        assert_eq!(clean.variants[0].slug, "control");
        assert_eq!(clean.update.population_percent, Some(10.0));
        assert_eq!(clean.update.locales, Some(vec![]));
        assert_eq!(clean.update.pref_type, Some(Some(PrefType::Boolean)));
    }

    #[test]
    fn ratios_must_sum_to_100() {
        let form = pref_form(vec![row("Control", 50, "false"), row("Treatment", 40, "true")]);
        let errors = errors(form.clean(ExperimentType::Pref, &context()));
        assert_eq!(errors.get("variants-0-ratio").unwrap(), [RATIOS_MUST_SUM]);
        assert_eq!(errors.get("variants-1-ratio").unwrap(), [RATIOS_MUST_SUM]);
    }

    #[test]
    fn deleted_rows_do_not_count() {
        let mut gone = row("Gone", 30, "true");
        gone.delete = true;
        let id = Uuid::new_v4();
        gone.id = Some(id);

        let form = pref_form(vec![row("Control", 50, "false"), gone, row("Treatment", 50, "true")]);
        let clean = form.clean(ExperimentType::Pref, &context()).unwrap();
        assert_eq!(clean.deleted, vec![id]);
        assert_eq!(clean.variants.len(), 2);
    }

    #[test]
    fn names_must_be_unique() {
        let form = pref_form(vec![row("Same", 50, "false"), row("Same", 50, "true")]);
        let errors = errors(form.clean(ExperimentType::Pref, &context()));
        assert_eq!(errors.get("variants-0-name").unwrap(), [NAMES_MUST_BE_UNIQUE]);
        assert_eq!(errors.get("variants-1-name").unwrap(), [NAMES_MUST_BE_UNIQUE]);
    }

    #[test]
    fn names_with_the_same_slug_collide() {
        let form = pref_form(vec![row("Control", 50, "false"), row("control!", 50, "true")]);
        let errors = errors(form.clean(ExperimentType::Pref, &context()));
        assert_eq!(errors.get("variants-0-name").unwrap(), [NAMES_MUST_BE_UNIQUE]);
        assert_eq!(errors.get("variants-1-name").unwrap(), [NAMES_MUST_BE_UNIQUE]);
    }

    #[test]
    fn pref_values_must_be_unique_and_typed() {
        let form = pref_form(vec![row("Control", 50, "true"), row("Treatment", 50, "true")]);
        let errors1 = errors(form.clean(ExperimentType::Pref, &context()));
        assert_eq!(errors1.get("variants-1-value").unwrap(), [VALUES_MUST_BE_UNIQUE]);

        let form = pref_form(vec![row("Control", 50, "false"), row("Treatment", 50, "\"yes\"")]);
        let errors2 = errors(form.clean(ExperimentType::Pref, &context()));
        assert_eq!(
            errors2.get("variants-1-value").unwrap(),
            ["Unexpected value type (should be boolean)"]
        );
        assert!(!errors2.has("variants-0-value"));
    }

    #[test]
    fn integer_prefs_reject_floats() {
        let mut form = pref_form(vec![row("Control", 50, "1"), row("Treatment", 50, "1.5")]);
        form.pref_type = Some("integer".into());
        let errors = errors(form.clean(ExperimentType::Pref, &context()));
        assert!(errors.has("variants-1-value"));
        assert!(!errors.has("variants-0-value"));
    }

    #[test]
    fn population_bounds() {
        let mut form = pref_form(vec![row("Control", 50, "false"), row("Treatment", 50, "true")]);
        form.population_percent = Some(0.0);
        let errors = errors(form.clean(ExperimentType::Pref, &context()));
        assert_eq!(errors.get("population_percent").unwrap(), [POPULATION_OUT_OF_RANGE]);
    }

    #[test]
    fn unknown_version_and_locale() {
        let mut form = pref_form(vec![row("Control", 50, "false"), row("Treatment", 50, "true")]);
        form.firefox_version = Some("12.0".into());
        form.locales = vec!["xx".into()];
        let errors = errors(form.clean(ExperimentType::Pref, &context()));
        assert!(errors.has("firefox_version"));
        assert!(errors.has("locales"));
    }

    #[test]
    fn addon_branches_need_no_value() {
        let form = VariantsForm {
            population_percent: Some(50.0),
            firefox_version: Some("60.0".into()),
            firefox_channel: Some("Release".into()),
            client_matching: Some("Everyone".into()),
            addon_experiment_id: Some("a".repeat(81)),
            addon_release_url: Some("https://example.com/addon.xpi".into()),
            variants: vec![
                VariantInput {
                    value: None,
                    ..row("Control", 50, "")
                },
                VariantInput {
                    value: None,
                    ..row("Treatment", 50, "")
                },
            ],
            ..VariantsForm::default()
        };
        let errors = errors(form.clean(ExperimentType::Addon, &context()));
        assert_eq!(
            errors.get("addon_experiment_id").unwrap(),
            [fields::max_length(80, 81)]
        );
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn empty_formset_is_rejected() {
        let form = pref_form(Vec::new());
        let errors = errors(form.clean(ExperimentType::Pref, &context()));
        assert_eq!(errors.get(NON_FIELD_ERRORS).unwrap(), [RATIOS_MUST_SUM]);
    }
}
