use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::domain::price_table::{PriceRule, PriceRuleGroup, PriceTable, UnitPricing};
use crate::wizard::definition::{
    DefinitionError, StepDefinition, StepKind, StepOption, WizardDefinition, WizardKind,
};

pub const PRICING_BASE_PRICE: i64 = 500;
pub const PRICING_FLOOR: i64 = 300;
pub const PAGES_INCLUDED: i64 = 5;
pub const PRICE_PER_EXTRA_PAGE: i64 = 20;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read wizard definition `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("invalid wizard definition `{path}`: {source}")]
    Invalid { path: PathBuf, source: DefinitionError },
    #[error("wizard definition `{path}` declares kind {found} but was configured for {expected}")]
    KindMismatch { path: PathBuf, expected: WizardKind, found: WizardKind },
    #[error("built-in wizard definition is invalid: {0}")]
    BuiltIn(#[from] DefinitionError),
}

/// The wizard definitions served by one deployment.
#[derive(Clone, Debug)]
pub struct Catalog {
    pricing: Arc<WizardDefinition>,
    audit: Arc<WizardDefinition>,
}

impl Catalog {
    pub fn builtin() -> Result<Self, CatalogError> {
        Ok(Self { pricing: Arc::new(pricing_simulator()?), audit: Arc::new(audit_request()?) })
    }

    /// Built-in definitions, each replaced by a TOML file when a path is given.
    pub fn load(
        pricing_path: Option<&Path>,
        audit_path: Option<&Path>,
    ) -> Result<Self, CatalogError> {
        let pricing = match pricing_path {
            Some(path) => read_definition(path, WizardKind::PricingSimulator)?,
            None => pricing_simulator()?,
        };
        let audit = match audit_path {
            Some(path) => read_definition(path, WizardKind::AuditRequest)?,
            None => audit_request()?,
        };
        Ok(Self { pricing: Arc::new(pricing), audit: Arc::new(audit) })
    }

    pub fn get(&self, kind: WizardKind) -> Arc<WizardDefinition> {
        match kind {
            WizardKind::PricingSimulator => Arc::clone(&self.pricing),
            WizardKind::AuditRequest => Arc::clone(&self.audit),
        }
    }
}

fn read_definition(path: &Path, expected: WizardKind) -> Result<WizardDefinition, CatalogError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| CatalogError::ReadFile { path: path.to_path_buf(), source })?;
    let definition = WizardDefinition::from_toml_str(&raw)
        .map_err(|source| CatalogError::Invalid { path: path.to_path_buf(), source })?;
    if definition.kind() != expected {
        return Err(CatalogError::KindMismatch {
            path: path.to_path_buf(),
            expected,
            found: definition.kind(),
        });
    }
    Ok(definition)
}

struct PricedOption {
    key: &'static str,
    label: &'static str,
    delta: i64,
}

const fn priced(key: &'static str, label: &'static str, delta: i64) -> PricedOption {
    PricedOption { key, label, delta }
}

const PROJECT_TYPES: &[PricedOption] = &[
    priced("vitrine", "Site vitrine", 0),
    priced("ecommerce", "Boutique e-commerce", 200),
    priced("blog", "Blog", 100),
    priced("plateforme", "Plateforme sur mesure", 500),
];

const FEATURES: &[PricedOption] = &[
    priced("seo", "Optimisation SEO", 50),
    priced("blog", "Blog intégré", 100),
    priced("ecommerce", "Module e-commerce", 200),
    priced("booking", "Réservation en ligne", 150),
    priced("crm", "Intégration CRM", 200),
    priced("analytics", "Tableau de bord analytics", 75),
];

const TIMELINES: &[PricedOption] = &[
    priced("express", "Express (2 semaines)", 500),
    priced("standard", "Standard (4 à 6 semaines)", 0),
    priced("confort", "Confort (8 semaines et plus)", -200),
];

const SUPPORT_LEVELS: &[PricedOption] = &[
    priced("email", "Support par email", 0),
    priced("priority", "Support prioritaire", 100),
    priced("dedicated", "Interlocuteur dédié", 300),
];

fn step_options(options: &[PricedOption]) -> Vec<StepOption> {
    options.iter().map(|option| StepOption::new(option.key, option.label)).collect()
}

fn price_rules(options: &[PricedOption]) -> Vec<PriceRule> {
    options.iter().map(|option| PriceRule::new(option.key, option.label, option.delta)).collect()
}

fn plain_options(options: &[(&str, &str)]) -> Vec<StepOption> {
    options.iter().map(|(key, label)| StepOption::new(*key, *label)).collect()
}

pub fn pricing_simulator() -> Result<WizardDefinition, DefinitionError> {
    let steps = vec![
        StepDefinition::new(
            "project_type",
            "Type de projet",
            StepKind::SingleSelect { options: step_options(PROJECT_TYPES) },
        ),
        StepDefinition::new(
            "pages",
            "Nombre de pages",
            StepKind::Numeric { min: 1, max: 50, default: PAGES_INCLUDED },
        ),
        StepDefinition::new(
            "features",
            "Fonctionnalités",
            StepKind::MultiSelect { options: step_options(FEATURES), required: false },
        ),
        StepDefinition::new(
            "timeline",
            "Délai de livraison",
            StepKind::SingleSelect { options: step_options(TIMELINES) },
        ),
        StepDefinition::new(
            "support",
            "Accompagnement",
            StepKind::SingleSelect { options: step_options(SUPPORT_LEVELS) },
        ),
        StepDefinition::new("contact", "Vos coordonnées", StepKind::Contact),
    ];

    let table = PriceTable::new(
        PRICING_BASE_PRICE,
        PRICING_FLOOR,
        vec![
            PriceRuleGroup::single("project_type", price_rules(PROJECT_TYPES)),
            PriceRuleGroup::multiple("features", price_rules(FEATURES)),
            PriceRuleGroup::single("timeline", price_rules(TIMELINES)),
            PriceRuleGroup::single("support", price_rules(SUPPORT_LEVELS)),
        ],
        Some(UnitPricing {
            step_key: "pages".into(),
            included_threshold: PAGES_INCLUDED,
            per_unit_amount: PRICE_PER_EXTRA_PAGE,
        }),
    )?;

    WizardDefinition::new(WizardKind::PricingSimulator, steps, table)
}

pub fn audit_request() -> Result<WizardDefinition, DefinitionError> {
    let steps = vec![
        StepDefinition::new("website", "Votre site actuel", StepKind::Text { optional: true }),
        StepDefinition::new(
            "business_sector",
            "Secteur d'activité",
            StepKind::SingleSelect {
                options: plain_options(&[
                    ("ecommerce", "E-commerce"),
                    ("services", "Services"),
                    ("restaurant", "Restauration"),
                    ("health", "Santé"),
                    ("realestate", "Immobilier"),
                    ("craft", "Artisanat"),
                    ("coaching", "Coaching"),
                    ("other", "Autre"),
                ]),
            },
        ),
        StepDefinition::new(
            "goals",
            "Objectifs",
            StepKind::MultiSelect {
                options: plain_options(&[
                    ("visibility", "Gagner en visibilité"),
                    ("leads", "Générer des prospects"),
                    ("sales", "Augmenter les ventes"),
                    ("image", "Moderniser l'image"),
                    ("automation", "Automatiser"),
                ]),
                required: true,
            },
        ),
        StepDefinition::new(
            "budget",
            "Budget",
            StepKind::SingleSelect {
                options: plain_options(&[
                    ("low", "Moins de 1 000 €"),
                    ("medium", "1 000 à 3 000 €"),
                    ("high", "3 000 à 5 000 €"),
                    ("premium", "5 000 à 10 000 €"),
                    ("enterprise", "Plus de 10 000 €"),
                ]),
            },
        ),
        StepDefinition::new("contact", "Vos coordonnées", StepKind::Contact),
    ];

    WizardDefinition::new(WizardKind::AuditRequest, steps, PriceTable::flat(0)?)
}
