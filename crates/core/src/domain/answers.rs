use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepKey(pub String);

impl StepKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StepKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for StepKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for StepKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ContactDetails {
    /// First and last name must be present and the email must look like an
    /// address. Phone is never required.
    pub fn is_complete(&self) -> bool {
        !self.first_name.trim().is_empty()
            && !self.last_name.trim().is_empty()
            && is_plausible_email(&self.email)
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref().map(str::trim).filter(|phone| !phone.is_empty())
    }
}

fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.contains('@')
}

/// One answer, shaped after the step that collects it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Text(String),
    Choice(String),
    Choices(BTreeSet<String>),
    Number(i64),
    Contact(ContactDetails),
}

impl AnswerValue {
    pub fn choices<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Choices(values.into_iter().map(Into::into).collect())
    }

    pub fn shape(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Choice(_) => "choice",
            Self::Choices(_) => "choices",
            Self::Number(_) => "number",
            Self::Contact(_) => "contact",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSet(BTreeMap<StepKey, AnswerValue>);

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &StepKey) -> Option<&AnswerValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: StepKey, value: AnswerValue) -> Option<AnswerValue> {
        self.0.insert(key, value)
    }

    pub fn with(mut self, key: impl Into<StepKey>, value: AnswerValue) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StepKey, &AnswerValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn choice(&self, key: &StepKey) -> Option<&str> {
        match self.0.get(key) {
            Some(AnswerValue::Choice(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn choices(&self, key: &StepKey) -> Option<&BTreeSet<String>> {
        match self.0.get(key) {
            Some(AnswerValue::Choices(values)) => Some(values),
            _ => None,
        }
    }

    pub fn number(&self, key: &StepKey) -> Option<i64> {
        match self.0.get(key) {
            Some(AnswerValue::Number(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn contact(&self, key: &StepKey) -> Option<&ContactDetails> {
        match self.0.get(key) {
            Some(AnswerValue::Contact(contact)) => Some(contact),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AnswerSet, AnswerValue, ContactDetails, StepKey};

    fn contact(email: &str) -> ContactDetails {
        ContactDetails {
            first_name: "Camille".to_owned(),
            last_name: "Durand".to_owned(),
            email: email.to_owned(),
            phone: None,
        }
    }

    #[test]
    fn contact_requires_names_and_plausible_email() {
        assert!(contact("camille@example.fr").is_complete());
        assert!(!contact("").is_complete());
        assert!(!contact("   ").is_complete());
        assert!(!contact("camille.example.fr").is_complete());

        let unnamed = ContactDetails { first_name: " ".to_owned(), ..contact("a@b.fr") };
        assert!(!unnamed.is_complete());
    }

    #[test]
    fn blank_phone_is_treated_as_absent() {
        let with_blank = ContactDetails { phone: Some("  ".to_owned()), ..contact("a@b.fr") };
        assert_eq!(with_blank.phone(), None);

        let with_phone =
            ContactDetails { phone: Some(" 06 12 34 56 78 ".to_owned()), ..contact("a@b.fr") };
        assert_eq!(with_phone.phone(), Some("06 12 34 56 78"));
    }

    #[test]
    fn typed_accessors_ignore_mismatched_shapes() {
        let answers = AnswerSet::new()
            .with("project_type", AnswerValue::Choice("ecommerce".to_owned()))
            .with("pages", AnswerValue::Number(12))
            .with("features", AnswerValue::choices(["seo", "crm"]));

        assert_eq!(answers.choice(&StepKey::from("project_type")), Some("ecommerce"));
        assert_eq!(answers.number(&StepKey::from("pages")), Some(12));
        assert_eq!(answers.number(&StepKey::from("project_type")), None);
        assert_eq!(answers.choices(&StepKey::from("features")).map(|set| set.len()), Some(2));
        assert!(answers.contact(&StepKey::from("contact")).is_none());
    }

    #[test]
    fn answer_set_serializes_as_keyed_object() {
        let answers = AnswerSet::new().with("pages", AnswerValue::Number(7));
        let json = serde_json::to_value(&answers).expect("serialize answers");

        assert_eq!(json["pages"]["type"], "number");
        assert_eq!(json["pages"]["value"], 7);

        let decoded: AnswerSet = serde_json::from_value(json).expect("deserialize answers");
        assert_eq!(decoded, answers);
    }
}
