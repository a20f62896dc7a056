// SPDX-License-Identifier: MIT

//! Schema contracts for structured extraction
//!
//! Each extractable [`SectionKind`] has a [`SchemaContract`]: a JSON schema
//! sent to the model as a hint, and a validator turning [`RawOutput`] into
//! typed [`ExtractionItem`]s. Raw output never enters a result without
//! passing through `validate`.

use once_cell::sync::Lazy;
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::adk::client::RawOutput;
use crate::adk::error::SchemaViolation;
use crate::cvsense::document::SectionKind;

fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Contact details of the candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PersonalInfo {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub linkedin_url: Option<String>,
    pub github_url: Option<String>,
    pub portfolio_url: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    #[schemars(with = "Vec<String>")]
    pub other_urls: Vec<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EducationEntry {
    pub institution_name: String,
    pub degree_name: Option<String>,
    pub major: Option<String>,
    /// Free-form date, e.g. "2019", "2019-06" or "June 2019"
    pub graduation_date: Option<String>,
    pub gpa: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    #[schemars(with = "Vec<String>")]
    pub relevant_courses: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExperienceEntry {
    pub company_name: String,
    pub job_title: String,
    pub start_date: Option<String>,
    /// "Present" for a current position
    pub end_date: Option<String>,
    pub duration: Option<String>,
    pub location: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    #[schemars(with = "Vec<String>")]
    pub responsibilities_achievements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SkillEntry {
    pub skill_name: String,
    pub proficiency_level: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectEntry {
    pub project_name: String,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    #[schemars(with = "Vec<String>")]
    pub technologies_used: Vec<String>,
    pub role: Option<String>,
    pub project_url: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CertificateEntry {
    pub certificate_name: String,
    pub issuing_organization: Option<String>,
    pub issue_date: Option<String>,
    pub expiration_date: Option<String>,
    pub credential_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InterestEntry {
    pub interest_name: String,
    pub description: Option<String>,
}

/// A validated record produced from one section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ExtractionItem {
    PersonalInfo(PersonalInfo),
    Education(EducationEntry),
    Experience(ExperienceEntry),
    Skill(SkillEntry),
    Project(ProjectEntry),
    Certificate(CertificateEntry),
    Interest(InterestEntry),
}

/// Wire shape every extraction call must return
#[derive(Debug, Deserialize, JsonSchema)]
struct ItemList<T> {
    items: Vec<T>,
}

/// A typed item with its own field-level checks
trait ContractItem: DeserializeOwned + JsonSchema {
    fn check(&self) -> Result<(), String>;
    fn into_item(self) -> ExtractionItem;
}

fn require(field: &str, value: &str) -> Result<(), String> {
    if is_blank(value) {
        Err(format!("required field '{}' is empty", field))
    } else {
        Ok(())
    }
}

impl ContractItem for PersonalInfo {
    fn check(&self) -> Result<(), String> {
        match self.email.as_deref() {
            Some(email) if !is_blank(email) && !email.contains('@') => {
                Err(format!("email '{}' is not an address", email))
            }
            _ => Ok(()),
        }
    }

    fn into_item(self) -> ExtractionItem {
        ExtractionItem::PersonalInfo(self)
    }
}

impl ContractItem for EducationEntry {
    fn check(&self) -> Result<(), String> {
        require("institution_name", &self.institution_name)
    }

    fn into_item(self) -> ExtractionItem {
        ExtractionItem::Education(self)
    }
}

impl ContractItem for ExperienceEntry {
    fn check(&self) -> Result<(), String> {
        require("company_name", &self.company_name)?;
        require("job_title", &self.job_title)
    }

    fn into_item(self) -> ExtractionItem {
        ExtractionItem::Experience(self)
    }
}

impl ContractItem for SkillEntry {
    fn check(&self) -> Result<(), String> {
        require("skill_name", &self.skill_name)
    }

    fn into_item(self) -> ExtractionItem {
        ExtractionItem::Skill(self)
    }
}

impl ContractItem for ProjectEntry {
    fn check(&self) -> Result<(), String> {
        require("project_name", &self.project_name)
    }

    fn into_item(self) -> ExtractionItem {
        ExtractionItem::Project(self)
    }
}

impl ContractItem for CertificateEntry {
    fn check(&self) -> Result<(), String> {
        require("certificate_name", &self.certificate_name)
    }

    fn into_item(self) -> ExtractionItem {
        ExtractionItem::Certificate(self)
    }
}

impl ContractItem for InterestEntry {
    fn check(&self) -> Result<(), String> {
        require("interest_name", &self.interest_name)
    }

    fn into_item(self) -> ExtractionItem {
        ExtractionItem::Interest(self)
    }
}

fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or(Value::Null)
}

fn validate_list<T: ContractItem>(value: Value) -> Result<Vec<ExtractionItem>, SchemaViolation> {
    let list: ItemList<T> = serde_json::from_value(value)
        .map_err(|e| SchemaViolation::new(format!("does not match item list: {}", e)))?;
    for (index, item) in list.items.iter().enumerate() {
        item.check()
            .map_err(|message| SchemaViolation::new(format!("items[{}]: {}", index, message)))?;
    }
    Ok(list.items.into_iter().map(ContractItem::into_item).collect())
}

type Validator = fn(Value) -> Result<Vec<ExtractionItem>, SchemaViolation>;

/// Schema plus validator for one section kind
pub struct SchemaContract {
    kind: SectionKind,
    schema: Value,
    validator: Validator,
}

impl std::fmt::Debug for SchemaContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaContract")
            .field("kind", &self.kind)
            .finish()
    }
}

fn contract<T: ContractItem>(kind: SectionKind) -> SchemaContract {
    SchemaContract {
        kind,
        schema: schema_of::<ItemList<T>>(),
        validator: validate_list::<T>,
    }
}

static CONTRACTS: Lazy<Vec<SchemaContract>> = Lazy::new(|| {
    vec![
        contract::<PersonalInfo>(SectionKind::PersonalInfo),
        contract::<EducationEntry>(SectionKind::Education),
        contract::<ExperienceEntry>(SectionKind::WorkExperience),
        contract::<SkillEntry>(SectionKind::Skills),
        contract::<ProjectEntry>(SectionKind::Projects),
        contract::<CertificateEntry>(SectionKind::Certificates),
        contract::<InterestEntry>(SectionKind::Interests),
    ]
});

impl SchemaContract {
    /// Contract for a section kind; `None` for free-text kinds
    pub fn for_section(kind: SectionKind) -> Option<&'static SchemaContract> {
        CONTRACTS.iter().find(|c| c.kind == kind)
    }

    pub fn kind(&self) -> SectionKind {
        self.kind
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Validate raw model output. Pure: equal input, equal result.
    pub fn validate(&self, raw: &RawOutput) -> Result<Vec<ExtractionItem>, SchemaViolation> {
        (self.validator)(raw.json()?)
    }
}

// ============================================================================
// Inference contract
// ============================================================================

/// Higher-level trait derived from the structured data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InferredCharacteristic {
    /// e.g. "soft_skill", "role_fit", "work_style"
    pub characteristic_type: String,
    pub statement: String,
    #[serde(default, deserialize_with = "nullable_vec")]
    #[schemars(with = "Vec<String>")]
    pub evidence: Vec<String>,
}

/// Fit against a supplied job description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobAlignment {
    /// 0 to 100
    pub score: u32,
    #[serde(default, deserialize_with = "nullable_vec")]
    #[schemars(with = "Vec<String>")]
    pub matched_skills: Vec<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    #[schemars(with = "Vec<String>")]
    pub missing_skills: Vec<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InferenceOutput {
    #[serde(default, deserialize_with = "nullable_vec")]
    #[schemars(with = "Vec<InferredCharacteristic>")]
    pub characteristics: Vec<InferredCharacteristic>,
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    #[schemars(with = "Vec<String>")]
    pub keywords: Vec<String>,
    pub job_alignment: Option<JobAlignment>,
}

static INFERENCE_SCHEMA: Lazy<Value> = Lazy::new(schema_of::<InferenceOutput>);

pub fn inference_schema() -> &'static Value {
    &INFERENCE_SCHEMA
}

pub fn validate_inference(raw: &RawOutput) -> Result<InferenceOutput, SchemaViolation> {
    let output: InferenceOutput = serde_json::from_value(raw.json()?)
        .map_err(|e| SchemaViolation::new(format!("does not match inference output: {}", e)))?;

    for (index, item) in output.characteristics.iter().enumerate() {
        require("characteristic_type", &item.characteristic_type)
            .and_then(|_| require("statement", &item.statement))
            .map_err(|m| SchemaViolation::new(format!("characteristics[{}]: {}", index, m)))?;
    }
    if let Some(alignment) = &output.job_alignment {
        if alignment.score > 100 {
            return Err(SchemaViolation::new(format!(
                "job_alignment.score {} is outside 0-100",
                alignment.score
            )));
        }
    }
    Ok(output)
}
