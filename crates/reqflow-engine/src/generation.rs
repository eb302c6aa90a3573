//! Generation stage seam.
//!
//! Renderers that turn the final requirement list into a document live
//! outside this crate; they plug in through [`ArtifactGenerator`].
//! [`RequirementSetGenerator`] is the built-in default and packages the
//! list with its derived relation index.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqflow_model::{RelationIndex, Requirement};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub id: String,
    pub job_id: String,
    pub generator: String,
    pub source_documents: Vec<String>,
    pub requirements: Vec<Requirement>,
    pub relations: RelationIndex,
    /// Requirement counts keyed by type
    pub by_type: BTreeMap<String, usize>,
    pub generated_at: DateTime<Utc>,
    /// Rendered output, for generators that produce one
    pub body: Option<String>,
}

#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        job_id: &str,
        requirements: &[Requirement],
        source_documents: &[String],
    ) -> Result<GeneratedArtifact, PipelineError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RequirementSetGenerator;

#[async_trait]
impl ArtifactGenerator for RequirementSetGenerator {
    fn name(&self) -> &str {
        "requirement-set"
    }

    async fn generate(
        &self,
        job_id: &str,
        requirements: &[Requirement],
        source_documents: &[String],
    ) -> Result<GeneratedArtifact, PipelineError> {
        let mut by_type = BTreeMap::new();
        for req in requirements {
            *by_type
                .entry(req.requirement_type.as_str().to_string())
                .or_insert(0) += 1;
        }
        Ok(GeneratedArtifact {
            id: format!("ART-{}", Uuid::new_v4().simple()),
            job_id: job_id.to_string(),
            generator: self.name().to_string(),
            source_documents: source_documents.to_vec(),
            requirements: requirements.to_vec(),
            relations: RelationIndex::build(requirements),
            by_type,
            generated_at: Utc::now(),
            body: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqflow_model::RequirementType;

    #[tokio::test]
    async fn packages_requirements_with_relation_index() {
        let mut first = Requirement::new("REQ-001", RequirementType::Functional, "Login", "d");
        first.related_ids.push("REQ-002".into());
        let second = Requirement::new("REQ-002", RequirementType::Constraint, "SSO only", "d");

        let artifact = RequirementSetGenerator
            .generate("job-1", &[first, second], &["notes.md".into()])
            .await
            .unwrap();

        assert!(artifact.id.starts_with("ART-"));
        assert_eq!(artifact.requirements.len(), 2);
        assert_eq!(artifact.relations.incoming("REQ-002"), ["REQ-001"]);
        assert_eq!(artifact.by_type.get("CONSTRAINT"), Some(&1));
        assert_eq!(artifact.source_documents, ["notes.md"]);
    }
}
