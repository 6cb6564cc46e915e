// src/draft.rs
//! Concept outline for one funding call.

use crate::listing::Listing;
use crate::llm::{GenerativeService, ServiceError, ServiceRequest};
use crate::profile::Profile;

fn concept_prompt(profile: &Profile, listing: &Listing) -> String {
    let call = serde_json::to_string_pretty(listing).unwrap_or_default();
    // recency weights are noise for drafting
    let prof = serde_json::json!({
        "themes": profile.themes,
        "methods_keywords": profile.methods_keywords,
        "application_domains": profile.application_domains,
        "strongest_prior_results": profile.strongest_prior_results,
    });
    format!(
        "Draft a 2-page concept (outline + key paragraphs).
Sections:
1) Project Summary (250-350 words)
2) Intellectual Merit
3) Broader Impacts
4) Approach (3 aims with methods + risks)
5) Work Plan (12-24 months milestones)
6) Relevant Prior Work (cite 5-8 publications by title based on the profile)

Call:
{call}

Profile:
{prof:#}"
    )
}

/// Free-text draft; service failures are returned to the caller as-is.
pub async fn draft_concept(
    service: &dyn GenerativeService,
    profile: &Profile,
    listing: &Listing,
) -> Result<String, ServiceError> {
    let text = service
        .generate(&ServiceRequest::new(concept_prompt(profile, listing)))
        .await?;
    let text = text.trim();
    if text.is_empty() {
        return Err(ServiceError::Invalid("empty draft".into()));
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockService;

    #[tokio::test]
    async fn draft_passes_text_through() {
        let svc = MockService::new().reply("  # Concept\nAims...  ");
        let profile = Profile {
            themes: vec!["soft robotics".into()],
            ..Profile::default()
        };
        let listing = Listing {
            title: "Future of Robots".into(),
            ..Listing::default()
        };
        let out = draft_concept(&svc, &profile, &listing).await.unwrap();
        assert_eq!(out, "# Concept\nAims...");
        let prompt = &svc.requests()[0].prompt;
        assert!(prompt.contains("Future of Robots"));
        assert!(prompt.contains("soft robotics"));
    }

    #[tokio::test]
    async fn empty_draft_is_an_error() {
        let svc = MockService::new().reply("   ");
        let err = draft_concept(&svc, &Profile::default(), &Listing::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(_)));
    }
}
