// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// tests/engine/test_similarity_flow.rs - Related-document lookups in prompts

use super::helpers::*;
use docqa_engine::{
    CorpusDocument, DocumentType, PipelineConfig, SimilarityConfig, TfidfIndex,
};
use std::sync::Arc;

fn reference_corpus() -> Vec<CorpusDocument> {
    vec![
        CorpusDocument {
            filename: "health_policy.txt".to_string(),
            content: "The grace period for premium payment is thirty days. The waiting \
                      period for pre-existing diseases applies from inception. \
                      Hospitalization expenses and the sum insured are defined per policy year."
                .to_string(),
            document_type: DocumentType::HealthInsurance,
        },
        CorpusDocument {
            filename: "group_cover.txt".to_string(),
            content: "Premium payment within the grace period keeps coverage active. \
                      Hospitalization expenses are paid up to the sum insured for each \
                      policy year and renewals. Waiting period rules apply to \
                      pre-existing diseases under this policy."
                .to_string(),
            document_type: DocumentType::InsurancePolicy,
        },
        CorpusDocument {
            filename: "bread_recipe.txt".to_string(),
            content: "Preheat the oven and knead the dough until smooth. Bake the loaf \
                      for forty minutes and let it cool on a rack before slicing."
                .to_string(),
            document_type: DocumentType::InsuranceDocument,
        },
    ]
}

#[test]
fn test_index_ranks_insurance_corpus_over_recipes() {
    let index = TfidfIndex::build(&reference_corpus(), SimilarityConfig::default()).unwrap();
    assert_eq!(index.document_count(), 3);

    let query = "The grace period for premium payment is thirty days. Hospitalization \
                 expenses are covered up to the sum insured. The waiting period for \
                 pre-existing diseases is thirty-six months.";
    let matches = index.query(query, 3);

    assert!(!matches.is_empty());
    for matched in &matches {
        assert_ne!(matched.filename, "bread_recipe.txt");
        assert!(matched.score > 0.1);
    }
    let filenames: Vec<&str> = matches.iter().map(|m| m.filename.as_str()).collect();
    assert!(filenames.contains(&"health_policy.txt"));
    assert!(filenames.contains(&"group_cover.txt"));
}

#[tokio::test]
async fn test_related_excerpts_reach_prompts_when_index_attached() {
    let index = Arc::new(
        TfidfIndex::build(&reference_corpus(), SimilarityConfig::default()).unwrap(),
    );
    let client = Arc::new(PromptSpyClient::new("Noted."));
    let pipeline =
        build_pipeline(client.clone(), PipelineConfig::default()).with_index(index);
    let url = serve_document(policy_document()).await;

    pipeline
        .run(&url, vec!["What is the grace period?".to_string()])
        .await
        .unwrap();

    let prompts = client.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];
    assert!(prompt.contains("RELATED REFERENCE EXCERPTS:"));
    assert!(prompt.contains("health_policy.txt"));
    assert!(prompt.contains("[health_insurance]"));
    assert!(!prompt.contains("bread_recipe.txt"));
}

#[tokio::test]
async fn test_prompts_carry_no_reference_block_without_index() {
    let client = Arc::new(PromptSpyClient::new("Noted."));
    let pipeline = build_pipeline(client.clone(), PipelineConfig::default());
    let url = serve_document(policy_document()).await;

    pipeline
        .run(&url, vec!["What is the grace period?".to_string()])
        .await
        .unwrap();

    let prompts = client.prompts.lock().unwrap();
    assert!(!prompts[0].contains("RELATED REFERENCE EXCERPTS:"));
}
