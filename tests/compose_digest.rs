// tests/compose_digest.rs
//
// Digest composition: candidate selection, top-up, and used-set commits.

mod common;

use std::sync::Arc;

use chrono::FixedOffset;
use common::{items, used_set, StaticFeed, StaticPrimary};
use gamefi_radar::ai::MockGenerator;
use gamefi_radar::compose::Composer;
use gamefi_radar::ingest::{Category, NewsFetcher};
use gamefi_radar::PipelineError;

fn sao_paulo() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).unwrap()
}

#[tokio::test]
async fn every_candidate_is_marked_before_generation() {
    let dir = tempfile::tempdir().unwrap();
    let used = used_set(dir.path());
    let fetcher = Arc::new(NewsFetcher::new(
        StaticPrimary::new(items("https://primary.io", 10, Category::Gamefi)),
        used.clone(),
    ));
    let gen = Arc::new(MockGenerator::replying("Bom dia! Resumo de hoje 👇"));
    let composer = Composer::new(fetcher, gen.clone(), sao_paulo());

    let text = composer.produce_digest().await.unwrap();
    assert_eq!(text, "Bom dia! Resumo de hoje 👇");
    assert_eq!(used.len(), 10);

    let prompts = gen.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("NOTÍCIAS DISPONÍVEIS"));
    assert!(prompts[0].contains("URL: https://primary.io/9"));
    assert!(prompts[0].contains("Categoria: GAMEFI"));
}

#[tokio::test]
async fn short_primary_list_is_topped_up_from_feeds() {
    let dir = tempfile::tempdir().unwrap();
    let used = used_set(dir.path());
    used.mark_many(["https://primary.io/1", "https://primary.io/4"]).unwrap();
    let fetcher = NewsFetcher::new(
        StaticPrimary::new(items("https://primary.io", 9, Category::Gamefi)),
        used.clone(),
    )
    .with_feed(StaticFeed::new(
        "playtoearn",
        Category::Gamefi,
        items("https://feed.io", 6, Category::Gamefi),
    ))
    .with_feed(StaticFeed::new(
        "coindesk",
        Category::Crypto,
        items("https://coin.io", 6, Category::Crypto),
    ));
    let gen = Arc::new(MockGenerator::replying("resumo"));
    let composer = Composer::new(Arc::new(fetcher), gen.clone(), sao_paulo());

    composer.produce_digest().await.unwrap();

    // 7 fresh primary items + 3 GameFi feed items (quota for a need of 3)
    assert_eq!(used.len(), 2 + 10);
    let prompt = &gen.prompts()[0];
    assert!(!prompt.contains("URL: https://primary.io/1\n"));
    assert!(prompt.contains("URL: https://feed.io/2"));
    assert!(!prompt.contains("https://feed.io/3"));
    assert!(!prompt.contains("coin.io"));
}

#[tokio::test]
async fn nothing_fresh_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let used = used_set(dir.path());
    let list = items("https://primary.io", 4, Category::Gamefi);
    used.mark_many(list.iter().map(|i| i.url.as_str())).unwrap();
    let fetcher = NewsFetcher::new(StaticPrimary::new(list), used.clone())
        .with_feed(StaticFeed::failing("dappradar", Category::Gamefi));
    let gen = Arc::new(MockGenerator::replying("não deveria ser chamado"));
    let composer = Composer::new(Arc::new(fetcher), gen.clone(), sao_paulo());

    let err = composer.produce_digest().await.unwrap_err();
    assert!(matches!(err, PipelineError::NoFreshContent));
    assert!(gen.prompts().is_empty());
}

#[tokio::test]
async fn failed_generation_still_consumes_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let used = used_set(dir.path());
    let fetcher = NewsFetcher::new(
        StaticPrimary::new(items("https://primary.io", 10, Category::Gamefi)),
        used.clone(),
    );
    let composer = Composer::new(Arc::new(fetcher), Arc::new(MockGenerator::failing()), sao_paulo());

    let err = composer.produce_digest().await.unwrap_err();
    assert!(matches!(err, PipelineError::GenerationFailed));
    assert_eq!(used.len(), 10);

    // the next run sees nothing fresh
    let err = composer.produce_digest().await.unwrap_err();
    assert!(matches!(err, PipelineError::NoFreshContent));
}
