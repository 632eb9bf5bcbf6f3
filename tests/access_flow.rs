//! End-to-end access flows over the in-memory stores.
//!
//! These exercise resolver, cooldown, export scoping and reconciliation
//! together, the way a request handler would drive them.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use filing_gate::{
    AccessError, CallerIdentity, Category, Clock, EntitlementResolver, ExportGuard, FilingRecord,
    FilingStatus, InMemoryPreferenceStore, InMemoryRecordStore, ManualClock, PreferenceStore,
    PreferenceUpdate, PriceTierMap, SearchFilters, Signal, StaticSubscriptionProvider,
    SubscriptionEvent, Tier, EXPORT_ROW_CEILING,
};

struct Harness {
    prefs: Arc<InMemoryPreferenceStore>,
    provider: Arc<StaticSubscriptionProvider>,
    clock: ManualClock,
    resolver: EntitlementResolver,
}

fn prices() -> PriceTierMap {
    PriceTierMap::new(["price_cat"], ["price_premier"])
}

fn harness() -> Harness {
    let prefs = Arc::new(InMemoryPreferenceStore::new());
    let provider = Arc::new(StaticSubscriptionProvider::with_prices(prices()));
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap());
    let resolver = EntitlementResolver::new(
        prefs.clone(),
        provider.clone(),
        prices(),
        Arc::new(clock.clone()),
    );
    Harness {
        prefs,
        provider,
        clock,
        resolver,
    }
}

fn filing(n: usize, code: &str) -> FilingRecord {
    FilingRecord {
        ttb_id: format!("25{:012}", n),
        brand_name: format!("Brand {n}"),
        fanciful_name: None,
        company_name: "Example Spirits Co".to_string(),
        class_type_code: code.to_string(),
        origin_code: "KY".to_string(),
        approval_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + Duration::days((n % 60) as i64),
        status: FilingStatus::Approved,
        signal: Signal::NewSku,
        refile_count: 0,
    }
}

fn pick(category: &str, confirm: bool) -> PreferenceUpdate {
    PreferenceUpdate {
        tier_category: Some(category.to_string()),
        confirm_change: confirm,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_subscriber_lifecycle_with_cooldown() {
    let h = harness();
    h.provider.add("Buyer@Example.com", "price_cat");

    // First contact by email reconciles from the provider.
    let ent = h
        .resolver
        .resolve(&CallerIdentity::email("buyer@example.com"))
        .await
        .unwrap();
    assert_eq!(ent.tier, Tier::CategoryPro);
    assert_eq!(ent.tier_category, None);
    assert!(ent.can_change_category);

    let token = h
        .prefs
        .get_by_email("buyer@example.com")
        .await
        .unwrap()
        .unwrap()
        .token;

    // Initial pick needs no confirmation and starts no cooldown.
    let view = h.resolver.save_preferences(&token, &pick("Whiskey", false)).await.unwrap();
    assert_eq!(view.tier_category, Some(Category::Whiskey));
    assert!(view.can_change_category);

    // A switch must be confirmed.
    let err = h.resolver.save_preferences(&token, &pick("Tequila", false)).await.unwrap_err();
    assert!(matches!(
        err,
        AccessError::ConfirmationRequired {
            current: Category::Whiskey,
            requested: Category::Tequila
        }
    ));

    let view = h.resolver.save_preferences(&token, &pick("Tequila", true)).await.unwrap();
    assert_eq!(view.tier_category, Some(Category::Tequila));
    assert!(!view.can_change_category);
    let ends = view.cooldown_ends_at.unwrap();
    assert_eq!(ends, h.clock.now() + Duration::days(7));

    // Inside the cooldown, even a confirmed switch is refused.
    h.clock.advance(Duration::days(6));
    let err = h.resolver.save_preferences(&token, &pick("Vodka", true)).await.unwrap_err();
    assert!(matches!(err, AccessError::CooldownActive { cooldown_ends_at } if cooldown_ends_at == ends));

    // Re-selecting the current category is a no-op even inside the cooldown.
    let view = h.resolver.save_preferences(&token, &pick("tequila", false)).await.unwrap();
    assert_eq!(view.tier_category, Some(Category::Tequila));

    h.clock.advance(Duration::days(1));
    let view = h.resolver.save_preferences(&token, &pick("Vodka", true)).await.unwrap();
    assert_eq!(view.tier_category, Some(Category::Vodka));
}

#[tokio::test]
async fn test_rejected_change_leaves_record_untouched() {
    let h = harness();
    h.provider.add("a@example.com", "price_cat");
    h.resolver.reconcile("a@example.com").await.unwrap();
    let before = h.prefs.get_by_email("a@example.com").await.unwrap().unwrap();

    let update = PreferenceUpdate {
        receive_free_report: Some(false),
        tier_category: Some("Absinthe".to_string()),
        ..Default::default()
    };
    let err = h.resolver.save_preferences(&before.token, &update).await.unwrap_err();
    assert!(matches!(err, AccessError::Validation(_)));

    let after = h.prefs.get_by_email("a@example.com").await.unwrap().unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let h = harness();
    h.provider.add("repeat@example.com", "price_premier");

    let first = h.resolver.reconcile("repeat@example.com").await.unwrap().unwrap();
    let second = h.resolver.reconcile("REPEAT@example.com ").await.unwrap().unwrap();

    assert_eq!(first.token, second.token);
    assert_eq!(second.tier(), Tier::Premier);
    assert_eq!(h.prefs.len(), 1);
}

#[tokio::test]
async fn test_concurrent_reconcile_converges() {
    let h = harness();
    h.provider.add("race@example.com", "price_cat");

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let resolver = h.resolver.clone();
            tokio::spawn(async move { resolver.reconcile("race@example.com").await })
        })
        .collect();

    let mut tokens = Vec::new();
    for task in tasks {
        tokens.push(task.await.unwrap().unwrap().unwrap().token);
    }
    tokens.dedup();
    assert_eq!(tokens.len(), 1);
    assert_eq!(h.prefs.len(), 1);
}

#[tokio::test]
async fn test_provider_outage_degrades_to_not_found() {
    let h = harness();
    h.provider.add("down@example.com", "price_cat");
    h.provider.set_unavailable(true);

    let err = h
        .resolver
        .resolve(&CallerIdentity::email("down@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::NotFound(_)));
    assert!(h.prefs.is_empty());

    h.provider.set_unavailable(false);
    let ent = h
        .resolver
        .resolve(&CallerIdentity::email("down@example.com"))
        .await
        .unwrap();
    assert_eq!(ent.tier, Tier::CategoryPro);
}

#[tokio::test]
async fn test_known_subscriber_never_consults_provider() {
    let h = harness();
    h.provider.add("local@example.com", "price_cat");
    h.resolver.reconcile("local@example.com").await.unwrap();
    let lookups = h.provider.lookups();

    h.provider.set_unavailable(true);
    let ent = h
        .resolver
        .resolve(&CallerIdentity::email("local@example.com"))
        .await
        .unwrap();
    assert_eq!(ent.tier, Tier::CategoryPro);
    assert_eq!(h.provider.lookups(), lookups);
}

#[tokio::test]
async fn test_cancellation_then_reactivation() {
    let h = harness();
    h.provider.add("churn@example.com", "price_premier");
    let pref = h.resolver.reconcile("churn@example.com").await.unwrap().unwrap();

    h.resolver
        .apply_subscription_event("churn@example.com", &SubscriptionEvent::Canceled)
        .await
        .unwrap();
    let ent = h.resolver.resolve(&CallerIdentity::token(&pref.token)).await.unwrap();
    assert_eq!(ent.tier, Tier::None);

    h.resolver
        .apply_subscription_event(
            "churn@example.com",
            &SubscriptionEvent::Activated {
                price_id: "price_cat".to_string(),
            },
        )
        .await
        .unwrap();
    let ent = h.resolver.resolve(&CallerIdentity::token(&pref.token)).await.unwrap();
    assert_eq!(ent.tier, Tier::CategoryPro);
    assert_eq!(ent.tier_category, None);
}

#[tokio::test]
async fn test_export_rescoped_and_capped() {
    let h = harness();
    h.provider.add("exporter@example.com", "price_cat");
    let pref = h.resolver.reconcile("exporter@example.com").await.unwrap().unwrap();
    h.resolver
        .save_preferences(&pref.token, &pick("Whiskey", false))
        .await
        .unwrap();

    let mut records: Vec<FilingRecord> = (0..1200).map(|n| filing(n, "STRAIGHT BOURBON WHISKY")).collect();
    records.extend((1200..1300).map(|n| filing(n, "VODKA")));
    let store = InMemoryRecordStore::with_records(records);

    let guard = ExportGuard::new(h.resolver.clone());
    let filters = SearchFilters {
        category: Some("Vodka".to_string()),
        ..Default::default()
    };
    let plan = guard
        .prepare_export(&CallerIdentity::token(&pref.token), filters)
        .await
        .unwrap();
    assert_eq!(plan.row_ceiling, EXPORT_ROW_CEILING);

    let result = guard.run_export(&plan, &store).await.unwrap();
    assert_eq!(result.total_matched, 1200);
    assert_eq!(result.exported_count, EXPORT_ROW_CEILING as usize);
    assert!(result.truncated);
    assert!(result
        .rows
        .iter()
        .all(|r| r.class_type_code == "STRAIGHT BOURBON WHISKY"));
}

#[tokio::test]
async fn test_premier_export_keeps_requested_category() {
    let h = harness();
    h.provider.add("premier@example.com", "price_premier");

    let store = InMemoryRecordStore::with_records(
        (0..10)
            .map(|n| filing(n, "VODKA"))
            .chain((10..15).map(|n| filing(n, "TABLE RED WINE"))),
    );

    let guard = ExportGuard::new(h.resolver.clone());
    let filters = SearchFilters {
        category: Some("Wine".to_string()),
        ..Default::default()
    };
    let plan = guard
        .prepare_export(&CallerIdentity::email("premier@example.com"), filters)
        .await
        .unwrap();
    let result = guard.run_export(&plan, &store).await.unwrap();

    assert_eq!(result.total_matched, 5);
    assert_eq!(result.exported_count, 5);
    assert!(!result.truncated);
}

#[tokio::test]
async fn test_export_denied_for_unknown_and_free_callers() {
    let h = harness();
    let guard = ExportGuard::new(h.resolver.clone());

    let err = guard
        .prepare_export(&CallerIdentity::email("nobody@example.com"), SearchFilters::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::Authorization(_)));

    h.provider.add("lapsed@example.com", "price_cat");
    h.resolver.reconcile("lapsed@example.com").await.unwrap();
    h.resolver
        .apply_subscription_event("lapsed@example.com", &SubscriptionEvent::Canceled)
        .await
        .unwrap();

    let err = guard
        .prepare_export(&CallerIdentity::email("lapsed@example.com"), SearchFilters::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::Authorization(_)));
}

#[tokio::test]
async fn test_category_export_excludes_codes_classified_elsewhere() {
    let h = harness();
    h.provider.add("brewer@example.com", "price_cat");
    let pref = h.resolver.reconcile("brewer@example.com").await.unwrap().unwrap();
    h.resolver
        .save_preferences(&pref.token, &pick("Beer", false))
        .await
        .unwrap();

    // Malt whiskies contain Beer's MALT pattern but are whiskey codes.
    let store = InMemoryRecordStore::with_records(vec![
        filing(0, "INDIA PALE ALE"),
        filing(1, "SINGLE MALT SCOTCH WHISKY"),
        filing(2, "AMERICAN SINGLE MALT WHISKY"),
        filing(3, "MALT WHISKY"),
        filing(4, "VIRGIN ISLANDS RUM"),
    ]);

    let guard = ExportGuard::new(h.resolver.clone());
    let plan = guard
        .prepare_export(&CallerIdentity::token(&pref.token), SearchFilters::default())
        .await
        .unwrap();
    let result = guard.run_export(&plan, &store).await.unwrap();

    assert_eq!(result.total_matched, 1);
    assert_eq!(result.rows[0].class_type_code, "INDIA PALE ALE");
    assert!(result
        .rows
        .iter()
        .all(|r| filing_gate::classify(&r.class_type_code).category == Category::Beer));
}
