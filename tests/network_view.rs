//! End-to-end behaviour of a `NetworkView` over JSON snapshots.
//!
//! Covers the member-facing flow: load a snapshot, read statistics, expand
//! and collapse, search with reveal, fall back to the source on a miss and
//! export. No network access; the hierarchy comes from `SnapshotSource`.

use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

use referral_tree::{
    EngineConfig, MemberId, NetworkError, NetworkView, NodeState, RawMember, RemoteOutcome,
    SearchOutcome, SearchQuery, SnapshotSource,
};

const NETWORK_JSON: &str = r#"{
    "id": "R",
    "displayName": "Rita Root",
    "referralCode": "RITA01",
    "investedAmount": "1,000.00",
    "earnedAmount": 50,
    "children": [
        {
            "id": "A",
            "displayName": "Alan Leaf",
            "referralCode": "ALAN01",
            "investedAmount": 250.5,
            "investmentCount": 1,
            "children": []
        },
        {
            "id": "B",
            "displayName": "Bea Branch",
            "referralCode": "BEA01",
            "investedAmount": " 0 ",
            "children": [
                { "id": "B1", "displayName": "Bo One", "referralCode": "BO01" },
                {
                    "id": "B2",
                    "displayName": "Bex Two",
                    "referralCode": "B2-CODE",
                    "investedAmount": "99.999",
                    "earnedAmount": "1.005"
                }
            ]
        }
    ]
}"#;

fn ids(view: &NetworkView) -> Vec<String> {
    view.layout()
        .unwrap()
        .nodes
        .iter()
        .map(|n| n.id.to_string())
        .collect()
}

fn loaded() -> NetworkView {
    let raw: RawMember = serde_json::from_str(NETWORK_JSON).unwrap();
    let mut view = NetworkView::default();
    view.load(Some(&raw)).unwrap();
    view
}

#[test]
fn test_collapsed_then_expanded_scenario() {
    let mut view = loaded();
    let unit = view.config().layout.unit_width;
    let b = MemberId::from("B");

    let collapsed = view.layout().unwrap();
    assert_eq!(ids(&view), vec!["R", "A", "B"]);
    assert_eq!(collapsed.edge_count(), 2);
    assert_eq!(collapsed.position(&b).unwrap().state, NodeState::Collapsed);
    assert_eq!(collapsed.bounds.width, 2.0 * unit);
    assert_eq!(view.root_aggregate().unwrap().subtree_size, 5);

    assert!(view.toggle(&b).unwrap());
    let expanded = view.layout().unwrap();
    assert_eq!(ids(&view), vec!["R", "A", "B", "B1", "B2"]);
    assert_eq!(expanded.edge_count(), 4);

    let b1 = expanded.position(&MemberId::from("B1")).unwrap().x;
    let b2 = expanded.position(&MemberId::from("B2")).unwrap().x;
    assert_eq!(expanded.position(&b).unwrap().x, (b1 + b2) / 2.0);
    assert_eq!(expanded.position(&b).unwrap().state, NodeState::Expanded);
    assert_eq!(view.root_aggregate().unwrap().subtree_size, 5);

    assert!(!view.toggle(&b).unwrap());
    assert_eq!(view.layout().unwrap(), collapsed);
}

#[test]
fn test_amounts_are_normalized_once() {
    let view = loaded();
    let root = view.root_aggregate().unwrap();

    // 1000.00 + 250.50 + 0 + 100.00 (99.999 rounded)
    assert_eq!(root.total_invested, Decimal::new(135050, 2));
    // 50.00 + 1.01 (1.005 rounded half away from zero)
    assert_eq!(root.total_returns, Decimal::new(5101, 2));
    // R, A and B2 have money in; B reports zero; B1 reports nothing
    assert_eq!(root.active_count, 3);
    assert_eq!(root.max_depth, 2);

    let b = view.aggregate(&MemberId::from("B")).unwrap().unwrap();
    assert_eq!(b.subtree_size, 3);
    assert_eq!(b.total_invested, Decimal::new(10000, 2));
    assert!(view.aggregate(&MemberId::from("nobody")).unwrap().is_none());
}

#[test]
fn test_search_by_code_reveals_and_highlights() {
    let mut view = loaded();
    let before = view.expansion().clone();

    let outcome = view.search(&SearchQuery::code("b2-code")).unwrap();
    let found = outcome.found().unwrap();
    let path: Vec<&str> = found.path.iter().map(|id| id.as_str()).collect();
    assert_eq!(path, vec!["R", "B", "B2"]);

    assert!(view.expansion().contains(&MemberId::from("R")));
    assert!(view.expansion().contains(&MemberId::from("B")));
    assert_eq!(view.highlight(), Some(&MemberId::from("B2")));
    assert_eq!(ids(&view), vec!["R", "A", "B", "B1", "B2"]);
    assert_ne!(view.expansion(), &before);
}

#[test]
fn test_search_miss_changes_nothing() {
    let mut view = loaded();
    view.search(&SearchQuery::name("alan")).unwrap();
    let expansion = view.expansion().clone();
    let highlight = view.highlight().cloned();

    let outcome = view.search(&SearchQuery::code("NOPE")).unwrap();
    assert_eq!(outcome, SearchOutcome::NotFound);
    assert_eq!(view.expansion(), &expansion);
    assert_eq!(view.highlight().cloned(), highlight);

    let blank = view.search(&SearchQuery::name("  ")).unwrap();
    assert_eq!(blank, SearchOutcome::NotFound);
    assert_eq!(view.expansion(), &expansion);
}

#[test]
fn test_malformed_snapshots_rejected() {
    let mut view = NetworkView::default();

    let missing_id = r#"{ "id": "R", "children": [ { "displayName": "ghost" } ] }"#;
    let raw: RawMember = serde_json::from_str(missing_id).unwrap();
    let err = view.load(Some(&raw)).unwrap_err();
    assert!(matches!(err, NetworkError::MalformedTree(_)));
    assert!(!view.is_loaded());

    let bad_amount = r#"{ "id": "R", "investedAmount": "lots" }"#;
    let raw: RawMember = serde_json::from_str(bad_amount).unwrap();
    let err = view.load(Some(&raw)).unwrap_err();
    assert_eq!(err.code(), "MALFORMED_TREE_INVALID_AMOUNT");

    assert!(matches!(view.load(None), Err(NetworkError::EmptyTree)));
}

#[test]
fn test_export_matches_aggregates() {
    let view = loaded();
    let doc = view.export().unwrap();
    assert_eq!(doc.member_count, 5);
    assert_eq!(doc.root.aggregate, *view.root_aggregate().unwrap());
    assert_eq!(doc.root.children[1].children[1].referral_code, "B2-CODE");
}

#[tokio::test]
async fn test_load_from_source_marks_truncation() {
    let source = SnapshotSource::from_json(NETWORK_JSON).unwrap();
    let config = EngineConfig {
        fetch_depth: 1,
        ..EngineConfig::default()
    };
    let mut view = NetworkView::new(config);

    let report = view
        .load_from(&source, &MemberId::from("R"))
        .await
        .unwrap();
    assert_eq!(report.member_count, 3);
    assert_eq!(report.truncated.len(), 1);
    assert_eq!(report.truncated[0].id, MemberId::from("B"));
    assert_eq!(report.truncated[0].reported, 2);
    assert_eq!(report.truncated[0].materialized, 0);

    let layout = view.layout().unwrap();
    assert_eq!(
        layout.position(&MemberId::from("B")).unwrap().state,
        NodeState::Truncated
    );
    assert_eq!(
        layout.position(&MemberId::from("A")).unwrap().state,
        NodeState::Leaf
    );
}

#[tokio::test]
async fn test_locate_remote_falls_back_to_source() {
    let source = SnapshotSource::from_json(NETWORK_JSON).unwrap();
    let config = EngineConfig {
        fetch_depth: 1,
        ..EngineConfig::default()
    };
    let mut view = NetworkView::new(config);
    view.load_from(&source, &MemberId::from("R")).await.unwrap();

    let local = view
        .locate_remote(&source, &SearchQuery::name("alan"))
        .await
        .unwrap();
    assert!(matches!(local, RemoteOutcome::Local(ref m) if m.id == MemberId::from("A")));

    let before = view.expansion().clone();
    let remote = view
        .locate_remote(&source, &SearchQuery::code("BO01"))
        .await
        .unwrap();
    match remote {
        RemoteOutcome::Remote { member } => {
            assert_eq!(member.member_id(), Some(MemberId::from("B1")));
        }
        other => panic!("expected remote hit, got {:?}", other),
    }
    assert_eq!(view.expansion(), &before);
    assert_eq!(view.tree().unwrap().len(), 3);

    let missing = view
        .locate_remote(&source, &SearchQuery::code("NOBODY"))
        .await
        .unwrap();
    assert_eq!(missing, RemoteOutcome::NotFound);
}

#[tokio::test]
async fn test_unknown_root_is_empty_tree() {
    let source = SnapshotSource::from_json(NETWORK_JSON).unwrap();
    let mut view = NetworkView::default();
    let err = view
        .load_from(&source, &MemberId::from("stranger"))
        .await
        .unwrap_err();
    assert!(matches!(err, NetworkError::EmptyTree));
}

#[tokio::test]
async fn test_deep_snapshot_file_loads_pruned() {
    let depth = 120;
    let mut json = String::new();
    for i in 0..depth {
        json.push_str(&format!(r#"{{"id":"n-{i}","investedAmount":"1.00","children":["#));
    }
    json.push_str(&"]}".repeat(depth));

    let source = SnapshotSource::from_json(&json).unwrap();
    assert_eq!(source.root_id(), Some(MemberId::from("n-0")));

    let mut view = NetworkView::default();
    let report = view.load_from(&source, &MemberId::from("n-0")).await.unwrap();
    let fetch_depth = view.config().fetch_depth;
    assert_eq!(report.member_count, fetch_depth as usize + 1);
    assert_eq!(report.truncated.len(), 1);
    assert_eq!(
        report.truncated[0].id,
        MemberId::from(format!("n-{}", fetch_depth))
    );

    let blank = view
        .locate_remote(&source, &SearchQuery::name(""))
        .await
        .unwrap();
    assert_eq!(blank, RemoteOutcome::NotFound);
}
