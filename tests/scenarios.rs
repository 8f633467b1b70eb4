//! End-to-end scenarios driven through the wire protocol: a decoded text
//! frame goes in via [`FeedNormalizer::handle_frame`], and the resulting
//! book state is checked through [`SnapshotPublisher`] and
//! [`metrics::compute`], exercised at the wire boundary rather than against
//! `OrderBook` directly.

use std::sync::Arc;

use marketbook::book::BookRegistry;
use marketbook::feed::FeedNormalizer;
use marketbook::metrics;
use marketbook::snapshot::SnapshotPublisher;
use rust_decimal_macros::dec;

fn normalizer() -> FeedNormalizer {
    FeedNormalizer::new(Arc::new(BookRegistry::new()))
}

#[test]
fn scenario_a_basic_add_best_via_l3_frames() {
    let n = normalizer();
    let ids = [
        uuid::Uuid::new_v4(),
        uuid::Uuid::new_v4(),
        uuid::Uuid::new_v4(),
        uuid::Uuid::new_v4(),
    ];
    n.handle_frame(&format!(
        r#"{{"type":"open","product_id":"BTC-USD","order_id":"{}","side":"buy","price":"100.0","size":"1.5"}}"#,
        ids[0]
    ))
    .unwrap();
    n.handle_frame(&format!(
        r#"{{"type":"open","product_id":"BTC-USD","order_id":"{}","side":"buy","price":"99.0","size":"2.5"}}"#,
        ids[1]
    ))
    .unwrap();
    n.handle_frame(&format!(
        r#"{{"type":"open","product_id":"BTC-USD","order_id":"{}","side":"sell","price":"101.0","size":"1.0"}}"#,
        ids[2]
    ))
    .unwrap();
    n.handle_frame(&format!(
        r#"{{"type":"open","product_id":"BTC-USD","order_id":"{}","side":"sell","price":"102.0","size":"2.0"}}"#,
        ids[3]
    ))
    .unwrap();

    let book = n.registry().get("BTC-USD").unwrap();
    assert_eq!(book.best_bid(), Some(dec!(100.0)));
    assert_eq!(book.best_ask(), Some(dec!(101.0)));
    assert_eq!(book.spread(), dec!(1.0));
    assert_eq!(book.midpoint(), dec!(100.5));

    let publisher = SnapshotPublisher::new(book);
    let snap = publisher.snapshot(10);
    assert_eq!(snap.bids, vec![(dec!(100.0), dec!(1.5)), (dec!(99.0), dec!(2.5))]);
    assert_eq!(snap.asks, vec![(dec!(101.0), dec!(1.0)), (dec!(102.0), dec!(2.0))]);
}

#[test]
fn scenario_f_metrics_via_snapshot_frame() {
    let n = normalizer();
    n.handle_frame(
        r#"{"type":"snapshot","product_id":"BTC-USD","bids":[["100","10"],["99","20"]],"asks":[["101","10"],["102","20"]]}"#,
    )
    .unwrap();

    let book = n.registry().get("BTC-USD").unwrap();
    let publisher = SnapshotPublisher::new(book);
    let snap = publisher.snapshot(10);
    let computed = metrics::compute(&snap.bids, &snap.asks).unwrap();

    assert_eq!(computed.imbalance, rust_decimal::Decimal::ONE);
    assert_eq!(computed.market_pressure, rust_decimal::Decimal::ZERO);
    let expected_bps = (dec!(1) / dec!(100.5)) * dec!(10000);
    assert!((computed.spread_bps - expected_bps).abs() < dec!(0.01));
}

#[test]
fn ticker_frame_never_clears_or_mutates_an_established_book() {
    let n = normalizer();
    n.handle_frame(
        r#"{"type":"snapshot","product_id":"BTC-USD","bids":[["100","1"]],"asks":[["101","1"]]}"#,
    )
    .unwrap();
    let book = n.registry().get("BTC-USD").unwrap();
    let before = (book.order_count(), book.best_bid(), book.best_ask());

    n.handle_frame(
        r#"{"type":"ticker","product_id":"BTC-USD","best_bid":"100","best_bid_size":"1","best_ask":"101","best_ask_size":"1","sequence":1}"#,
    )
    .unwrap();

    let after = (book.order_count(), book.best_bid(), book.best_ask());
    assert_eq!(before, after);
}

#[test]
fn crossed_book_from_upstream_triggers_soft_resync() {
    let n = normalizer();
    n.handle_frame(
        r#"{"type":"snapshot","product_id":"BTC-USD","bids":[["100","1"]],"asks":[["101","1"]]}"#,
    )
    .unwrap();
    let crossing_id = uuid::Uuid::new_v4();
    n.handle_frame(&format!(
        r#"{{"type":"open","product_id":"BTC-USD","order_id":"{crossing_id}","side":"buy","price":"105","size":"1"}}"#
    ))
    .unwrap();

    let book = n.registry().get("BTC-USD").unwrap();
    assert_eq!(book.order_count(), 0);
    assert!(book.best_bid().is_none());
    assert!(book.best_ask().is_none());
}

#[test]
fn match_with_unknown_maker_id_is_silently_ignored() {
    let n = normalizer();
    n.handle_frame(
        r#"{"type":"snapshot","product_id":"BTC-USD","bids":[["100","1"]],"asks":[["101","1"]]}"#,
    )
    .unwrap();
    let book = n.registry().get("BTC-USD").unwrap();
    let before = book.order_count();

    n.handle_frame(&format!(
        r#"{{"type":"match","product_id":"BTC-USD","maker_order_id":"{}","size":"0.5"}}"#,
        uuid::Uuid::new_v4()
    ))
    .unwrap();

    assert_eq!(book.order_count(), before);
}

#[test]
fn overlapping_subscriptions_reuse_the_same_registry_book() {
    let n = normalizer();
    n.handle_frame(
        r#"{"type":"snapshot","product_id":"BTC-USD","bids":[["100","1"]],"asks":[["101","1"]]}"#,
    )
    .unwrap();
    n.handle_frame(
        r#"{"type":"l2update","product_id":"BTC-USD","changes":[["buy","99","3"]]}"#,
    )
    .unwrap();

    assert_eq!(n.registry().book_count(), 1);
    let book = n.registry().get("BTC-USD").unwrap();
    assert_eq!(book.bid_level_count(), 2);
}
