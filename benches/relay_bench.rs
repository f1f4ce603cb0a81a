//! Performance benchmarks for the incident relay.
//!
//! Run with: cargo bench

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use incident_relay::domain::{
    evaluate_access, AnalyticsReport, Coordinates, IncidentReport, IncidentType, PaymentRecord,
    Severity, WalletAddress,
};
use incident_relay::infra::NaiveBayesClassifier;

const CATEGORIES: [IncidentType; 5] = [
    IncidentType::VoteBuying,
    IncidentType::BallotStuffing,
    IncidentType::Intimidation,
    IncidentType::Tampering,
    IncidentType::Misinformation,
];

/// Create a set of reports spread over the last 60 days
fn create_reports(count: usize) -> Vec<IncidentReport> {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    (0..count)
        .map(|i| IncidentReport {
            incident_type: CATEGORIES[i % CATEGORIES.len()],
            severity: Severity::new((i % 5) as i64 + 1).unwrap(),
            location: format!("Ward {}", i % 40),
            coordinates: Coordinates::new(6.45 + (i % 20) as f64 * 0.01, 3.39 + (i % 7) as f64 * 0.01),
            description: format!("Report number {i}"),
            language: "en".to_string(),
            media_hash: None,
            media_analysis: None,
            text_analysis: None,
            timestamp: now - Duration::hours((i % (60 * 24)) as i64),
        })
        .collect()
}

/// Benchmark naive Bayes classification of free text
fn bench_classify_text(c: &mut Criterion) {
    let classifier = NaiveBayesClassifier::default();
    let mut group = c.benchmark_group("classify_text");

    for (name, text) in [
        ("short", "cash for votes"),
        (
            "long",
            "Armed men threatened voters at the polling unit and later offered cash \
             to anyone who agreed to vote for their candidate while ballots were stuffed",
        ),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(classifier.classify_text(black_box(text))));
        });
    }

    group.finish();
}

/// Benchmark analytics aggregation over the live set
fn bench_analytics(c: &mut Criterion) {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let mut group = c.benchmark_group("analytics");

    for count in [10, 100, 1000, 10_000].iter() {
        let reports = create_reports(*count);
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("compute", count), &reports, |b, reports| {
            b.iter(|| black_box(AnalyticsReport::compute(reports.iter(), now)));
        });
    }

    group.finish();
}

/// Benchmark access evaluation over a wallet's payment history
fn bench_access_evaluation(c: &mut Criterion) {
    let now = Utc::now();
    let address = WalletAddress::parse("0xabc").unwrap();
    let records: Vec<PaymentRecord> = (0..50)
        .map(|i| PaymentRecord::confirmed(address.clone(), format!("0x{i}"), 5.0, now - Duration::days(i)))
        .collect();

    c.bench_function("evaluate_access", |b| {
        b.iter(|| black_box(evaluate_access(black_box(&records), now, 5.0)));
    });
}

criterion_group!(
    benches,
    bench_classify_text,
    bench_analytics,
    bench_access_evaluation
);
criterion_main!(benches);
