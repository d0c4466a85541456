//! Decision and read-filter benchmarks
//!
//! Measures the engine against the in-memory ACL store, so the numbers are
//! the engine's own overhead and not a store's round trips.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sacl_authz::config::SecurityBlock;
use sacl_authz::{
    AccessContext, AclStore, MemoryAclStore, MemoryDataSource, Predicate, Query, ReadContext,
    Relation, SaclConfig, Security,
};
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Engine with `teams` teams of ten docs each; "alice" manages every team
async fn setup(teams: usize) -> Security {
    let data = MemoryDataSource::new()
        .with_relation("Doc", "team", Relation::belongs_to("Team", "teamId"));
    let block: SecurityBlock = serde_json::from_value(json!({
        "roles": {
            "member": {"actions": ["read"]},
            "manager": {"actions": ["read", "write", "manage"]}
        }
    }))
    .unwrap();
    let config = SaclConfig {
        enable_metrics: false,
        ..SaclConfig::default()
    }
    .with_owner("Team")
    .with_resource("Doc", "team")
    .with_security("Team", block);

    let security = Security::new(config, Arc::new(MemoryAclStore::new()), Arc::new(data.clone()))
        .await
        .unwrap();

    for t in 0..teams {
        let team = json!({"id": format!("t{}", t)});
        data.insert("Team", team.clone()).unwrap();
        security.after_create("Team", &team, Some("alice")).await.unwrap();

        for d in 0..10 {
            let doc = json!({"id": format!("d{}-{}", t, d), "teamId": format!("t{}", t)});
            data.insert("Doc", doc.clone()).unwrap();
            security.after_create("Doc", &doc, Some("alice")).await.unwrap();
        }
    }

    security
}

fn bench_decision(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("decision");

    for teams in [1, 10, 100].iter() {
        let security = rt.block_on(setup(*teams));

        let create = AccessContext::new("Doc", "create")
            .with_principal("alice")
            .with_payload(json!({"teamId": "t0"}));
        group.bench_with_input(BenchmarkId::new("create_granted", teams), &create, |b, ctx| {
            b.to_async(&rt).iter(|| async {
                let decision = security.evaluate(black_box(ctx)).await.unwrap();
                black_box(decision);
            });
        });

        let update = AccessContext::new("Doc", "updateAttributes")
            .with_instance("d0-0")
            .with_principal("bob")
            .with_payload(json!({"title": "x"}));
        group.bench_with_input(BenchmarkId::new("update_denied", teams), &update, |b, ctx| {
            b.to_async(&rt).iter(|| async {
                let decision = security.evaluate(black_box(ctx)).await.unwrap();
                black_box(decision);
            });
        });
    }

    group.finish();
}

fn bench_admin_bypass(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let acl = MemoryAclStore::new();
    let security = rt.block_on(async {
        let data = MemoryDataSource::new()
            .with_relation("Doc", "team", Relation::belongs_to("Team", "teamId"));
        let config = SaclConfig::default()
            .with_owner("Team")
            .with_resource("Doc", "team");
        let security = Security::new(config, Arc::new(acl.clone()), Arc::new(data))
            .await
            .unwrap();
        let admin = acl.ensure_role("admin", None).await.unwrap();
        acl.assign_principal_to_role("root", &admin).await.unwrap();
        security
    });

    let ctx = AccessContext::new("Doc", "deleteById")
        .with_instance("d1")
        .with_principal("root");

    c.bench_function("admin_bypass", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(security.decide(black_box(&ctx)).await.unwrap());
        });
    });
}

fn bench_read_filter(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("read_filter");

    for teams in [1, 10, 100].iter() {
        let security = rt.block_on(setup(*teams));
        let ctx = ReadContext::new("Doc").with_principal("alice");

        group.bench_with_input(BenchmarkId::new("unscoped", teams), &ctx, |b, ctx| {
            b.to_async(&rt).iter(|| async {
                let mut query = Query::new();
                security.filter_query(ctx, &mut query).await.unwrap();
                black_box(query);
            });
        });

        group.bench_with_input(BenchmarkId::new("scoped", teams), &ctx, |b, ctx| {
            b.to_async(&rt).iter(|| async {
                let mut query = Query::new().with_filter(Predicate::eq("teamId", "t0"));
                security.filter_query(ctx, &mut query).await.unwrap();
                black_box(query);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decision, bench_admin_bypass, bench_read_filter);
criterion_main!(benches);
