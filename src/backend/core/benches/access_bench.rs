//! Benchmarks for access checks, navigation, guards and matrix diffing.
use accessgate_core::access::{
    diff_snapshots, AccessControl, AccessEvaluator, AccessLevel, AccessService, DefaultRole, Guard, GuardContext,
    MatrixSnapshot, NavigationFilter, Page, PageCatalog, RoleId, RoleState, RuleChange,
};
use accessgate_core::store::MemoryStore;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

fn seeded_control() -> AccessControl {
    let access = AccessControl::new();
    access.roles().replace_all(DefaultRole::all_roles());
    for role in DefaultRole::all() {
        let changes: Vec<RuleChange> = role
            .page_levels()
            .into_iter()
            .map(|(url, level)| RuleChange::new(url, role.id(), level))
            .collect();
        access.matrix().apply(&changes);
    }
    access
}

fn wide_catalog(pages: usize) -> PageCatalog {
    PageCatalog::new(
        (0..pages)
            .map(|i| Page::new(format!("/module-{}/page-{}", i % 10, i), format!("Page {}", i)).in_category(format!("Module {}", i % 10)))
            .collect(),
    )
}

fn snapshot(pages: usize, roles: i64, level: AccessLevel) -> MatrixSnapshot {
    let mut snap = MatrixSnapshot::new();
    for p in 0..pages {
        let row = snap.entry(format!("/page-{}", p)).or_default();
        for r in 1..=roles {
            row.insert(RoleId(r), level);
        }
    }
    snap
}

fn bench_access_checks(c: &mut Criterion) {
    let mut group = c.benchmark_group("access_checks");
    let access = seeded_control();
    let manager = DefaultRole::Manager.id();
    let admin = DefaultRole::Admin.id();
    group.bench_function("level_stored", |b| { b.iter(|| black_box(access.access_level(manager, black_box("/sales/orders")))); });
    group.bench_function("level_missing", |b| { b.iter(|| black_box(access.access_level(manager, black_box("/settings/roles")))); });
    group.bench_function("level_bypass", |b| { b.iter(|| black_box(access.access_level(admin, black_box("/accounting")))); });
    group.bench_function("can_delete", |b| { b.iter(|| black_box(access.can_delete(manager, black_box("/sales/orders")))); });
    group.finish();
}

fn bench_catalog_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalog_resolve");
    for pages in [12, 100, 1_000] {
        let catalog = wide_catalog(pages);
        let exact = format!("/module-3/page-{}", pages - 7);
        let nested = format!("{}/records/42?tab=history", exact);
        group.bench_with_input(BenchmarkId::new("exact", pages), &exact, |b, loc| { b.iter(|| black_box(catalog.resolve(loc))); });
        group.bench_with_input(BenchmarkId::new("nested", pages), &nested, |b, loc| { b.iter(|| black_box(catalog.resolve(loc))); });
    }
    group.finish();
}

fn bench_navigation(c: &mut Criterion) {
    let mut group = c.benchmark_group("navigation_groups");
    let access = seeded_control();
    let catalog = PageCatalog::business_default();
    for role in [DefaultRole::Admin, DefaultRole::Manager, DefaultRole::Warehouse] {
        group.bench_with_input(BenchmarkId::from_parameter(role.key()), &role.id(), |b, id| {
            b.iter(|| black_box(NavigationFilter::new(&catalog, &access).navigation_groups(*id)));
        });
    }
    group.finish();
}

fn bench_guard_decide(c: &mut Criterion) {
    let mut group = c.benchmark_group("guard_decide");
    let access = seeded_control();
    let catalog = PageCatalog::business_default();
    let state = RoleState::Resolved(DefaultRole::Manager.id());
    let ctx = GuardContext { state: &state, location: "/sales/orders/12", catalog: &catalog, access: &access };
    let explicit = Guard::level("/sales/orders", AccessLevel::Edit);
    let here = Guard::level_here(AccessLevel::Edit);
    let denied = Guard::level("/accounting", AccessLevel::Create);
    let perms = Guard::permissions([("orders", "approve"), ("ledger", "post")], false);
    group.bench_function("explicit_allow", |b| { b.iter(|| black_box(explicit.decide(ctx))); });
    group.bench_function("location_allow", |b| { b.iter(|| black_box(here.decide(ctx))); });
    group.bench_function("explicit_deny", |b| { b.iter(|| black_box(denied.decide(ctx))); });
    group.bench_function("permissions_any", |b| { b.iter(|| black_box(perms.decide(ctx))); });
    group.finish();
}

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("matrix_diff");
    for pages in [12, 100, 500] {
        let baseline = snapshot(pages, 10, AccessLevel::Read);
        let mut working = baseline.clone();
        for (i, row) in working.values_mut().enumerate() {
            if i % 4 == 0 {
                row.insert(RoleId(3), AccessLevel::Edit);
            }
        }
        group.throughput(Throughput::Elements((pages * 10) as u64));
        group.bench_with_input(BenchmarkId::new("unchanged", pages), &baseline, |b, base| { b.iter(|| black_box(diff_snapshots(base, base))); });
        group.bench_with_input(BenchmarkId::new("quarter_changed", pages), &(baseline.clone(), working), |b, (base, work)| { b.iter(|| black_box(diff_snapshots(base, work))); });
    }
    group.finish();
}

fn bench_apply_changes(c: &mut Criterion) {
    let mut group = c.benchmark_group("service_apply_changes");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = AccessService::new(Arc::new(MemoryStore::seeded()), PageCatalog::business_default());
    rt.block_on(service.ensure_all_loaded()).unwrap();
    let catalog = PageCatalog::business_default();
    for size in [1usize, 12, 60] {
        let changes: Vec<RuleChange> = catalog
            .pages()
            .iter()
            .flat_map(|p| DefaultRole::all().into_iter().map(move |r| RuleChange::new(p.url.clone(), r.id(), AccessLevel::Read)))
            .take(size)
            .collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &changes, |b, changes| {
            b.to_async(&rt).iter(|| async { black_box(service.apply_changes(changes).await.unwrap()) });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_access_checks, bench_catalog_resolve, bench_navigation, bench_guard_decide, bench_diff, bench_apply_changes);
criterion_main!(benches);
