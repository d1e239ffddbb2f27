use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rusqlite::Connection;

use trellis_core::config::LinkConfig;
use trellis_core::db::open_in_memory;
use trellis_core::graph::hierarchy;
use trellis_core::links;
use trellis_core::model::LinkRequest;
use trellis_core::query;
use trellis_core::registry;

/// (name, fan-out, depth)
const SHAPES: &[(&str, usize, u32)] = &[("small", 3, 3), ("wide", 8, 3), ("deep", 2, 7)];

/// Build a complete tree with the given fan-out and depth and link one
/// partner at every leaf.
fn build_tree(fan_out: usize, depth: u32) -> (Connection, usize) {
    let conn = open_in_memory().expect("open store");
    registry::insert_partner(&conn, "P1", "Acme").expect("partner");
    hierarchy::insert(&conn, "r", "root", None).expect("root");

    let mut frontier = vec!["r".to_string()];
    let mut count = 1;
    for _ in 0..depth {
        let mut next = Vec::with_capacity(frontier.len() * fan_out);
        for parent in &frontier {
            for i in 0..fan_out {
                let id = format!("{parent}.{i}");
                hierarchy::insert(&conn, &id, "node", Some(parent)).expect("node");
                next.push(id);
                count += 1;
            }
        }
        frontier = next;
    }
    let config = LinkConfig::default();
    for leaf in &frontier {
        links::link(&conn, &LinkRequest::partner("P1", leaf, None), &config).expect("link");
    }
    (conn, count)
}

fn bench_descendants(c: &mut Criterion) {
    let mut group = c.benchmark_group("closure.descendants");

    for &(name, fan_out, depth) in SHAPES {
        let (conn, count) = build_tree(fan_out, depth);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &conn, |b, conn| {
            b.iter(|| {
                let ids = query::descendants_of(conn, black_box("r")).expect("closure");
                black_box(ids.len())
            });
        });
    }

    group.finish();
}

fn bench_membership(c: &mut Criterion) {
    let mut group = c.benchmark_group("closure.is_partner_linked");

    for &(name, fan_out, depth) in SHAPES {
        let (conn, _) = build_tree(fan_out, depth);
        group.bench_with_input(BenchmarkId::from_parameter(name), &conn, |b, conn| {
            b.iter(|| {
                links::propagate::is_partner_linked(conn, black_box("r"), "P1", None)
                    .expect("membership")
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_descendants, bench_membership);
criterion_main!(benches);
