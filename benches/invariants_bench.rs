//! # 容量规则基准测试
//!
//! 售票与预留检查都在事务内执行，这里测量纯规则部分的开销

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use event_ticketing::domain::{
    EventCapacity, PacketCapacity, TicketCode, TicketRequest, check_allocation, check_ticket,
    excess_after_removal,
};
use std::hint::black_box;

fn packet_with(events: i32) -> PacketCapacity {
    PacketCapacity {
        packet_id: 1,
        sold: 10,
        allocations: (1..=events).map(|id| (id, 50 + i64::from(id))).collect(),
    }
}

fn event() -> EventCapacity {
    EventCapacity {
        event_id: 1,
        seats: Some(500),
        sold: 120,
        allocated: 300,
    }
}

/// 不同包含关系数量下的门票检查
fn bench_check_ticket(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_ticket");
    for events in [1, 8, 64] {
        let packet = packet_with(events);
        let event = event();
        let request = TicketRequest {
            event_id: Some(1),
            packet_id: Some(1),
        };
        group.bench_with_input(BenchmarkId::from_parameter(events), &packet, |b, packet| {
            b.iter(|| check_ticket(black_box(request), Some(&event), Some(black_box(packet))));
        });
    }
    group.finish();
}

fn bench_check_allocation(c: &mut Criterion) {
    let event = event();
    c.bench_function("check_allocation", |b| {
        b.iter(|| check_allocation(black_box(&event), black_box(40), black_box(10), black_box(60)));
    });
}

fn bench_excess_after_removal(c: &mut Criterion) {
    let packet = packet_with(64);
    c.bench_function("excess_after_removal", |b| {
        b.iter(|| excess_after_removal(black_box(&packet), black_box(32)));
    });
}

fn bench_ticket_code(c: &mut Criterion) {
    let raw = TicketCode::generate().to_string();
    c.bench_function("ticket_code_parse", |b| {
        b.iter(|| black_box(raw.as_str()).parse::<TicketCode>());
    });
}

criterion_group!(
    benches,
    bench_check_ticket,
    bench_check_allocation,
    bench_excess_after_removal,
    bench_ticket_code
);
criterion_main!(benches);
