//! Criterion benchmarks for the tabfx-core signal graph.
//!
//! Measures graph overhead independently of DSP cost using a trivial gain
//! node. Two axes:
//!
//! - **Compile**: topology validation, Kahn sort and liveness assignment
//! - **Render**: `SignalGraph::render()` throughput at varying block sizes
//!
//! Run with: `cargo bench -p tabfx-core -- graph/`
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tabfx_core::graph::{Channel, ChannelRoute, GraphBuilder, GraphTopology, SignalGraph};
use tabfx_core::Node;

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512, 1024];

/// Trivial gain node that isolates scheduling overhead.
struct Gain(f32);

impl Node for Gain {
    fn name(&self) -> &'static str {
        "gain"
    }

    fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        (left * self.0, right * self.0)
    }

    fn reset(&mut self) {}
}

/// Input → `len` gains → splitter ⇉ merger (stereo routes) → output.
fn session_like(len: usize, block_size: usize) -> (GraphTopology, SignalGraph) {
    let mut b = GraphBuilder::new(SAMPLE_RATE, block_size);
    let input = b.add_input();
    let output = b.add_output();
    let mut prev = input;
    for _ in 0..len {
        let id = b.add_node(Box::new(Gain(0.99)));
        b.connect(prev, id).unwrap();
        prev = id;
    }
    let split = b.add_splitter();
    let merge = b.add_merger(10.0);
    b.connect(prev, split).unwrap();
    b.connect_route(split, merge, ChannelRoute::new(Channel::Left, Channel::Left, 1.0))
        .unwrap();
    b.connect_route(split, merge, ChannelRoute::new(Channel::Right, Channel::Right, 1.0))
        .unwrap();
    b.connect(merge, output).unwrap();
    b.build().unwrap()
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph/compile");
    for &len in &[5usize, 15, 40] {
        let (topology, _) = session_like(len, 128);
        group.bench_with_input(BenchmarkId::new("chain", len), &topology, |b, t| {
            b.iter(|| black_box(t.compile().unwrap()));
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph/render");
    for &block_size in BLOCK_SIZES {
        let (_, mut graph) = session_like(15, block_size);
        let left_in = vec![0.5f32; block_size];
        let right_in = vec![-0.5f32; block_size];
        let mut left_out = vec![0.0f32; block_size];
        let mut right_out = vec![0.0f32; block_size];
        group.bench_with_input(BenchmarkId::new("chain_15", block_size), &block_size, |b, _| {
            b.iter(|| {
                graph.render(
                    black_box(&left_in),
                    black_box(&right_in),
                    &mut left_out,
                    &mut right_out,
                )
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_render);
criterion_main!(benches);
